//! Organization, collection, member, and cipher entities.
//!
//! Wire records deserialize with both PascalCase and camelCase field names
//! and keep unrecognized fields in a passthrough map. Entities wrap a
//! record together with the parent organization id and the client handle —
//! children are always constructed by their parent, never self-wired.
//!
//! Ciphertext fields (collection and cipher names) are decrypted before an
//! entity becomes visible to callers and re-encrypted before anything is
//! written back.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use vwadmin_core::crypto::SymmetricKey;
use vwadmin_core::EncString;

use crate::client::VaultApi;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Membership state of a user inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum OrganizationUserStatus {
    Revoked,
    Invited,
    Accepted,
    Confirmed,
}

impl TryFrom<i32> for OrganizationUserStatus {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(Self::Revoked),
            0 => Ok(Self::Invited),
            1 => Ok(Self::Accepted),
            2 => Ok(Self::Confirmed),
            other => Err(format!("unknown organization user status {other}")),
        }
    }
}

impl From<OrganizationUserStatus> for i32 {
    fn from(v: OrganizationUserStatus) -> i32 {
        match v {
            OrganizationUserStatus::Revoked => -1,
            OrganizationUserStatus::Invited => 0,
            OrganizationUserStatus::Accepted => 1,
            OrganizationUserStatus::Confirmed => 2,
        }
    }
}

/// Role of a user inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum OrganizationUserType {
    Owner,
    Admin,
    #[default]
    User,
    Manager,
}

impl TryFrom<i32> for OrganizationUserType {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Owner),
            1 => Ok(Self::Admin),
            2 => Ok(Self::User),
            3 => Ok(Self::Manager),
            other => Err(format!("unknown organization user type {other}")),
        }
    }
}

impl From<OrganizationUserType> for i32 {
    fn from(v: OrganizationUserType) -> i32 {
        match v {
            OrganizationUserType::Owner => 0,
            OrganizationUserType::Admin => 1,
            OrganizationUserType::User => 2,
            OrganizationUserType::Manager => 3,
        }
    }
}

/// Vault item kind. Unrecognized kinds round-trip untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum CipherType {
    Login,
    SecureNote,
    Card,
    Identity,
    Unknown(i32),
}

impl From<i32> for CipherType {
    fn from(v: i32) -> Self {
        match v {
            1 => Self::Login,
            2 => Self::SecureNote,
            3 => Self::Card,
            4 => Self::Identity,
            other => Self::Unknown(other),
        }
    }
}

impl From<CipherType> for i32 {
    fn from(v: CipherType) -> i32 {
        match v {
            CipherType::Login => 1,
            CipherType::SecureNote => 2,
            CipherType::Card => 3,
            CipherType::Identity => 4,
            CipherType::Unknown(other) => other,
        }
    }
}

/// Server-wide account state as reported by Vaultwarden (`_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum VaultwardenUserStatus {
    #[default]
    Enabled,
    Invited,
    Disabled,
}

impl TryFrom<i32> for VaultwardenUserStatus {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Enabled),
            1 => Ok(Self::Invited),
            2 => Ok(Self::Disabled),
            other => Err(format!("unknown account status {other}")),
        }
    }
}

impl From<VaultwardenUserStatus> for i32 {
    fn from(v: VaultwardenUserStatus) -> i32 {
        match v {
            VaultwardenUserStatus::Enabled => 0,
            VaultwardenUserStatus::Invited => 1,
            VaultwardenUserStatus::Disabled => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

/// `{"Data": [...]}` list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct DataList<T> {
    #[serde(alias = "Data")]
    pub data: Vec<T>,
}

/// One collection grant in a user's access list. `id` is the collection id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionAccess {
    #[serde(rename = "id", alias = "Id")]
    pub collection_id: Uuid,
    #[serde(rename = "readOnly", alias = "ReadOnly", default)]
    pub read_only: bool,
    #[serde(rename = "hidePasswords", alias = "HidePasswords", default)]
    pub hide_passwords: bool,
}

impl CollectionAccess {
    /// A full-access grant for a collection.
    pub fn writable(collection_id: Uuid) -> Self {
        Self {
            collection_id,
            read_only: false,
            hide_passwords: false,
        }
    }
}

/// One member row in a collection's access list. `id` is the user's
/// organization membership id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMember {
    #[serde(rename = "id", alias = "Id")]
    pub id: Uuid,
    #[serde(rename = "readOnly", alias = "ReadOnly", default)]
    pub read_only: bool,
    #[serde(rename = "hidePasswords", alias = "HidePasswords", default)]
    pub hide_passwords: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationData {
    #[serde(alias = "Id", default)]
    pub id: Option<Uuid>,
    #[serde(alias = "Name", default)]
    pub name: String,
    #[serde(alias = "Object", default)]
    pub object: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionData {
    #[serde(alias = "Id")]
    pub id: Uuid,
    #[serde(alias = "OrganizationId", alias = "organizationId", default)]
    pub organization_id: Option<Uuid>,
    /// Ciphertext on the wire.
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "ExternalId", alias = "externalId", default)]
    pub external_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationUserData {
    #[serde(alias = "Id")]
    pub id: Uuid,
    #[serde(alias = "UserId", alias = "userId", default)]
    pub user_id: Option<Uuid>,
    #[serde(alias = "Email", default)]
    pub email: String,
    #[serde(alias = "OrganizationId", alias = "organizationId", default)]
    pub organization_id: Option<Uuid>,
    #[serde(alias = "Status")]
    pub status: OrganizationUserStatus,
    #[serde(alias = "Type", alias = "type")]
    pub user_type: OrganizationUserType,
    #[serde(alias = "AccessAll", alias = "accessAll", default)]
    pub access_all: bool,
    #[serde(alias = "ExternalId", alias = "externalId", default)]
    pub external_id: Option<String>,
    #[serde(alias = "Collections", default)]
    pub collections: Vec<CollectionAccess>,
    #[serde(alias = "Groups", default)]
    pub groups: Vec<Value>,
    #[serde(alias = "TwoFactorEnabled", alias = "twoFactorEnabled", default)]
    pub two_factor_enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CipherData {
    #[serde(alias = "Id")]
    pub id: Uuid,
    #[serde(alias = "OrganizationId", alias = "organizationId", default)]
    pub organization_id: Option<Uuid>,
    #[serde(alias = "Type", alias = "type")]
    pub cipher_type: CipherType,
    /// Ciphertext on the wire.
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "CollectionIds", alias = "collectionIds", default)]
    pub collection_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Access payload written back when a user's grants change: exactly the
/// mutated substructure, nothing else.
#[derive(Serialize)]
struct AccessUpdate<'a> {
    collections: &'a [CollectionAccess],
    groups: &'a [Value],
    #[serde(rename = "accessAll")]
    access_all: bool,
    #[serde(rename = "type")]
    user_type: OrganizationUserType,
}

#[derive(Serialize)]
struct InvitePayload<'a> {
    emails: [&'a str; 1],
    collections: &'a [CollectionAccess],
    groups: &'a [Value],
    #[serde(rename = "accessAll")]
    access_all: bool,
    #[serde(rename = "type")]
    user_type: OrganizationUserType,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Rights carried by an organization invite.
#[derive(Debug, Clone, Default)]
pub struct InviteRequest {
    pub collections: Vec<CollectionAccess>,
    pub access_all: bool,
    pub user_type: OrganizationUserType,
}

impl InviteRequest {
    /// An invite that mirrors an existing membership's rights.
    pub fn matching(details: &OrganizationUserDetails) -> Self {
        Self {
            collections: details.collections.clone(),
            access_all: details.access_all,
            user_type: details.user_type,
        }
    }
}

/// An organization, with lazily cached collection / user / cipher lists.
///
/// Each cache is refreshed independently when `force_refresh` is requested;
/// destructive operations refresh the affected cache themselves so
/// subsequent reads stay consistent.
#[derive(Clone)]
pub struct Organization {
    client: Arc<dyn VaultApi>,
    id: Uuid,
    pub name: String,
    pub object: Option<String>,
    collections: Option<Vec<OrganizationCollection>>,
    users: Option<Vec<OrganizationUserDetails>>,
    ciphers: Option<Vec<CipherDetails>>,
}

impl std::fmt::Debug for Organization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Organization")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("collections", &self.collections.as_ref().map(Vec::len))
            .field("users", &self.users.as_ref().map(Vec::len))
            .field("ciphers", &self.ciphers.as_ref().map(Vec::len))
            .finish()
    }
}

impl Organization {
    /// Fetch an organization by id.
    pub async fn fetch(client: Arc<dyn VaultApi>, id: Uuid) -> Result<Self, VaultError> {
        let value = client
            .request(Method::GET, &format!("api/organizations/{id}"), None)
            .await?;
        let data: OrganizationData = serde_json::from_value(value)?;
        Ok(Self {
            id: data.id.unwrap_or(id),
            name: data.name,
            object: data.object,
            client,
            collections: None,
            users: None,
            ciphers: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The organization's symmetric key.
    pub async fn key(&self) -> Result<SymmetricKey, VaultError> {
        self.client.organization_key(self.id).await
    }

    // -- collections --------------------------------------------------------

    async fn fetch_collections(&self) -> Result<Vec<OrganizationCollection>, VaultError> {
        let value = self
            .client
            .request(
                Method::GET,
                &format!("api/organizations/{}/collections", self.id),
                None,
            )
            .await?;
        let list: DataList<CollectionData> = serde_json::from_value(value)?;
        let org_key = self.key().await?;
        list.data
            .into_iter()
            .map(|data| OrganizationCollection::from_data(data, self.id, &org_key, &self.client))
            .collect()
    }

    /// The organization's collections, names decrypted.
    pub async fn collections(
        &mut self,
        force_refresh: bool,
    ) -> Result<Vec<OrganizationCollection>, VaultError> {
        if self.collections.is_none() || force_refresh {
            self.collections = Some(self.fetch_collections().await?);
        }
        Ok(self.collections.clone().unwrap_or_default())
    }

    /// Exact-name lookup over the cached collection list.
    pub async fn collection(
        &mut self,
        name: &str,
    ) -> Result<Option<OrganizationCollection>, VaultError> {
        let collections = self.collections(false).await?;
        Ok(collections.into_iter().find(|c| c.name == name))
    }

    /// Create a collection, re-encrypting its name under the organization
    /// key. The new collection is appended to the cache.
    pub async fn create_collection(
        &mut self,
        name: &str,
    ) -> Result<OrganizationCollection, VaultError> {
        let org_key = self.key().await?;
        let encrypted = EncString::encrypt_symmetric(name.as_bytes(), &org_key)?;
        let value = self
            .client
            .request(
                Method::POST,
                &format!("api/organizations/{}/collections", self.id),
                Some(json!({
                    "name": encrypted.to_string(),
                    "groups": [],
                    "users": [],
                })),
            )
            .await?;
        let data: CollectionData = serde_json::from_value(value)?;
        let collection =
            OrganizationCollection::from_data(data, self.id, &org_key, &self.client)?;
        self.collections
            .get_or_insert_with(Vec::new)
            .push(collection.clone());
        Ok(collection)
    }

    /// Delete a collection and refresh the cache.
    pub async fn delete_collection(&mut self, collection_id: Uuid) -> Result<(), VaultError> {
        self.client
            .request(
                Method::DELETE,
                &format!(
                    "api/organizations/{}/collections/{collection_id}",
                    self.id
                ),
                None,
            )
            .await?;
        self.collections = Some(self.fetch_collections().await?);
        Ok(())
    }

    // -- users --------------------------------------------------------------

    async fn fetch_users(&self) -> Result<Vec<OrganizationUserDetails>, VaultError> {
        let value = self
            .client
            .request(
                Method::GET,
                &format!(
                    "api/organizations/{}/users?includeCollections=true&includeGroups=true",
                    self.id
                ),
                None,
            )
            .await?;
        let list: DataList<OrganizationUserData> = serde_json::from_value(value)?;
        Ok(list
            .data
            .into_iter()
            .map(|data| OrganizationUserDetails::from_data(data, self.id, &self.client))
            .collect())
    }

    /// The organization's membership list.
    pub async fn users(
        &mut self,
        force_refresh: bool,
    ) -> Result<Vec<OrganizationUserDetails>, VaultError> {
        if self.users.is_none() || force_refresh {
            self.users = Some(self.fetch_users().await?);
        }
        Ok(self.users.clone().unwrap_or_default())
    }

    /// Members filtered by their two-factor state.
    pub async fn users_by_two_factor(
        &mut self,
        enabled: bool,
        force_refresh: bool,
    ) -> Result<Vec<OrganizationUserDetails>, VaultError> {
        let users = self.users(force_refresh).await?;
        Ok(users
            .into_iter()
            .filter(|u| u.two_factor_enabled == enabled)
            .collect())
    }

    /// Fetch a single membership record directly.
    pub async fn user(
        &self,
        membership_id: Uuid,
    ) -> Result<OrganizationUserDetails, VaultError> {
        let value = self
            .client
            .request(
                Method::GET,
                &format!(
                    "api/organizations/{}/users/{membership_id}?includeCollections=true&includeGroups=true",
                    self.id
                ),
                None,
            )
            .await?;
        let data: OrganizationUserData = serde_json::from_value(value)?;
        Ok(OrganizationUserDetails::from_data(data, self.id, &self.client))
    }

    /// Exact-match email lookup over the cached member list; the cache is
    /// populated first if empty. No partial matching.
    pub async fn user_search(
        &mut self,
        email: &str,
        force_refresh: bool,
    ) -> Result<Option<OrganizationUserDetails>, VaultError> {
        let users = self.users(force_refresh).await?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    /// Invite an email with the given rights, then refresh the member cache.
    pub async fn invite(&mut self, email: &str, request: &InviteRequest) -> Result<(), VaultError> {
        let payload = InvitePayload {
            emails: [email],
            collections: &request.collections,
            groups: &[],
            access_all: request.access_all,
            user_type: request.user_type,
        };
        self.client
            .request(
                Method::POST,
                &format!("api/organizations/{}/users/invite", self.id),
                Some(serde_json::to_value(&payload)?),
            )
            .await?;
        debug!(organization = %self.id, %email, "invite issued");
        self.users = Some(self.fetch_users().await?);
        Ok(())
    }

    // -- ciphers ------------------------------------------------------------

    async fn fetch_ciphers(&self) -> Result<Vec<CipherDetails>, VaultError> {
        let value = self
            .client
            .request(
                Method::GET,
                &format!(
                    "api/ciphers/organization-details?organizationId={}",
                    self.id
                ),
                None,
            )
            .await?;
        let list: DataList<CipherData> = serde_json::from_value(value)?;
        let org_key = self.key().await?;
        list.data
            .into_iter()
            .map(|data| CipherDetails::from_data(data, self.id, &org_key, &self.client))
            .collect()
    }

    /// The organization's vault items, names decrypted.
    pub async fn ciphers(
        &mut self,
        force_refresh: bool,
    ) -> Result<Vec<CipherDetails>, VaultError> {
        if self.ciphers.is_none() || force_refresh {
            self.ciphers = Some(self.fetch_ciphers().await?);
        }
        Ok(self.ciphers.clone().unwrap_or_default())
    }

    /// Vault items referencing the given collection.
    pub async fn ciphers_in_collection(
        &mut self,
        collection_id: Uuid,
        force_refresh: bool,
    ) -> Result<Vec<CipherDetails>, VaultError> {
        let ciphers = self.ciphers(force_refresh).await?;
        Ok(ciphers
            .into_iter()
            .filter(|c| c.collection_ids.contains(&collection_id))
            .collect())
    }
}

/// A named collection inside an organization. `name` is plaintext — it was
/// decrypted when the entity was built and is re-encrypted on any write.
#[derive(Clone)]
pub struct OrganizationCollection {
    client: Arc<dyn VaultApi>,
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub external_id: Option<String>,
}

impl std::fmt::Debug for OrganizationCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationCollection")
            .field("id", &self.id)
            .field("organization_id", &self.organization_id)
            .field("name", &self.name)
            .field("external_id", &self.external_id)
            .finish()
    }
}

impl OrganizationCollection {
    fn from_data(
        data: CollectionData,
        organization_id: Uuid,
        org_key: &SymmetricKey,
        client: &Arc<dyn VaultApi>,
    ) -> Result<Self, VaultError> {
        let name = EncString::parse(&data.name)?.decrypt_to_string(org_key)?;
        Ok(Self {
            client: Arc::clone(client),
            id: data.id,
            organization_id: data.organization_id.unwrap_or(organization_id),
            name,
            external_id: data.external_id,
        })
    }

    /// The collection's member rows.
    pub async fn users(&self) -> Result<Vec<CollectionMember>, VaultError> {
        let value = self
            .client
            .request(
                Method::GET,
                &format!(
                    "api/organizations/{}/collections/{}/users?includeCollections=true&includeGroups=true",
                    self.organization_id, self.id
                ),
                None,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Overwrite the collection's member list.
    pub async fn set_users(&self, members: &[CollectionMember]) -> Result<(), VaultError> {
        self.client
            .request(
                Method::PUT,
                &format!(
                    "api/organizations/{}/collections/{}/users",
                    self.organization_id, self.id
                ),
                Some(serde_json::to_value(members)?),
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), VaultError> {
        self.client
            .request(
                Method::DELETE,
                &format!(
                    "api/organizations/{}/collections/{}",
                    self.organization_id, self.id
                ),
                None,
            )
            .await?;
        Ok(())
    }
}

/// A user's membership in an organization, including its collection grants.
#[derive(Clone)]
pub struct OrganizationUserDetails {
    client: Arc<dyn VaultApi>,
    /// Membership id (not the account id).
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: String,
    pub organization_id: Uuid,
    pub status: OrganizationUserStatus,
    pub user_type: OrganizationUserType,
    pub access_all: bool,
    pub external_id: Option<String>,
    pub collections: Vec<CollectionAccess>,
    pub groups: Vec<Value>,
    pub two_factor_enabled: bool,
}

impl std::fmt::Debug for OrganizationUserDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationUserDetails")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("organization_id", &self.organization_id)
            .field("status", &self.status)
            .field("user_type", &self.user_type)
            .field("access_all", &self.access_all)
            .field("collections", &self.collections.len())
            .field("two_factor_enabled", &self.two_factor_enabled)
            .finish()
    }
}

impl OrganizationUserDetails {
    fn from_data(
        data: OrganizationUserData,
        organization_id: Uuid,
        client: &Arc<dyn VaultApi>,
    ) -> Self {
        Self {
            client: Arc::clone(client),
            id: data.id,
            user_id: data.user_id,
            email: data.email,
            organization_id: data.organization_id.unwrap_or(organization_id),
            status: data.status,
            user_type: data.user_type,
            access_all: data.access_all,
            external_id: data.external_id,
            collections: data.collections,
            groups: data.groups,
            two_factor_enabled: data.two_factor_enabled,
        }
    }

    /// Write the current grant list back to the server.
    async fn write_access(&self) -> Result<(), VaultError> {
        let payload = AccessUpdate {
            collections: &self.collections,
            groups: &self.groups,
            access_all: self.access_all,
            user_type: self.user_type,
        };
        self.client
            .request(
                Method::POST,
                &format!(
                    "api/organizations/{}/users/{}",
                    self.organization_id, self.id
                ),
                Some(serde_json::to_value(&payload)?),
            )
            .await?;
        Ok(())
    }

    /// Grant access to collections. A set operation: ids already granted
    /// stay as a single entry. The write is issued even when nothing
    /// changed.
    pub async fn add_collections(&mut self, collection_ids: &[Uuid]) -> Result<(), VaultError> {
        for id in collection_ids {
            if self.collections.iter().any(|c| c.collection_id == *id) {
                continue;
            }
            self.collections.push(CollectionAccess::writable(*id));
        }
        self.write_access().await
    }

    /// Remove collection grants. Absent ids are ignored; the write is
    /// issued regardless.
    pub async fn remove_collections(&mut self, collection_ids: &[Uuid]) -> Result<(), VaultError> {
        self.collections
            .retain(|c| !collection_ids.contains(&c.collection_id));
        self.write_access().await
    }

    /// Replace the whole grant list with writable grants on `collection_ids`.
    pub async fn update_collections(&mut self, collection_ids: &[Uuid]) -> Result<(), VaultError> {
        self.collections = collection_ids
            .iter()
            .map(|id| CollectionAccess::writable(*id))
            .collect();
        self.write_access().await
    }

    /// Like [`Self::add_collections`], but returns without any request when
    /// every id is already granted.
    pub async fn grant_collections(&mut self, collection_ids: &[Uuid]) -> Result<(), VaultError> {
        let has_new = collection_ids
            .iter()
            .any(|id| !self.collections.iter().any(|c| c.collection_id == *id));
        if !has_new {
            return Ok(());
        }
        self.add_collections(collection_ids).await
    }

    /// Like [`Self::remove_collections`], but returns without any request
    /// when none of the ids is currently granted.
    pub async fn revoke_collections(&mut self, collection_ids: &[Uuid]) -> Result<(), VaultError> {
        let has_present = self
            .collections
            .iter()
            .any(|c| collection_ids.contains(&c.collection_id));
        if !has_present {
            return Ok(());
        }
        self.remove_collections(collection_ids).await
    }

    /// Remove this membership from the organization.
    pub async fn delete(&self) -> Result<(), VaultError> {
        self.client
            .request(
                Method::DELETE,
                &format!(
                    "api/organizations/{}/users/{}",
                    self.organization_id, self.id
                ),
                None,
            )
            .await?;
        Ok(())
    }
}

/// A vault item, reduced to what administration needs: its kind, decrypted
/// name, and collection membership.
#[derive(Clone)]
pub struct CipherDetails {
    client: Arc<dyn VaultApi>,
    pub id: Uuid,
    pub organization_id: Uuid,
    pub cipher_type: CipherType,
    pub name: String,
    pub collection_ids: Vec<Uuid>,
}

impl std::fmt::Debug for CipherDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherDetails")
            .field("id", &self.id)
            .field("organization_id", &self.organization_id)
            .field("cipher_type", &self.cipher_type)
            .field("name", &self.name)
            .field("collection_ids", &self.collection_ids)
            .finish()
    }
}

impl CipherDetails {
    fn from_data(
        data: CipherData,
        organization_id: Uuid,
        org_key: &SymmetricKey,
        client: &Arc<dyn VaultApi>,
    ) -> Result<Self, VaultError> {
        let name = EncString::parse(&data.name)?.decrypt_to_string(org_key)?;
        Ok(Self {
            client: Arc::clone(client),
            id: data.id,
            organization_id: data.organization_id.unwrap_or(organization_id),
            cipher_type: data.cipher_type,
            name,
            collection_ids: data.collection_ids,
        })
    }

    /// Write the current collection membership back to the server.
    async fn write_collections(&self) -> Result<(), VaultError> {
        self.client
            .request(
                Method::POST,
                &format!("api/ciphers/{}/collections", self.id),
                Some(json!({ "collectionIds": self.collection_ids })),
            )
            .await?;
        Ok(())
    }

    /// Add the item to collections. Already-present ids stay single; the
    /// write is issued even when nothing changed.
    pub async fn add_collections(&mut self, collection_ids: &[Uuid]) -> Result<(), VaultError> {
        for id in collection_ids {
            if !self.collection_ids.contains(id) {
                self.collection_ids.push(*id);
            }
        }
        self.write_collections().await
    }

    /// Remove the item from collections. Absent ids are ignored; the write
    /// is issued regardless.
    pub async fn remove_collections(&mut self, collection_ids: &[Uuid]) -> Result<(), VaultError> {
        self.collection_ids.retain(|id| !collection_ids.contains(id));
        self.write_collections().await
    }

    /// Replace the item's collection membership wholesale.
    pub async fn update_collections(&mut self, collection_ids: &[Uuid]) -> Result<(), VaultError> {
        self.collection_ids = collection_ids.to_vec();
        self.write_collections().await
    }

    /// Delete the vault item.
    pub async fn delete(&self) -> Result<(), VaultError> {
        self.client
            .request(Method::DELETE, &format!("api/ciphers/{}", self.id), None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_user_status_conversions() {
        assert_eq!(
            OrganizationUserStatus::try_from(-1).unwrap(),
            OrganizationUserStatus::Revoked
        );
        assert_eq!(
            OrganizationUserStatus::try_from(2).unwrap(),
            OrganizationUserStatus::Confirmed
        );
        assert!(OrganizationUserStatus::try_from(3).is_err());
        assert_eq!(i32::from(OrganizationUserStatus::Revoked), -1);
    }

    #[test]
    fn cipher_type_keeps_unknown_kinds() {
        assert_eq!(CipherType::from(1), CipherType::Login);
        assert_eq!(CipherType::from(4), CipherType::Identity);
        assert_eq!(CipherType::from(5), CipherType::Unknown(5));
        assert_eq!(i32::from(CipherType::Unknown(5)), 5);
    }

    #[test]
    fn collection_access_accepts_both_casings() {
        let pascal = r#"{"Id": "33333333-3333-3333-3333-333333333333", "ReadOnly": true, "HidePasswords": false}"#;
        let camel = r#"{"id": "33333333-3333-3333-3333-333333333333", "readOnly": true}"#;
        let a: CollectionAccess = serde_json::from_str(pascal).unwrap();
        let b: CollectionAccess = serde_json::from_str(camel).unwrap();
        assert_eq!(a, b);
        assert!(a.read_only);
        assert!(!a.hide_passwords);
    }

    #[test]
    fn collection_access_serializes_camel_case() {
        let access = CollectionAccess::writable(Uuid::from_u128(7));
        let value = serde_json::to_value(&access).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "00000000-0000-0000-0000-000000000007",
                "readOnly": false,
                "hidePasswords": false,
            })
        );
    }

    #[test]
    fn organization_user_data_pascal_case() {
        let json = r#"{
            "Id": "44444444-4444-4444-4444-444444444444",
            "UserId": "55555555-5555-5555-5555-555555555555",
            "Email": "user@example.com",
            "Status": 2,
            "Type": 2,
            "AccessAll": false,
            "ExternalId": null,
            "Collections": [
                {"Id": "33333333-3333-3333-3333-333333333333", "ReadOnly": false, "HidePasswords": false}
            ],
            "TwoFactorEnabled": true,
            "Object": "organizationUserUserDetails"
        }"#;
        let data: OrganizationUserData = serde_json::from_str(json).unwrap();
        assert_eq!(data.email, "user@example.com");
        assert_eq!(data.status, OrganizationUserStatus::Confirmed);
        assert_eq!(data.user_type, OrganizationUserType::User);
        assert_eq!(data.collections.len(), 1);
        assert!(data.two_factor_enabled);
        assert_eq!(
            data.extra.get("Object").and_then(Value::as_str),
            Some("organizationUserUserDetails")
        );
    }

    #[test]
    fn organization_user_data_camel_case() {
        let json = r#"{
            "id": "44444444-4444-4444-4444-444444444444",
            "email": "user@example.com",
            "status": -1,
            "type": 0,
            "accessAll": true,
            "collections": []
        }"#;
        let data: OrganizationUserData = serde_json::from_str(json).unwrap();
        assert_eq!(data.status, OrganizationUserStatus::Revoked);
        assert_eq!(data.user_type, OrganizationUserType::Owner);
        assert!(data.access_all);
    }

    #[test]
    fn cipher_data_both_casings() {
        let pascal = r#"{
            "Id": "66666666-6666-6666-6666-666666666666",
            "OrganizationId": "22222222-2222-2222-2222-222222222222",
            "Type": 1,
            "Name": "2.iv|ct|mac",
            "CollectionIds": ["33333333-3333-3333-3333-333333333333"]
        }"#;
        let data: CipherData = serde_json::from_str(pascal).unwrap();
        assert_eq!(data.cipher_type, CipherType::Login);
        assert_eq!(data.collection_ids.len(), 1);

        let camel = r#"{
            "id": "66666666-6666-6666-6666-666666666666",
            "type": 2,
            "name": "2.iv|ct|mac",
            "collectionIds": []
        }"#;
        let data: CipherData = serde_json::from_str(camel).unwrap();
        assert_eq!(data.cipher_type, CipherType::SecureNote);
    }

    #[test]
    fn data_list_envelope() {
        let json = r#"{"Data": [{"Id": "33333333-3333-3333-3333-333333333333"}], "Object": "list", "ContinuationToken": null}"#;
        let list: DataList<CollectionMember> = serde_json::from_str(json).unwrap();
        assert_eq!(list.data.len(), 1);
    }

    #[test]
    fn access_update_payload_shape() {
        let payload = AccessUpdate {
            collections: &[CollectionAccess::writable(Uuid::from_u128(1))],
            groups: &[],
            access_all: false,
            user_type: OrganizationUserType::Manager,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["accessAll"], json!(false));
        assert_eq!(value["type"], json!(3));
        assert_eq!(value["collections"][0]["readOnly"], json!(false));
        assert!(value["groups"].as_array().unwrap().is_empty());
    }

    #[test]
    fn invite_payload_shape() {
        let payload = InvitePayload {
            emails: ["new@example.com"],
            collections: &[],
            groups: &[],
            access_all: true,
            user_type: OrganizationUserType::User,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["emails"], json!(["new@example.com"]));
        assert_eq!(value["accessAll"], json!(true));
        assert_eq!(value["type"], json!(2));
        assert!(value["collections"].as_array().unwrap().is_empty());
    }
}
