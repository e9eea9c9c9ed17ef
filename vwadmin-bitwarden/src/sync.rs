//! `api/sync` account snapshot models.
//!
//! Only the profile section is interpreted — it carries the authenticated
//! user's organization memberships and their wrapped keys. The remaining
//! sections are kept as raw JSON so nothing the server sends is lost.

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::VaultwardenUserStatus;

impl SyncResponse {
    /// The wrapped symmetric key of the given organization, located by
    /// scanning the profile memberships. `None` when the organization is
    /// not in the profile or carries no key — callers treat that as a
    /// fatal lookup failure.
    pub fn wrapped_organization_key(&self, organization_id: Uuid) -> Option<&str> {
        self.profile
            .organizations
            .iter()
            .find(|org| org.id == organization_id)
            .and_then(|org| org.key.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    #[serde(alias = "Profile")]
    pub profile: UserProfile,
    #[serde(alias = "Ciphers", default)]
    pub ciphers: Vec<Value>,
    #[serde(alias = "Collections", default)]
    pub collections: Vec<Value>,
    #[serde(alias = "Folders", default)]
    pub folders: Vec<Value>,
    #[serde(alias = "Policies", default)]
    pub policies: Vec<Value>,
    #[serde(alias = "Sends", default)]
    pub sends: Vec<Value>,
    #[serde(alias = "Domains", default)]
    pub domains: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    #[serde(alias = "Id")]
    pub id: Uuid,
    #[serde(alias = "Email")]
    pub email: String,
    #[serde(alias = "Name", default)]
    pub name: Option<String>,
    /// The user's wrapped symmetric key.
    #[serde(alias = "Key", default)]
    pub key: Option<String>,
    #[serde(alias = "PrivateKey", alias = "privateKey", default)]
    pub private_key: Option<String>,
    #[serde(alias = "EmailVerified", alias = "emailVerified", default)]
    pub email_verified: bool,
    #[serde(alias = "TwoFactorEnabled", alias = "twoFactorEnabled", default)]
    pub two_factor_enabled: bool,
    /// Vaultwarden's internal account status, emitted as `_status`.
    #[serde(rename = "_status", alias = "_Status", default)]
    pub status: VaultwardenUserStatus,
    #[serde(alias = "Organizations", default)]
    pub organizations: Vec<ProfileOrganization>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An organization membership as seen from the user's profile. `key` is
/// the organization symmetric key wrapped for this user.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileOrganization {
    #[serde(alias = "Id")]
    pub id: Uuid,
    #[serde(alias = "Name", default)]
    pub name: Option<String>,
    #[serde(alias = "Key", default)]
    pub key: Option<String>,
    #[serde(alias = "Status", default)]
    pub status: Option<i32>,
    #[serde(alias = "Type", alias = "type", default)]
    pub membership_type: Option<i32>,
    #[serde(alias = "Enabled", default)]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
