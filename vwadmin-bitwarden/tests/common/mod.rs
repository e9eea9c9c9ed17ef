#![allow(dead_code)]

//! In-memory vault server double.
//!
//! Implements `VaultApi` over a mutable organization state and records
//! every request, so entity and dedup behavior can be asserted without a
//! network: which paths were written, how often, and what the state looks
//! like afterwards. Responses use PascalCase keys, the casing Vaultwarden
//! itself prefers.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use uuid::Uuid;

use vwadmin_bitwarden::{VaultApi, VaultError};
use vwadmin_core::crypto::SymmetricKey;
use vwadmin_core::EncString;

pub const ORG_ID: Uuid = Uuid::from_u128(0x10);

pub struct FakeCollection {
    pub id: Uuid,
    pub name: String,
    /// (membership id, read_only, hide_passwords)
    pub members: Vec<(Uuid, bool, bool)>,
}

pub struct FakeOrgUser {
    pub id: Uuid,
    pub email: String,
    pub status: i32,
    pub user_type: i32,
    pub access_all: bool,
    /// (collection id, read_only, hide_passwords)
    pub collections: Vec<(Uuid, bool, bool)>,
    pub two_factor_enabled: bool,
}

pub struct FakeCipher {
    pub id: Uuid,
    pub cipher_type: i32,
    pub name: String,
    pub collection_ids: Vec<Uuid>,
}

pub struct VaultState {
    pub org_name: String,
    pub collections: Vec<FakeCollection>,
    pub users: Vec<FakeOrgUser>,
    pub ciphers: Vec<FakeCipher>,
    next_id: u128,
}

pub struct FakeVault {
    pub state: Mutex<VaultState>,
    pub org_key: SymmetricKey,
    pub log: Mutex<Vec<(Method, String)>>,
    /// `(method, path substring)` that should answer 500.
    pub fail_on: Mutex<Option<(Method, String)>>,
}

impl FakeVault {
    pub fn new(org_name: &str) -> Self {
        Self {
            state: Mutex::new(VaultState {
                org_name: org_name.to_string(),
                collections: Vec::new(),
                users: Vec::new(),
                ciphers: Vec::new(),
                next_id: 0x1000,
            }),
            org_key: SymmetricKey::from_bytes(&[0x42u8; 64]).unwrap(),
            log: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
        }
    }

    pub fn add_collection(&self, name: &str, members: &[Uuid]) -> Uuid {
        let mut state = self.state.lock().unwrap();
        let id = state.fresh_id();
        state.collections.push(FakeCollection {
            id,
            name: name.to_string(),
            members: members.iter().map(|m| (*m, false, false)).collect(),
        });
        id
    }

    pub fn add_user(&self, email: &str, collections: &[Uuid]) -> Uuid {
        let mut state = self.state.lock().unwrap();
        let id = state.fresh_id();
        state.users.push(FakeOrgUser {
            id,
            email: email.to_string(),
            status: 2,
            user_type: 2,
            access_all: false,
            collections: collections.iter().map(|c| (*c, false, false)).collect(),
            two_factor_enabled: false,
        });
        id
    }

    pub fn add_cipher(&self, name: &str, collection_ids: &[Uuid]) -> Uuid {
        let mut state = self.state.lock().unwrap();
        let id = state.fresh_id();
        state.ciphers.push(FakeCipher {
            id,
            cipher_type: 1,
            name: name.to_string(),
            collection_ids: collection_ids.to_vec(),
        });
        id
    }

    pub fn fail_on(&self, method: Method, path_fragment: &str) {
        *self.fail_on.lock().unwrap() = Some((method, path_fragment.to_string()));
    }

    /// How many requests of `method` hit a path containing `fragment`.
    pub fn calls(&self, method: Method, fragment: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, p)| *m == method && p.contains(fragment))
            .count()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .collections
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    fn encrypt(&self, plaintext: &str) -> String {
        EncString::encrypt_symmetric(plaintext.as_bytes(), &self.org_key)
            .unwrap()
            .to_string()
    }

    fn decrypt(&self, wire: &str) -> String {
        EncString::parse(wire)
            .unwrap()
            .decrypt_to_string(&self.org_key)
            .unwrap()
    }

    fn collection_json(&self, coll: &FakeCollection) -> Value {
        json!({
            "Id": coll.id,
            "OrganizationId": ORG_ID,
            "Name": self.encrypt(&coll.name),
            "ExternalId": null,
            "Object": "collection",
        })
    }

    fn user_json(&self, user: &FakeOrgUser) -> Value {
        json!({
            "Id": user.id,
            "UserId": null,
            "Email": user.email,
            "Status": user.status,
            "Type": user.user_type,
            "AccessAll": user.access_all,
            "ExternalId": null,
            "Collections": user
                .collections
                .iter()
                .map(|(id, ro, hp)| json!({"Id": id, "ReadOnly": ro, "HidePasswords": hp}))
                .collect::<Vec<_>>(),
            "TwoFactorEnabled": user.two_factor_enabled,
            "Object": "organizationUserUserDetails",
        })
    }

    fn cipher_json(&self, cipher: &FakeCipher) -> Value {
        json!({
            "Id": cipher.id,
            "OrganizationId": ORG_ID,
            "Type": cipher.cipher_type,
            "Name": self.encrypt(&cipher.name),
            "CollectionIds": cipher.collection_ids,
            "Object": "cipherMiniDetails",
        })
    }
}

impl VaultState {
    fn fresh_id(&mut self) -> Uuid {
        self.next_id += 1;
        Uuid::from_u128(self.next_id)
    }
}

fn not_found(path: &str) -> VaultError {
    VaultError::Request {
        status: 404,
        body: format!("no route for {path}"),
    }
}

fn uuid_seg(seg: &str, path: &str) -> Result<Uuid, VaultError> {
    Uuid::parse_str(seg).map_err(|_| not_found(path))
}

/// Read a grant/member id from either casing.
fn row_id(row: &Value) -> Option<Uuid> {
    row.get("id")
        .or_else(|| row.get("Id"))
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn row_flag(row: &Value, camel: &str, pascal: &str) -> bool {
    row.get(camel)
        .or_else(|| row.get(pascal))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[async_trait]
impl VaultApi for FakeVault {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, VaultError> {
        self.log.lock().unwrap().push((method.clone(), path.to_string()));

        if let Some((fail_method, fragment)) = self.fail_on.lock().unwrap().as_ref() {
            if *fail_method == method && path.contains(fragment.as_str()) {
                return Err(VaultError::Request {
                    status: 500,
                    body: "injected failure".to_string(),
                });
            }
        }

        let (route, query) = match path.split_once('?') {
            Some((route, query)) => (route, query),
            None => (path, ""),
        };
        let segments: Vec<&str> = route.split('/').collect();
        let mut state = self.state.lock().unwrap();

        match (method, segments.as_slice()) {
            (Method::GET, ["api", "organizations", org]) => {
                let org = uuid_seg(org, path)?;
                if org != ORG_ID {
                    return Err(not_found(path));
                }
                Ok(json!({
                    "Id": ORG_ID,
                    "Name": state.org_name,
                    "Object": "organization",
                }))
            }
            (Method::GET, ["api", "organizations", _, "collections"]) => {
                let data: Vec<Value> = state
                    .collections
                    .iter()
                    .map(|c| self.collection_json(c))
                    .collect();
                Ok(json!({"Data": data, "Object": "list", "ContinuationToken": null}))
            }
            (Method::POST, ["api", "organizations", _, "collections"]) => {
                let body = body.ok_or_else(|| not_found(path))?;
                let wire_name = body
                    .get("name")
                    .or_else(|| body.get("Name"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| not_found(path))?
                    .to_string();
                let name = self.decrypt(&wire_name);
                let id = state.fresh_id();
                state.collections.push(FakeCollection {
                    id,
                    name,
                    members: Vec::new(),
                });
                Ok(json!({
                    "Id": id,
                    "OrganizationId": ORG_ID,
                    "Name": wire_name,
                    "ExternalId": null,
                    "Object": "collection",
                }))
            }
            (Method::DELETE, ["api", "organizations", _, "collections", cid]) => {
                let cid = uuid_seg(cid, path)?;
                state.collections.retain(|c| c.id != cid);
                for cipher in &mut state.ciphers {
                    cipher.collection_ids.retain(|id| *id != cid);
                }
                Ok(Value::Null)
            }
            (Method::GET, ["api", "organizations", _, "collections", cid, "users"]) => {
                let cid = uuid_seg(cid, path)?;
                let coll = state
                    .collections
                    .iter()
                    .find(|c| c.id == cid)
                    .ok_or_else(|| not_found(path))?;
                let rows: Vec<Value> = coll
                    .members
                    .iter()
                    .map(|(id, ro, hp)| json!({"Id": id, "ReadOnly": ro, "HidePasswords": hp}))
                    .collect();
                Ok(Value::Array(rows))
            }
            (Method::PUT, ["api", "organizations", _, "collections", cid, "users"]) => {
                let cid = uuid_seg(cid, path)?;
                let rows = body
                    .as_ref()
                    .and_then(Value::as_array)
                    .ok_or_else(|| not_found(path))?;
                let members: Vec<(Uuid, bool, bool)> = rows
                    .iter()
                    .filter_map(|row| {
                        row_id(row).map(|id| {
                            (
                                id,
                                row_flag(row, "readOnly", "ReadOnly"),
                                row_flag(row, "hidePasswords", "HidePasswords"),
                            )
                        })
                    })
                    .collect();
                let coll = state
                    .collections
                    .iter_mut()
                    .find(|c| c.id == cid)
                    .ok_or_else(|| not_found(path))?;
                coll.members = members;
                Ok(Value::Null)
            }
            (Method::GET, ["api", "organizations", _, "users"]) => {
                let _ = query;
                let data: Vec<Value> = state.users.iter().map(|u| self.user_json(u)).collect();
                Ok(json!({"Data": data, "Object": "list", "ContinuationToken": null}))
            }
            (Method::POST, ["api", "organizations", _, "users", "invite"]) => {
                let body = body.ok_or_else(|| not_found(path))?;
                let email = body["emails"][0]
                    .as_str()
                    .ok_or_else(|| not_found(path))?
                    .to_string();
                let collections: Vec<(Uuid, bool, bool)> = body["collections"]
                    .as_array()
                    .map(|rows| {
                        rows.iter()
                            .filter_map(|row| {
                                row_id(row).map(|id| {
                                    (
                                        id,
                                        row_flag(row, "readOnly", "ReadOnly"),
                                        row_flag(row, "hidePasswords", "HidePasswords"),
                                    )
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let access_all = body["accessAll"].as_bool().unwrap_or(false);
                let user_type = body["type"].as_i64().unwrap_or(2) as i32;
                let id = state.fresh_id();
                state.users.push(FakeOrgUser {
                    id,
                    email,
                    status: 0,
                    user_type,
                    access_all,
                    collections,
                    two_factor_enabled: false,
                });
                Ok(Value::Null)
            }
            (Method::GET, ["api", "organizations", _, "users", mid]) => {
                let mid = uuid_seg(mid, path)?;
                let user = state
                    .users
                    .iter()
                    .find(|u| u.id == mid)
                    .ok_or_else(|| not_found(path))?;
                Ok(self.user_json(user))
            }
            (Method::POST, ["api", "organizations", _, "users", mid]) => {
                let mid = uuid_seg(mid, path)?;
                let body = body.ok_or_else(|| not_found(path))?;
                let collections: Vec<(Uuid, bool, bool)> = body["collections"]
                    .as_array()
                    .map(|rows| {
                        rows.iter()
                            .filter_map(|row| {
                                row_id(row).map(|id| {
                                    (
                                        id,
                                        row_flag(row, "readOnly", "ReadOnly"),
                                        row_flag(row, "hidePasswords", "HidePasswords"),
                                    )
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let user = state
                    .users
                    .iter_mut()
                    .find(|u| u.id == mid)
                    .ok_or_else(|| not_found(path))?;
                user.collections = collections;
                if let Some(access_all) = body["accessAll"].as_bool() {
                    user.access_all = access_all;
                }
                if let Some(user_type) = body["type"].as_i64() {
                    user.user_type = user_type as i32;
                }
                Ok(Value::Null)
            }
            (Method::DELETE, ["api", "organizations", _, "users", mid]) => {
                let mid = uuid_seg(mid, path)?;
                state.users.retain(|u| u.id != mid);
                Ok(Value::Null)
            }
            (Method::GET, ["api", "ciphers", "organization-details"]) => {
                let data: Vec<Value> = state.ciphers.iter().map(|c| self.cipher_json(c)).collect();
                Ok(json!({"Data": data, "Object": "list", "ContinuationToken": null}))
            }
            (Method::POST, ["api", "ciphers", cid, "collections"]) => {
                let cid = uuid_seg(cid, path)?;
                let ids: Vec<Uuid> = body
                    .as_ref()
                    .and_then(|b| b.get("collectionIds"))
                    .and_then(Value::as_array)
                    .map(|rows| {
                        rows.iter()
                            .filter_map(Value::as_str)
                            .filter_map(|s| Uuid::parse_str(s).ok())
                            .collect()
                    })
                    .ok_or_else(|| not_found(path))?;
                let cipher = state
                    .ciphers
                    .iter_mut()
                    .find(|c| c.id == cid)
                    .ok_or_else(|| not_found(path))?;
                cipher.collection_ids = ids;
                Ok(Value::Null)
            }
            (Method::DELETE, ["api", "ciphers", cid]) => {
                let cid = uuid_seg(cid, path)?;
                state.ciphers.retain(|c| c.id != cid);
                Ok(Value::Null)
            }
            _ => Err(not_found(path)),
        }
    }

    async fn organization_key(&self, organization_id: Uuid) -> Result<SymmetricKey, VaultError> {
        if organization_id == ORG_ID {
            Ok(self.org_key.clone())
        } else {
            Err(VaultError::NotFound(format!(
                "organization {organization_id} not present in the authenticated profile"
            )))
        }
    }
}
