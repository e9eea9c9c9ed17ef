//! Admin-side user records.
//!
//! These describe accounts as the `/admin` panel sees them — a distinct
//! identity space from the per-organization membership rows of the vault
//! API (`OrganizationUserDetails`). The link between the two is the email
//! address and the organization ids listed here.

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

pub use vwadmin_bitwarden::VaultwardenUserStatus;

/// A server-wide user account as reported by `admin/users`.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultwardenUser {
    #[serde(alias = "Id")]
    pub id: Uuid,
    #[serde(alias = "Email")]
    pub email: String,
    #[serde(alias = "Name", default)]
    pub name: Option<String>,
    #[serde(alias = "UserEnabled", alias = "userEnabled", default)]
    pub user_enabled: bool,
    #[serde(alias = "TwoFactorEnabled", alias = "twoFactorEnabled", default)]
    pub two_factor_enabled: bool,
    #[serde(alias = "EmailVerified", alias = "emailVerified", default)]
    pub email_verified: bool,
    #[serde(alias = "CreatedAt", alias = "createdAt", default)]
    pub created_at: Option<String>,
    #[serde(alias = "LastActive", alias = "lastActive", default)]
    pub last_active: Option<String>,
    #[serde(rename = "_status", alias = "_Status", default)]
    pub status: VaultwardenUserStatus,
    /// Organization memberships, id and name only.
    #[serde(alias = "Organizations", default)]
    pub organizations: Vec<OrganizationMembership>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationMembership {
    #[serde(alias = "Id")]
    pub id: Uuid,
    #[serde(alias = "Name", default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_pascal_case_with_status_alias() {
        let json = r#"{
            "Id": "11111111-1111-1111-1111-111111111111",
            "Email": "user@example.com",
            "Name": "User",
            "UserEnabled": true,
            "TwoFactorEnabled": false,
            "EmailVerified": true,
            "CreatedAt": "2026-01-15T12:30:00.000Z",
            "_Status": 0,
            "Organizations": [
                {"Id": "22222222-2222-2222-2222-222222222222", "Name": "Acme"}
            ],
            "SecurityStamp": "abc"
        }"#;
        let user: VaultwardenUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.status, VaultwardenUserStatus::Enabled);
        assert_eq!(user.organizations.len(), 1);
        assert_eq!(user.organizations[0].name.as_deref(), Some("Acme"));
        assert!(user.user_enabled);
        assert_eq!(
            user.extra.get("SecurityStamp").and_then(Value::as_str),
            Some("abc")
        );
    }

    #[test]
    fn user_camel_case_with_lowercase_status() {
        let json = r#"{
            "id": "11111111-1111-1111-1111-111111111111",
            "email": "user@example.com",
            "userEnabled": false,
            "twoFactorEnabled": true,
            "_status": 2,
            "organizations": []
        }"#;
        let user: VaultwardenUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.status, VaultwardenUserStatus::Disabled);
        assert!(!user.user_enabled);
        assert!(user.two_factor_enabled);
        assert!(user.organizations.is_empty());
    }

    #[test]
    fn status_defaults_to_enabled_when_absent() {
        let json = r#"{"id": "11111111-1111-1111-1111-111111111111", "email": "a@b.c"}"#;
        let user: VaultwardenUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.status, VaultwardenUserStatus::Enabled);
    }
}
