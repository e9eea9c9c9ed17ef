//! Vaultwarden `/admin` panel client.
//!
//! The panel authenticates with a cookie session: posting the admin secret
//! token to the admin root answers with a `VW_ADMIN` cookie that is
//! attached to every subsequent request. Server users are cached in a
//! local index keyed by id and by email (the panel has no query-by-email
//! endpoint); the index is dropped on every mutating call and rebuilt on
//! the next lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE, SET_COOKIE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use vwadmin_core::clock::{Clock, SystemClock};

use crate::error::AdminError;
use crate::models::VaultwardenUser;

const COOKIE_NAME: &str = "VW_ADMIN";

/// Connection parameters for [`AdminClient`]. `url` and `admin_token` are
/// required.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct AdminConfig {
    /// Server base URL, e.g. `https://vault.example.com`.
    pub url: String,
    /// The `ADMIN_TOKEN` configured on the server.
    pub admin_token: String,
    /// Fetch the full user list once at connect time.
    #[serde(default)]
    pub preload_users: bool,
}

impl AdminConfig {
    fn validate(&self) -> Result<(), AdminError> {
        if self.url.is_empty() || self.admin_token.is_empty() {
            return Err(AdminError::Config(
                "url and admin_token are required".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("url", &self.url)
            .field("admin_token", &"[redacted]")
            .field("preload_users", &self.preload_users)
            .finish()
    }
}

/// An established admin cookie session.
#[derive(Clone)]
pub(crate) struct AdminSession {
    /// The `VW_ADMIN=<value>` pair sent back on every request.
    cookie: String,
    /// Expiry derived from `Max-Age`, if the server announced one. A
    /// session cookie without it stays valid until the server answers 401.
    expires_at: Option<SystemTime>,
}

impl AdminSession {
    fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

impl std::fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSession")
            .field("cookie", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Parse a `Set-Cookie` header into a session if it carries the admin
/// cookie. Expiry is computed once, against the injected clock.
pub(crate) fn parse_admin_cookie(header: &str, now: SystemTime) -> Option<AdminSession> {
    let mut segments = header.split(';').map(str::trim);
    let pair = segments.next()?;
    let (name, _value) = pair.split_once('=')?;
    if name != COOKIE_NAME {
        return None;
    }

    let mut expires_at = None;
    for segment in segments {
        if let Some((key, value)) = segment.split_once('=') {
            if key.eq_ignore_ascii_case("max-age") {
                if let Ok(secs) = value.trim().parse::<u64>() {
                    expires_at = Some(now + Duration::from_secs(secs));
                }
            }
        }
    }

    Some(AdminSession {
        cookie: pair.to_string(),
        expires_at,
    })
}

/// The admin operations the account workflows need. [`AdminClient`] is the
/// production implementation; tests substitute an in-memory directory.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    /// Look a user up by email or id.
    async fn get_user(&self, search: &str) -> Result<VaultwardenUser, AdminError>;

    /// Invite an email. `Ok(None)` means the address already has an
    /// account (the panel answers 409).
    async fn invite(&self, email: &str) -> Result<Option<VaultwardenUser>, AdminError>;

    /// Delete an account outright.
    async fn delete_user(&self, id: Uuid) -> Result<(), AdminError>;

    /// Enable or disable an account. Disabling also revokes its sessions.
    async fn set_user_enabled(&self, id: Uuid, enabled: bool) -> Result<(), AdminError>;
}

struct UserIndex {
    by_id: HashMap<Uuid, VaultwardenUser>,
    id_by_email: HashMap<String, Uuid>,
}

impl UserIndex {
    fn build(users: &[VaultwardenUser]) -> Self {
        let mut by_id = HashMap::new();
        let mut id_by_email = HashMap::new();
        for user in users {
            id_by_email.insert(user.email.clone(), user.id);
            by_id.insert(user.id, user.clone());
        }
        Self { by_id, id_by_email }
    }
}

/// Client for the Vaultwarden admin panel.
pub struct AdminClient {
    http: reqwest::Client,
    base_url: String,
    config: AdminConfig,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<AdminSession>>,
    index: Mutex<Option<UserIndex>>,
}

impl AdminClient {
    pub fn new(config: AdminConfig) -> Result<Self, AdminError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AdminConfig, clock: Arc<dyn Clock>) -> Result<Self, AdminError> {
        config.validate()?;
        // The login reply is a redirect carrying the Set-Cookie header;
        // redirects must not be followed or the cookie is lost.
        let http = reqwest::Client::builder()
            .user_agent(format!("vwadmin/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let base_url = config.url.trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            config,
            clock,
            session: Mutex::new(None),
            index: Mutex::new(None),
        })
    }

    /// Construct and, when `preload_users` is set, warm the user index.
    pub async fn connect(config: AdminConfig) -> Result<Self, AdminError> {
        let preload = config.preload_users;
        let client = Self::new(config)?;
        if preload {
            client.users().await?;
        }
        Ok(client)
    }

    async fn ensure_session(&self) -> Result<(), AdminError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if !session.is_expired(self.clock.now()) {
                return Ok(());
            }
        }

        debug!("establishing admin session");
        let url = format!("{}/admin", self.base_url);
        let mut form = HashMap::new();
        form.insert("token", self.config.admin_token.as_str());

        let resp = self.http.post(&url).form(&form).send().await?;
        let status = resp.status();
        if !status.is_success() && !status.is_redirection() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdminError::Auth(format!(
                "admin login failed ({status}): {body}"
            )));
        }

        let now = self.clock.now();
        let session = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .find_map(|h| parse_admin_cookie(h, now))
            .ok_or_else(|| {
                AdminError::Auth("admin login did not set a session cookie".to_string())
            })?;

        *guard = Some(session);
        info!("admin session established");
        Ok(())
    }

    async fn admin_request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, AdminError> {
        self.ensure_session().await?;
        let cookie = {
            let guard = self.session.lock().await;
            guard
                .as_ref()
                .map(|s| s.cookie.clone())
                .ok_or_else(|| AdminError::Auth("no admin session".to_string()))?
        };

        let url = format!("{}/admin/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%method, %path, "admin request");

        let mut req = self
            .http
            .request(method, &url)
            .header(COOKIE, cookie)
            .header(ACCEPT, "application/json");
        if let Some(body) = &body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if status.as_u16() >= 400 {
            if status == StatusCode::FORBIDDEN {
                error!(%path, "403 Forbidden: the admin session cannot access this resource");
            }
            if status == StatusCode::UNAUTHORIZED {
                let mut guard = self.session.lock().await;
                *guard = None;
            }
            return Err(AdminError::Request {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn invalidate_index(&self) {
        let mut guard = self.index.lock().await;
        *guard = None;
    }

    /// Fetch all server users and rebuild the local index.
    pub async fn users(&self) -> Result<Vec<VaultwardenUser>, AdminError> {
        let value = self.admin_request(Method::GET, "users", None).await?;
        let users: Vec<VaultwardenUser> = serde_json::from_value(value)?;
        let mut guard = self.index.lock().await;
        *guard = Some(UserIndex::build(&users));
        debug!(count = users.len(), "user index rebuilt");
        Ok(users)
    }

    /// Resolve `search` (email or id) against the index, populating it
    /// first if empty. Email matching is exact.
    async fn resolve_user_id(&self, search: &str) -> Result<Uuid, AdminError> {
        // Some(hit) when the index exists, None when it has to be built.
        let lookup = {
            let guard = self.index.lock().await;
            guard
                .as_ref()
                .map(|index| index.id_by_email.get(search).copied())
        };
        let resolved = match lookup {
            Some(hit) => hit,
            None => {
                self.users().await?;
                let guard = self.index.lock().await;
                guard
                    .as_ref()
                    .and_then(|index| index.id_by_email.get(search).copied())
            }
        };
        if let Some(id) = resolved {
            return Ok(id);
        }
        if search.contains('@') {
            // an email that is not in the freshly built index does not exist
            return Err(AdminError::UserNotFound(search.to_string()));
        }
        Uuid::parse_str(search).map_err(|_| AdminError::UserNotFound(search.to_string()))
    }

    /// Look a user up by email (via the index) or id (direct fetch).
    pub async fn get_user(&self, search: &str) -> Result<VaultwardenUser, AdminError> {
        let id = self.resolve_user_id(search).await?;
        let value = self
            .admin_request(Method::GET, &format!("users/{id}"), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Look a user up from the cached index without a per-user request.
    pub async fn cached_user(&self, search: &str) -> Result<Option<VaultwardenUser>, AdminError> {
        let id = match self.resolve_user_id(search).await {
            Ok(id) => id,
            Err(AdminError::UserNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let guard = self.index.lock().await;
        Ok(guard.as_ref().and_then(|index| index.by_id.get(&id).cloned()))
    }

    /// Invite an email to the server. `Ok(None)` when the address already
    /// has an account.
    pub async fn invite(&self, email: &str) -> Result<Option<VaultwardenUser>, AdminError> {
        let result = self
            .admin_request(
                Method::POST,
                "invite",
                Some(serde_json::json!({ "email": email })),
            )
            .await;
        self.invalidate_index().await;
        match result {
            Ok(value) => {
                info!(%email, "user invited");
                Ok(Some(serde_json::from_value(value)?))
            }
            Err(AdminError::Request { status: 409, .. }) => {
                debug!(%email, "invite skipped: user already exists");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete an account outright.
    pub async fn delete_user(&self, id: Uuid) -> Result<(), AdminError> {
        info!(user = %id, "deleting account");
        self.admin_request(Method::POST, &format!("users/{id}/delete"), None)
            .await?;
        self.invalidate_index().await;
        Ok(())
    }

    /// Enable or disable an account. Disabling also revokes all of its
    /// sessions.
    pub async fn set_user_enabled(&self, id: Uuid, enabled: bool) -> Result<(), AdminError> {
        let action = if enabled { "enable" } else { "disable" };
        info!(user = %id, action, "changing account state");
        self.admin_request(Method::POST, &format!("users/{id}/{action}"), None)
            .await?;
        self.invalidate_index().await;
        Ok(())
    }

    /// Remove a user's two-factor configuration.
    pub async fn remove_2fa(&self, email: &str) -> Result<(), AdminError> {
        let user = self.get_user(email).await?;
        self.admin_request(Method::POST, &format!("users/{}/remove-2fa", user.id), None)
            .await?;
        self.invalidate_index().await;
        Ok(())
    }
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl AdminDirectory for AdminClient {
    async fn get_user(&self, search: &str) -> Result<VaultwardenUser, AdminError> {
        AdminClient::get_user(self, search).await
    }

    async fn invite(&self, email: &str) -> Result<Option<VaultwardenUser>, AdminError> {
        AdminClient::invite(self, email).await
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), AdminError> {
        AdminClient::delete_user(self, id).await
    }

    async fn set_user_enabled(&self, id: Uuid, enabled: bool) -> Result<(), AdminError> {
        AdminClient::set_user_enabled(self, id, enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrganizationMembership;

    fn user(id: u128, email: &str) -> VaultwardenUser {
        VaultwardenUser {
            id: Uuid::from_u128(id),
            email: email.to_string(),
            name: None,
            user_enabled: true,
            two_factor_enabled: false,
            email_verified: true,
            created_at: None,
            last_active: None,
            status: Default::default(),
            organizations: Vec::<OrganizationMembership>::new(),
            extra: Default::default(),
        }
    }

    #[test]
    fn user_index_resolves_by_id_and_email() {
        let users = [user(1, "a@example.com"), user(2, "b@example.com")];
        let index = UserIndex::build(&users);

        assert_eq!(
            index.id_by_email.get("a@example.com"),
            Some(&Uuid::from_u128(1))
        );
        assert_eq!(
            index.by_id.get(&Uuid::from_u128(2)).map(|u| u.email.as_str()),
            Some("b@example.com")
        );
        assert!(index.id_by_email.get("c@example.com").is_none());
    }

    #[test]
    fn parse_admin_cookie_with_max_age() {
        let now = SystemTime::UNIX_EPOCH;
        let session = parse_admin_cookie(
            "VW_ADMIN=eyJhbGc.abc; Max-Age=1200; Path=/admin; HttpOnly; SameSite=Lax",
            now,
        )
        .unwrap();
        assert_eq!(session.cookie, "VW_ADMIN=eyJhbGc.abc");
        assert_eq!(
            session.expires_at,
            Some(now + Duration::from_secs(1200))
        );
        assert!(!session.is_expired(now + Duration::from_secs(1199)));
        assert!(session.is_expired(now + Duration::from_secs(1200)));
    }

    #[test]
    fn parse_admin_cookie_without_max_age_never_self_expires() {
        let now = SystemTime::UNIX_EPOCH;
        let session = parse_admin_cookie("VW_ADMIN=abc; Path=/admin; HttpOnly", now).unwrap();
        assert_eq!(session.expires_at, None);
        assert!(!session.is_expired(now + Duration::from_secs(u32::MAX as u64)));
    }

    #[test]
    fn parse_admin_cookie_ignores_other_cookies() {
        assert!(parse_admin_cookie("OTHER=abc; Max-Age=5", SystemTime::UNIX_EPOCH).is_none());
        assert!(parse_admin_cookie("garbage", SystemTime::UNIX_EPOCH).is_none());
    }

    #[test]
    fn config_requires_url_and_token() {
        let cfg = AdminConfig {
            url: String::new(),
            admin_token: "t".to_string(),
            preload_users: false,
        };
        assert!(matches!(
            AdminClient::new(cfg),
            Err(AdminError::Config(_))
        ));
    }

    #[test]
    fn config_debug_redacts_token() {
        let cfg = AdminConfig {
            url: "https://vault.example.com".to_string(),
            admin_token: "super-secret".to_string(),
            preload_users: false,
        };
        let debug = format!("{cfg:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn config_parses_from_toml() {
        let cfg: AdminConfig = toml::from_str(
            r#"
            url = "https://vault.example.com"
            admin_token = "t0ken"
        "#,
        )
        .unwrap();
        assert!(!cfg.preload_users);
        assert_eq!(cfg.url, "https://vault.example.com");
    }
}
