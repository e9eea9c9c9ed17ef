//! Vault API client: authentication lifecycle and the single
//! authenticated-request primitive.
//!
//! Every higher-level operation funnels through [`VaultApi::request`]; the
//! only network calls that bypass it are the token-endpoint exchanges that
//! establish the session.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use vwadmin_core::clock::{Clock, SystemClock};
use vwadmin_core::crypto::SymmetricKey;
use vwadmin_core::EncString;

use crate::error::VaultError;
use crate::session::{renewal_action, ConnectToken, RefreshedToken, Renewal, Session};
use crate::sync::SyncResponse;

/// Device type 21 ("SDK") — what the server expects from API-key clients.
const DEVICE_TYPE: &str = "21";
const DEVICE_NAME: &str = "vwadmin";

/// The authenticated request primitive plus the organization-key lookup
/// that every ciphertext-bearing entity needs.
///
/// The entity layer and the lifecycle workflows are written against this
/// trait so they can run against an in-memory fake in tests.
#[async_trait]
pub trait VaultApi: Send + Sync {
    /// Execute an authenticated JSON request against `path` (relative to
    /// the server base URL). Any status >= 400 becomes
    /// [`VaultError::Request`]; an empty 2xx body decodes to `Value::Null`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, VaultError>;

    /// The symmetric key of an organization, unwrapped with the session's
    /// private key. The organization is located in the authenticated
    /// profile; no match is a hard lookup error.
    async fn organization_key(&self, organization_id: Uuid) -> Result<SymmetricKey, VaultError>;
}

/// Connection parameters for [`BitwardenClient`]. Every field is required.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct BitwardenConfig {
    /// Server base URL, e.g. `https://vault.example.com`.
    pub url: String,
    pub email: String,
    pub password: String,
    /// Personal API key pair (`user.<uuid>` / `client_secret`).
    pub client_id: String,
    pub client_secret: String,
    /// Stable device identifier registered with the server.
    pub device_id: Uuid,
}

impl BitwardenConfig {
    fn validate(&self) -> Result<(), VaultError> {
        let missing: Vec<&str> = [
            ("url", self.url.is_empty()),
            ("email", self.email.is_empty()),
            ("password", self.password.is_empty()),
            ("client_id", self.client_id.is_empty()),
            ("client_secret", self.client_secret.is_empty()),
        ]
        .iter()
        .filter(|(_, empty)| *empty)
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(VaultError::Config(format!(
                "missing required parameter(s): {}",
                missing.join(", ")
            )))
        }
    }
}

impl std::fmt::Debug for BitwardenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitwardenConfig")
            .field("url", &self.url)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Bitwarden vault API client with cached session state.
///
/// Designed for single-threaded use: the interior mutexes make `&self`
/// methods possible, they are not an invitation to issue concurrent
/// requests from one instance.
pub struct BitwardenClient {
    http: reqwest::Client,
    base_url: String,
    config: BitwardenConfig,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<Session>>,
    sync_cache: Mutex<Option<SyncResponse>>,
}

impl BitwardenClient {
    pub fn new(config: BitwardenConfig) -> Result<Self, VaultError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Construct with an explicit clock. Expiry is computed and checked
    /// against this clock only.
    pub fn with_clock(config: BitwardenConfig, clock: Arc<dyn Clock>) -> Result<Self, VaultError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(format!("vwadmin/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        let base_url = config.url.trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            config,
            clock,
            session: Mutex::new(None),
            sync_cache: Mutex::new(None),
        })
    }

    /// Make sure a live credential exists. Idempotent: a no-op while the
    /// current token is valid, a refresh-token exchange when it expired
    /// with a refresh token at hand (keys untouched), and a full
    /// client-credentials login otherwise.
    pub async fn ensure_valid(&self) -> Result<(), VaultError> {
        let mut guard = self.session.lock().await;
        match renewal_action(guard.as_ref(), self.clock.now()) {
            Renewal::Keep => Ok(()),
            Renewal::Refresh => {
                // renewal_action only answers Refresh when the token exists
                let refresh_token = guard
                    .as_ref()
                    .and_then(|s| s.refresh_token())
                    .map(str::to_string)
                    .ok_or_else(|| VaultError::Auth("refresh token vanished".to_string()))?;
                debug!("access token expired, refreshing");
                let refreshed = self.exchange_refresh_token(&refresh_token).await?;
                let now = self.clock.now();
                if let Some(session) = guard.as_mut() {
                    session.apply_refresh(refreshed, now);
                }
                info!("access token refreshed");
                Ok(())
            }
            Renewal::Login => {
                debug!(email = %self.config.email, "performing client_credentials login");
                let token = self.exchange_client_credentials().await?;
                let now = self.clock.now();
                let session =
                    Session::unlock(token, &self.config.email, &self.config.password, now)?;
                *guard = Some(session);
                info!(email = %self.config.email, "session established");
                Ok(())
            }
        }
    }

    /// The current access token. Call [`Self::ensure_valid`] immediately
    /// before every use.
    pub async fn bearer(&self) -> Result<String, VaultError> {
        let guard = self.session.lock().await;
        guard
            .as_ref()
            .map(|s| s.bearer().to_string())
            .ok_or_else(|| VaultError::Auth("no active session".to_string()))
    }

    /// The cached `api/sync` account snapshot.
    pub async fn sync(&self, force_refresh: bool) -> Result<SyncResponse, VaultError> {
        if !force_refresh {
            let guard = self.sync_cache.lock().await;
            if let Some(sync) = guard.as_ref() {
                return Ok(sync.clone());
            }
        }
        let value = self.request(Method::GET, "api/sync", None).await?;
        let sync: SyncResponse = serde_json::from_value(value)?;
        debug!(
            organizations = sync.profile.organizations.len(),
            "account snapshot fetched"
        );
        let mut guard = self.sync_cache.lock().await;
        *guard = Some(sync.clone());
        Ok(sync)
    }

    async fn exchange_client_credentials(&self) -> Result<ConnectToken, VaultError> {
        let url = format!("{}/identity/connect/token", self.base_url);

        let mut form = HashMap::new();
        form.insert("grant_type", "client_credentials".to_string());
        form.insert("client_id", self.config.client_id.clone());
        form.insert("client_secret", self.config.client_secret.clone());
        form.insert("scope", "api".to_string());
        form.insert("deviceType", DEVICE_TYPE.to_string());
        form.insert("deviceIdentifier", self.config.device_id.to_string());
        form.insert("deviceName", DEVICE_NAME.to_string());

        let resp = self.http.post(&url).form(&form).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(VaultError::Auth(format!(
                "token request failed ({status}): {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| VaultError::Auth(format!("token response parse: {e}")))
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshedToken, VaultError> {
        let url = format!("{}/identity/connect/token", self.base_url);

        let mut form = HashMap::new();
        form.insert("grant_type", "refresh_token");
        form.insert("refresh_token", refresh_token);

        let resp = self.http.post(&url).form(&form).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(VaultError::Auth(format!(
                "token refresh failed ({status}): {body}"
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| VaultError::Auth(format!("refresh response parse: {e}")))
    }
}

impl std::fmt::Debug for BitwardenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitwardenClient")
            .field("base_url", &self.base_url)
            .field("email", &self.config.email)
            .finish()
    }
}

#[async_trait]
impl VaultApi for BitwardenClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, VaultError> {
        self.ensure_valid().await?;
        let bearer = self.bearer().await?;

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%method, %path, "api request");

        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(&bearer)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(ACCEPT, "*/*");
        if let Some(body) = &body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if status.as_u16() >= 400 {
            if status == StatusCode::FORBIDDEN {
                error!(%path, "403 Forbidden: the acting account cannot access this resource");
            }
            if status == StatusCode::UNAUTHORIZED {
                // the server no longer honors this session; drop it so the
                // next call re-authenticates from scratch
                let mut guard = self.session.lock().await;
                *guard = None;
            }
            return Err(VaultError::Request {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn organization_key(&self, organization_id: Uuid) -> Result<SymmetricKey, VaultError> {
        let sync = self.sync(false).await?;

        let raw_key = sync
            .wrapped_organization_key(organization_id)
            .map(str::to_string)
            .ok_or_else(|| {
                VaultError::NotFound(format!(
                    "organization {organization_id} not present in the authenticated profile"
                ))
            })?;

        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| VaultError::Auth("no active session".to_string()))?;

        let key_bytes = EncString::parse(&raw_key)?.decrypt_asymmetric(session.private_key_der())?;
        Ok(SymmetricKey::from_bytes(&key_bytes)?)
    }
}
