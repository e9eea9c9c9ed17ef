//! Authenticated session state and renewal decisions.
//!
//! The token endpoint answers a `client_credentials` exchange with the
//! access/refresh tokens, the KDF parameters, and two wrapped keys. A
//! [`Session`] is that response after unwrapping: master key derived from
//! the account password, user key decrypted with the stretched master key,
//! organization private key decrypted with the user key.
//!
//! Expiry is computed exactly once, at acquisition, as `now + expires_in`,
//! and every later check compares against the same injected clock. An
//! exactly-equal instant counts as expired.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Deserializer};
use zeroize::Zeroizing;

use vwadmin_core::crypto::{self, SymmetricKey};
use vwadmin_core::{EncString, KdfParams};

use crate::error::VaultError;

/// Deserialize a `String` field directly into a `Zeroizing<String>`.
fn deser_zeroizing_string<'de, D>(de: D) -> Result<Zeroizing<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(de)?;
    Ok(Zeroizing::new(s))
}

/// Deserialize an `Option<String>` field into an `Option<Zeroizing<String>>`.
fn deser_opt_zeroizing_string<'de, D>(de: D) -> Result<Option<Zeroizing<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(de)?;
    Ok(opt.map(Zeroizing::new))
}

/// Response of `POST identity/connect/token` for the
/// `client_credentials` grant.
///
/// Tokens and wrapped keys are sensitive; all of them are scrubbed on
/// drop, and `Debug` redacts them.
#[derive(Deserialize)]
pub struct ConnectToken {
    #[serde(deserialize_with = "deser_zeroizing_string")]
    pub access_token: Zeroizing<String>,
    #[serde(default, deserialize_with = "deser_opt_zeroizing_string")]
    pub refresh_token: Option<Zeroizing<String>>,
    pub expires_in: u64,
    /// The user's wrapped symmetric key.
    #[serde(alias = "Key", deserialize_with = "deser_zeroizing_string")]
    pub key: Zeroizing<String>,
    /// The wrapped organization private key.
    #[serde(
        alias = "PrivateKey",
        alias = "privateKey",
        deserialize_with = "deser_zeroizing_string"
    )]
    pub private_key: Zeroizing<String>,
    #[serde(alias = "Kdf", alias = "kdf", default)]
    pub kdf: u8,
    #[serde(alias = "KdfIterations", alias = "kdfIterations")]
    pub kdf_iterations: u32,
    #[serde(alias = "KdfMemory", alias = "kdfMemory", default)]
    pub kdf_memory: Option<u32>,
    #[serde(alias = "KdfParallelism", alias = "kdfParallelism", default)]
    pub kdf_parallelism: Option<u32>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

impl ConnectToken {
    /// Interpret the announced KDF configuration.
    pub fn kdf_params(&self) -> Result<KdfParams, VaultError> {
        if self.kdf_iterations == 0 {
            return Err(VaultError::Auth(
                "token response announced zero KDF iterations".to_string(),
            ));
        }
        match self.kdf {
            0 => Ok(KdfParams::Pbkdf2 {
                iterations: self.kdf_iterations,
            }),
            1 => Ok(KdfParams::Argon2id {
                iterations: self.kdf_iterations,
                memory_mb: self.kdf_memory.unwrap_or(64),
                parallelism: self.kdf_parallelism.unwrap_or(4),
            }),
            other => Err(VaultError::Auth(format!("unknown KDF type: {other}"))),
        }
    }
}

impl std::fmt::Debug for ConnectToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectToken")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("expires_in", &self.expires_in)
            .field("key", &"[redacted]")
            .field("private_key", &"[redacted]")
            .field("kdf", &self.kdf)
            .field("kdf_iterations", &self.kdf_iterations)
            .finish()
    }
}

/// Response of a `refresh_token` exchange.
#[derive(Deserialize)]
pub struct RefreshedToken {
    #[serde(deserialize_with = "deser_zeroizing_string")]
    pub access_token: Zeroizing<String>,
    #[serde(default, deserialize_with = "deser_opt_zeroizing_string")]
    pub refresh_token: Option<Zeroizing<String>>,
    pub expires_in: u64,
}

impl std::fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// An unlocked session: bearer credential plus the unwrapped key hierarchy.
///
/// Owned exclusively by the client's session slot; never handed out by
/// value, only through accessors.
pub struct Session {
    access_token: Zeroizing<String>,
    refresh_token: Option<Zeroizing<String>>,
    expires_at: SystemTime,
    #[allow(dead_code)]
    master_key: Zeroizing<Vec<u8>>,
    user_key: SymmetricKey,
    /// RSA private key, DER format.
    private_key: Zeroizing<Vec<u8>>,
}

impl Session {
    /// Unwrap a token response into a live session.
    ///
    /// Derives the master key from `password` with the lowercased, trimmed
    /// `email` as salt and the KDF parameters the server announced, then
    /// unwraps `user_key = dec(Key, stretch(master_key))` and
    /// `private_key = dec(PrivateKey, user_key)`.
    ///
    /// Any unwrap failure (wrong password, corrupted payload) is an
    /// authentication error.
    pub fn unlock(
        token: ConnectToken,
        email: &str,
        password: &str,
        now: SystemTime,
    ) -> Result<Self, VaultError> {
        let auth = |step: &str| {
            let step = step.to_string();
            move |e| VaultError::Auth(format!("{step}: {e}"))
        };

        let kdf = token.kdf_params()?;
        let master_key = crypto::derive_master_key(password.as_bytes(), email, &kdf)
            .map_err(auth("master key derivation"))?;
        let stretched = crypto::expand_master_key(&master_key).map_err(auth("key stretch"))?;

        let user_key_bytes = EncString::parse(&token.key)
            .map_err(auth("user key parse"))?
            .decrypt_symmetric(&stretched)
            .map_err(auth("user key unwrap"))?;
        let user_key =
            SymmetricKey::from_bytes(&user_key_bytes).map_err(auth("user key shape"))?;

        let private_key = EncString::parse(&token.private_key)
            .map_err(auth("private key parse"))?
            .decrypt_symmetric(&user_key)
            .map_err(auth("private key unwrap"))?;

        Ok(Self {
            expires_at: now + Duration::from_secs(token.expires_in),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            master_key,
            user_key,
            private_key,
        })
    }

    /// `expires_at <= now` counts as expired; there is no grace window.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at <= now
    }

    pub fn bearer(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().map(String::as_str)
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    pub fn user_key(&self) -> &SymmetricKey {
        &self.user_key
    }

    /// The organization private key in DER format.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key
    }

    /// Install a refreshed access token. The key hierarchy is untouched —
    /// a refresh never re-derives anything.
    pub fn apply_refresh(&mut self, refreshed: RefreshedToken, now: SystemTime) {
        self.access_token = refreshed.access_token;
        if let Some(rotated) = refreshed.refresh_token {
            self.refresh_token = Some(rotated);
        }
        self.expires_at = now + Duration::from_secs(refreshed.expires_in);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What `ensure_valid` has to do for the current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// Live credential — nothing to do.
    Keep,
    /// Expired but a refresh token exists — exchange it, keep the keys.
    Refresh,
    /// No session, or expired without a refresh token — full login.
    Login,
}

/// Pure renewal decision. Separated from the client so the contract is
/// testable without a network.
pub fn renewal_action(session: Option<&Session>, now: SystemTime) -> Renewal {
    match session {
        Some(s) if !s.is_expired(now) => Renewal::Keep,
        Some(s) if s.refresh_token().is_some() => Renewal::Refresh,
        _ => Renewal::Login,
    }
}
