//! Error type for the vault API client.

use vwadmin_core::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// A required constructor parameter is missing or empty.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential exchange or key unwrapping failed. Not retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server answered with a non-2xx status.
    #[error("request failed ({status}): {body}")]
    Request { status: u16, body: String },

    /// A required lookup produced no match.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response decode error: {0}")]
    Json(#[from] serde_json::Error),
}
