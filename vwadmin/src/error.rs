//! Error types for the admin client and the composite workflows.

use vwadmin_bitwarden::VaultError;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// A required constructor parameter is missing or empty.
    #[error("configuration error: {0}")]
    Config(String),

    /// The admin panel rejected the secret token.
    #[error("admin authentication failed: {0}")]
    Auth(String),

    /// The server answered with a non-2xx status.
    #[error("admin request failed ({status}): {body}")]
    Request { status: u16, body: String },

    /// A user lookup produced no match.
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the composite account workflows, which drive both
/// the admin panel and the vault API.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("transfer requires two distinct email addresses")]
    SameEmail,
}
