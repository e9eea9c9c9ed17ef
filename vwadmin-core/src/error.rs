//! Error type for the cryptographic layer.

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation error: {0}")]
    Kdf(String),

    #[error("crypto error: {0}")]
    Primitive(String),

    #[error("cipher string parse error: {0}")]
    Parse(String),

    #[error("MAC verification failed")]
    MacMismatch,
}
