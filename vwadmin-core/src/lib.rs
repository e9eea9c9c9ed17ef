//! Shared foundations for the vwadmin clients.
//!
//! - **`crypto`**: key derivation (PBKDF2, Argon2id, HKDF) and the
//!   symmetric/asymmetric primitives used by the Bitwarden protocol
//!   (AES-256-CBC + HMAC-SHA256, RSA-OAEP-SHA1)
//! - **`encstring`**: the `{type}.{data}` cipher-string envelope carried by
//!   every encrypted field on the wire
//! - **`clock`**: injectable time source, so token/cookie expiry can be
//!   tested deterministically

pub mod clock;
pub mod crypto;
pub mod encstring;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{KdfParams, SymmetricKey};
pub use encstring::EncString;
pub use error::CryptoError;
