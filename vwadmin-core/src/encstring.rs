//! The Bitwarden cipher-string envelope.
//!
//! Encrypted fields travel as `{type}.{data}` strings: type 2 is
//! AES-256-CBC + HMAC-SHA256 (`2.{iv}|{ct}|{mac}`, MAC optional in the
//! legacy form), type 4 is RSA-2048-OAEP-SHA1, and type 6 is the same
//! asymmetric payload with a trailing HMAC that is stripped.

use zeroize::Zeroizing;

use crate::crypto::{self, SymmetricKey};
use crate::error::CryptoError;

/// A parsed cipher string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncString {
    /// Type 2: AES-256-CBC + HMAC-SHA256
    Symmetric {
        iv: Vec<u8>,
        ciphertext: Vec<u8>,
        mac: Option<Vec<u8>>,
    },
    /// Type 4: RSA-2048-OAEP-SHA1
    Asymmetric { ciphertext: Vec<u8> },
}

impl EncString {
    /// Parse a cipher string from its wire representation.
    ///
    /// Supported forms:
    /// - `2.{iv_b64}|{ct_b64}|{mac_b64}` — symmetric with MAC
    /// - `2.{iv_b64}|{ct_b64}` — symmetric without MAC (legacy)
    /// - `4.{ct_b64}` — asymmetric
    /// - `6.{ct_b64}|{hmac_b64}` — asymmetric with HMAC suffix (stripped)
    pub fn parse(s: &str) -> Result<Self, CryptoError> {
        let (type_str, data) = s
            .split_once('.')
            .ok_or_else(|| CryptoError::Parse("missing type separator".to_string()))?;

        let enc_type: u8 = type_str
            .parse()
            .map_err(|_| CryptoError::Parse(format!("invalid type: {type_str}")))?;

        match enc_type {
            2 => Self::parse_symmetric(data),
            4 => Self::parse_asymmetric(data),
            6 => {
                let ct_part = data.split('|').next().unwrap_or(data);
                Self::parse_asymmetric(ct_part)
            }
            t @ (0 | 1 | 3 | 5) => Err(CryptoError::Parse(format!(
                "unsupported legacy cipher type {t}"
            ))),
            t => Err(CryptoError::Parse(format!("unknown cipher type {t}"))),
        }
    }

    fn parse_symmetric(data: &str) -> Result<Self, CryptoError> {
        let parts: Vec<&str> = data.split('|').collect();
        match parts.len() {
            2 => Ok(Self::Symmetric {
                iv: crypto::b64_decode(parts[0])?,
                ciphertext: crypto::b64_decode(parts[1])?,
                mac: None,
            }),
            3 => Ok(Self::Symmetric {
                iv: crypto::b64_decode(parts[0])?,
                ciphertext: crypto::b64_decode(parts[1])?,
                mac: Some(crypto::b64_decode(parts[2])?),
            }),
            n => Err(CryptoError::Parse(format!(
                "symmetric cipher string has {n} parts, expected 2 or 3"
            ))),
        }
    }

    fn parse_asymmetric(data: &str) -> Result<Self, CryptoError> {
        Ok(Self::Asymmetric {
            ciphertext: crypto::b64_decode(data)?,
        })
    }

    /// Encrypt plaintext into a type-2 symmetric cipher string.
    pub fn encrypt_symmetric(plaintext: &[u8], key: &SymmetricKey) -> Result<Self, CryptoError> {
        let (iv, ciphertext, mac) = crypto::encrypt_aes_cbc_hmac(key, plaintext)?;
        Ok(Self::Symmetric {
            iv,
            ciphertext,
            mac: Some(mac),
        })
    }

    /// Decrypt this cipher string with a symmetric key.
    pub fn decrypt_symmetric(&self, key: &SymmetricKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match self {
            Self::Symmetric {
                iv,
                ciphertext,
                mac,
            } => crypto::decrypt_aes_cbc_hmac(key, iv, ciphertext, mac.as_deref()),
            Self::Asymmetric { .. } => Err(CryptoError::Parse(
                "cannot decrypt asymmetric cipher with symmetric key".to_string(),
            )),
        }
    }

    /// Decrypt this cipher string with an RSA private key (DER format).
    pub fn decrypt_asymmetric(
        &self,
        private_key_der: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match self {
            Self::Asymmetric { ciphertext } => crypto::decrypt_rsa_oaep(private_key_der, ciphertext),
            Self::Symmetric { .. } => Err(CryptoError::Parse(
                "cannot decrypt symmetric cipher with asymmetric key".to_string(),
            )),
        }
    }

    /// Decrypt this cipher string to a UTF-8 string.
    pub fn decrypt_to_string(&self, key: &SymmetricKey) -> Result<String, CryptoError> {
        let bytes = self.decrypt_symmetric(key)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CryptoError::Parse(format!("invalid UTF-8: {e}")))
    }
}

/// The wire form is also the canonical display form.
impl std::fmt::Display for EncString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symmetric {
                iv,
                ciphertext,
                mac: Some(mac),
            } => write!(
                f,
                "2.{}|{}|{}",
                crypto::b64_encode(iv),
                crypto::b64_encode(ciphertext),
                crypto::b64_encode(mac)
            ),
            Self::Symmetric {
                iv,
                ciphertext,
                mac: None,
            } => write!(
                f,
                "2.{}|{}",
                crypto::b64_encode(iv),
                crypto::b64_encode(ciphertext)
            ),
            Self::Asymmetric { ciphertext } => {
                write!(f, "4.{}", crypto::b64_encode(ciphertext))
            }
        }
    }
}
