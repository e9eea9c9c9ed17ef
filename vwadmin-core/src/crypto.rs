//! Bitwarden-compatible cryptographic operations.
//!
//! Key derivation and the encrypt/decrypt primitives behind every
//! ciphertext field the vault server hands out: the password-derived
//! master key, the HKDF stretch, AES-256-CBC + HMAC-SHA256 for symmetric
//! payloads, and RSA-OAEP-SHA1 for organization keys.

use aes::Aes256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// A 64-byte symmetric key pair: 32 bytes AES key + 32 bytes MAC key.
///
/// Both the account user key and organization keys have this shape.
#[derive(Clone)]
pub struct SymmetricKey {
    data: Zeroizing<Vec<u8>>,
}

impl SymmetricKey {
    /// Create from raw 64-byte key material.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 64 {
            return Err(CryptoError::Primitive(format!(
                "expected 64-byte key, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            data: Zeroizing::new(bytes.to_vec()),
        })
    }

    /// The 32-byte encryption key.
    pub fn enc_key(&self) -> &[u8] {
        &self.data[..32]
    }

    /// The 32-byte MAC key.
    pub fn mac_key(&self) -> &[u8] {
        &self.data[32..]
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([redacted])")
    }
}

/// KDF parameters as announced by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KdfParams {
    Pbkdf2 {
        iterations: u32,
    },
    Argon2id {
        iterations: u32,
        memory_mb: u32,
        parallelism: u32,
    },
}

/// Derive the 32-byte master key from password + email using the given KDF.
///
/// The email is trimmed and lowercased before use as salt, so differently
/// cased logins derive the same key.
pub fn derive_master_key(
    password: &[u8],
    email: &str,
    kdf: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let email_lower = email.trim().to_lowercase();
    let mut master_key = Zeroizing::new(vec![0u8; 32]);

    match kdf {
        KdfParams::Pbkdf2 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(
                password,
                email_lower.as_bytes(),
                *iterations,
                &mut master_key,
            );
        }
        KdfParams::Argon2id {
            iterations,
            memory_mb,
            parallelism,
        } => {
            use sha2::Digest;
            let salt = Sha256::digest(email_lower.as_bytes());

            let params =
                argon2::Params::new(*memory_mb * 1024, *iterations, *parallelism, Some(32))
                    .map_err(|e| CryptoError::Kdf(format!("argon2 params: {e}")))?;

            let argon =
                argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

            argon
                .hash_password_into(password, &salt, &mut master_key)
                .map_err(|e| CryptoError::Kdf(format!("argon2: {e}")))?;
        }
    }

    Ok(master_key)
}

/// Expand the 32-byte master key into a 64-byte enc+mac pair via HKDF-SHA256.
pub fn expand_master_key(master_key: &[u8]) -> Result<SymmetricKey, CryptoError> {
    use hkdf::Hkdf;

    let hkdf = Hkdf::<Sha256>::from_prk(master_key)
        .map_err(|e| CryptoError::Kdf(format!("hkdf from_prk: {e}")))?;

    let mut combined = Zeroizing::new(vec![0u8; 64]);
    hkdf.expand(b"enc", &mut combined[..32])
        .map_err(|e| CryptoError::Kdf(format!("hkdf expand enc: {e}")))?;
    hkdf.expand(b"mac", &mut combined[32..])
        .map_err(|e| CryptoError::Kdf(format!("hkdf expand mac: {e}")))?;

    SymmetricKey::from_bytes(&combined)
}

/// Decrypt AES-256-CBC data, verifying the HMAC-SHA256 tag when present.
pub fn decrypt_aes_cbc_hmac(
    key: &SymmetricKey,
    iv: &[u8],
    ciphertext: &[u8],
    mac: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if let Some(mac_bytes) = mac {
        let mut hmac = HmacSha256::new_from_slice(key.mac_key())
            .map_err(|e| CryptoError::Primitive(format!("hmac init: {e}")))?;
        hmac.update(iv);
        hmac.update(ciphertext);
        hmac.verify_slice(mac_bytes)
            .map_err(|_| CryptoError::MacMismatch)?;
    }

    // buf holds plaintext after in-place decryption, hence the Zeroizing wrap
    let mut buf = Zeroizing::new(ciphertext.to_vec());
    let decryptor = Aes256CbcDec::new_from_slices(key.enc_key(), iv)
        .map_err(|e| CryptoError::Primitive(format!("aes init: {e}")))?;
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| CryptoError::Primitive(format!("aes decrypt: {e}")))?;

    Ok(Zeroizing::new(plaintext.to_vec()))
}

/// Encrypt data with AES-256-CBC and tag it with HMAC-SHA256 over IV + ciphertext.
///
/// Returns `(iv, ciphertext, mac)`. Used to re-encrypt collection names
/// before they are written back to the server.
pub fn encrypt_aes_cbc_hmac(
    key: &SymmetricKey,
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), CryptoError> {
    use rand::RngCore;

    let mut iv = vec![0u8; 16];
    rand::thread_rng().fill_bytes(&mut iv);

    let pad_len = 16 - (plaintext.len() % 16);
    let mut buf = vec![0u8; plaintext.len() + pad_len];
    buf[..plaintext.len()].copy_from_slice(plaintext);

    let encryptor = Aes256CbcEnc::new_from_slices(key.enc_key(), &iv)
        .map_err(|e| CryptoError::Primitive(format!("aes init: {e}")))?;
    let ciphertext = encryptor
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .map_err(|e| CryptoError::Primitive(format!("aes encrypt: {e}")))?
        .to_vec();

    let mut hmac = HmacSha256::new_from_slice(key.mac_key())
        .map_err(|e| CryptoError::Primitive(format!("hmac init: {e}")))?;
    hmac.update(&iv);
    hmac.update(&ciphertext);
    let mac = hmac.finalize().into_bytes().to_vec();

    Ok((iv, ciphertext, mac))
}

/// Decrypt data with RSA-2048-OAEP-SHA1 (organization key unwrapping).
pub fn decrypt_rsa_oaep(
    private_key_der: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::{Oaep, RsaPrivateKey};

    let private_key = RsaPrivateKey::from_pkcs8_der(private_key_der)
        .map_err(|e| CryptoError::Primitive(format!("pkcs8 parse: {e}")))?;

    let padding = Oaep::new::<sha1::Sha1>();
    let plaintext = private_key
        .decrypt(padding, ciphertext)
        .map_err(|e| CryptoError::Primitive(format!("rsa decrypt: {e}")))?;

    Ok(Zeroizing::new(plaintext))
}

/// Base64-encode using standard encoding.
pub fn b64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Base64-decode using standard encoding.
pub fn b64_decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(s)
        .map_err(|e| CryptoError::Parse(format!("base64 decode: {e}")))
}
