//! Token layout (before base64):
//!
//! ```text
//! +---------+-----------+------------+----------------------+
//! | version | salt (16) | nonce (24) | ciphertext + tag(16) |
//! +---------+-----------+------------+----------------------+
//! ```
//!
//! The key is derived per token with PBKDF2-HMAC-SHA256 over the password
//! and the salt, then used with XChaCha20-Poly1305.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::Sha256;
use tracing::trace;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::password::Password;

/// Leading byte of every token.
pub const FORMAT_VERSION: u8 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + SALT_LEN + NONCE_LEN;
const KDF_ROUNDS: u32 = 4096;
const KDF_LABEL: &[u8] = b"objwire-payload-v1";

/// Encrypt `plaintext` into a base64 token.
pub fn encrypt(plaintext: &str, password: &Password) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| CryptoError::Malformed("plaintext could not be sealed".to_string()))?;

    let mut token = Vec::with_capacity(HEADER_LEN + sealed.len());
    token.push(FORMAT_VERSION);
    token.extend_from_slice(&salt);
    token.extend_from_slice(&nonce);
    token.extend_from_slice(&sealed);

    trace!(plaintext_len = plaintext.len(), token_len = token.len(), "payload encrypted");
    Ok(STANDARD.encode(token))
}

/// Decrypt a token produced by [`encrypt`] with the same password.
pub fn decrypt(token: &str, password: &Password) -> Result<String> {
    let raw = STANDARD
        .decode(token.trim())
        .map_err(|err| CryptoError::Malformed(err.to_string()))?;

    if raw.len() < HEADER_LEN + TAG_LEN {
        return Err(CryptoError::Malformed(format!(
            "token is {} bytes, need at least {}",
            raw.len(),
            HEADER_LEN + TAG_LEN
        )));
    }
    if raw[0] != FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion(raw[0]));
    }

    let salt = &raw[1..1 + SALT_LEN];
    let nonce = &raw[1 + SALT_LEN..HEADER_LEN];
    let sealed = &raw[HEADER_LEN..];

    let key = derive_key(password, salt);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
    let plain = cipher
        .decrypt(XNonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::Authentication)?;

    String::from_utf8(plain).map_err(|_| CryptoError::InvalidUtf8)
}

// The label is prepended to the salt so keys never collide with other
// PBKDF2 uses of the same password.
fn derive_key(password: &Password, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut labelled_salt = Vec::with_capacity(KDF_LABEL.len() + salt.len());
    labelled_salt.extend_from_slice(KDF_LABEL);
    labelled_salt.extend_from_slice(salt);

    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &labelled_salt, KDF_ROUNDS, key.as_mut_slice());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password(secret: &str) -> Password {
        Password::new(secret).unwrap()
    }

    #[test]
    fn round_trip() {
        let pw = password("s3cret");
        let token = encrypt(r#"{"$type":"u8","$value":1}"#, &pw).unwrap();
        assert_eq!(decrypt(&token, &pw).unwrap(), r#"{"$type":"u8","$value":1}"#);
    }

    #[test]
    fn round_trip_empty_and_unicode() {
        let pw = password("pw");
        assert_eq!(decrypt(&encrypt("", &pw).unwrap(), &pw).unwrap(), "");
        let text = "grüße, 世界";
        assert_eq!(decrypt(&encrypt(text, &pw).unwrap(), &pw).unwrap(), text);
    }

    #[test]
    fn wrong_password_fails_authentication() {
        let token = encrypt("hello", &password("right")).unwrap();
        let err = decrypt(&token, &password("wrong")).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn tokens_differ_for_same_plaintext() {
        let pw = password("pw");
        assert_ne!(encrypt("same", &pw).unwrap(), encrypt("same", &pw).unwrap());
    }

    #[test]
    fn tampering_detected() {
        let pw = password("pw");
        let mut raw = STANDARD.decode(encrypt("payload", &pw).unwrap()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let err = decrypt(&STANDARD.encode(raw), &pw).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn malformed_tokens_rejected() {
        let pw = password("pw");
        assert!(matches!(decrypt("not base64!!", &pw), Err(CryptoError::Malformed(_))));
        assert!(matches!(
            decrypt(&STANDARD.encode([FORMAT_VERSION; 8]), &pw),
            Err(CryptoError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_version_rejected() {
        let pw = password("pw");
        let mut raw = STANDARD.decode(encrypt("x", &pw).unwrap()).unwrap();
        raw[0] = 9;
        assert!(matches!(
            decrypt(&STANDARD.encode(raw), &pw),
            Err(CryptoError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn key_depends_on_password_and_salt() {
        let key = derive_key(&password("pw"), &[1; SALT_LEN]);
        assert_eq!(*key, *derive_key(&password("pw"), &[1; SALT_LEN]));
        assert_ne!(*key, *derive_key(&password("pw"), &[2; SALT_LEN]));
        assert_ne!(*key, *derive_key(&password("other"), &[1; SALT_LEN]));
    }

    #[test]
    fn token_is_plain_base64_text() {
        let token = encrypt("abc", &password("pw")).unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));
        assert_eq!(
            STANDARD.decode(&token).unwrap().len(),
            HEADER_LEN + 3 + TAG_LEN
        );
    }
}
