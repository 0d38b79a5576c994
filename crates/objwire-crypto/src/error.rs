/// Errors that can occur while encrypting or decrypting payloads.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Passwords must contain at least one byte.
    #[error("password must not be empty")]
    EmptyPassword,

    /// The token is not base64 or is too short to hold its header.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// The token was produced by an unknown format version.
    #[error("unsupported ciphertext version {0}")]
    UnsupportedVersion(u8),

    /// Wrong password, or the token was altered in transit.
    #[error("ciphertext failed authentication")]
    Authentication,

    /// Decrypted bytes are not UTF-8 text.
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
