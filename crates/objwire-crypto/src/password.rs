use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

/// A shared secret for payload encryption.
///
/// The bytes are wiped when the value is dropped and never appear in
/// `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Password {
    secret: String,
}

impl Password {
    /// Wrap `secret`, rejecting the empty string.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CryptoError::EmptyPassword);
        }
        Ok(Self { secret })
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password(<redacted:{} bytes>)", self.secret.len())
    }
}

impl std::str::FromStr for Password {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(matches!(Password::new(""), Err(CryptoError::EmptyPassword)));
        assert!(matches!("".parse::<Password>(), Err(CryptoError::EmptyPassword)));
    }

    #[test]
    fn debug_is_redacted() {
        let password = Password::new("correct horse").unwrap();
        let debug = format!("{password:?}");
        assert_eq!(debug, "Password(<redacted:13 bytes>)");
        assert!(!debug.contains("horse"));
    }

    #[test]
    fn exposes_bytes_to_cipher() {
        let password: Password = "abc".parse().unwrap();
        assert_eq!(password.as_bytes(), b"abc");
    }
}
