//! Password-based encryption of channel payload text.
//!
//! [`encrypt`] turns UTF-8 text into a base64 token; [`decrypt`] reverses it
//! with the same [`Password`]. Each call draws a fresh salt and nonce, so
//! equal plaintexts never produce equal tokens. Tampered or foreign tokens
//! fail authentication instead of decrypting to garbage.
//!
//! ```
//! use objwire_crypto::{decrypt, encrypt, Password};
//!
//! let password = Password::new("hunter2").unwrap();
//! let token = encrypt("secret", &password).unwrap();
//! assert_eq!(decrypt(&token, &password).unwrap(), "secret");
//! ```

pub mod cipher;
pub mod error;
pub mod password;

pub use cipher::{decrypt, encrypt, FORMAT_VERSION};
pub use error::{CryptoError, Result};
pub use password::Password;
