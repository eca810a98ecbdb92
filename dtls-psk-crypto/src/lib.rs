//! Crypto primitives for the DTLS 1.0 / PSK client: the TLS 1.0 PRF, key/master-secret
//! derivation, AES-CBC and HMAC-SHA1 wrappers around `openssl`, and the CSPRNG boundary.

pub mod aes_cbc;
mod error;
pub mod hash;
pub mod keys;
pub mod prf;
pub mod random;
pub mod secret;

pub use error::CryptoError;
pub use secret::{Secret, SecretBytes};
