use thiserror::Error;

/// Failures at the crypto-service boundary (spec §7).
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The underlying crypto primitives library (`openssl`) refused the request, e.g.
    /// an unsupported key size. Spec §7's `CryptoUnavailable`.
    #[error("crypto primitive unavailable: {0}")]
    Unavailable(#[from] openssl::error::ErrorStack),

    /// A supplied secret or buffer had the wrong length for the requested operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
