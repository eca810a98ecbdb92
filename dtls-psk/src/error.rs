use thiserror::Error;

/// Error kinds named in spec §7, collected into the one enum user-facing APIs return.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("value out of range: {0}")]
    OutOfRange(&'static str),

    /// A buffer did not contain a complete message yet.
    #[error("incomplete buffer")]
    NeedMore,

    /// A record or handshake message was complete but semantically invalid. Never
    /// distinguishes a MAC failure from a padding failure (spec §4.2/§7).
    #[error("malformed record")]
    Malformed,

    #[error("crypto primitive unavailable")]
    CryptoUnavailable(#[from] dtls_psk_crypto::CryptoError),

    #[error("record MAC verification failed")]
    MacFailure,

    #[error("record padding verification failed")]
    PaddingFailure,

    /// The handshake engine saw a protocol violation or out-of-order message and
    /// silently aborted the session (spec §4.4 failure policy: no alert is sent).
    #[error("handshake aborted")]
    HandshakeAbort,

    /// The peer sent `CloseNotify`.
    #[error("peer closed the session")]
    PeerClosed,

    /// An epoch or sequence number counter would wrap (spec §3 invariants).
    #[error("session counter exhausted")]
    CountersExhausted,

    #[error("hostname resolution failed for {0}")]
    ResolutionFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<dtls_psk_wire::CodecError> for Error {
    fn from(e: dtls_psk_wire::CodecError) -> Self {
        match e {
            dtls_psk_wire::CodecError::InvalidArgument(m) => Error::InvalidArgument(m),
            dtls_psk_wire::CodecError::OutOfRange(m) => Error::OutOfRange(m),
            dtls_psk_wire::CodecError::NeedMore => Error::NeedMore,
        }
    }
}
