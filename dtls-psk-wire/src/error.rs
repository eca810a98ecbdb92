use thiserror::Error;

/// Failure modes for `create`/`to_bytes`/`from_bytes` across every wire message type.
///
/// `NeedMore` is not really an error in the usual sense: it tells the caller the
/// supplied buffer is a valid prefix of a longer message and more bytes are needed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A supplied field has the wrong shape for its message (e.g. a session ID longer
    /// than its own length prefix allows).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A supplied field's value exceeds a declared wire limit (e.g. cookie > 32 bytes).
    #[error("out of range: {0}")]
    OutOfRange(&'static str),

    /// The buffer is a valid but incomplete prefix of the message.
    #[error("need more bytes")]
    NeedMore,
}
