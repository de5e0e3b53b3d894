use thiserror::Error;

/// Errors the codec can return. A reader never leaves partial state behind:
/// any of these causes the whole packet or message to be dropped by the
/// caller.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("truncated packet")]
    Truncated,

    #[error("unknown mandatory field: {0}")]
    UnknownMandatoryField(&'static str),

    #[error("TLV length disagreement: expected {expected}, found {found}")]
    TlvLengthMismatch { expected: usize, found: usize },

    #[error("message address length {0} not in {{4,16}}")]
    InvalidAddressLength(u8),

    #[error("buffer error")]
    Buffer(#[from] binbuf::BufferError),
}

pub type CodecResult<T> = Result<T, CodecError>;
