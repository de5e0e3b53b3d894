use thiserror::Error;

#[derive(Debug, Error)]
pub enum NhdpError {
    #[error("malformed HELLO: {0}")]
    MalformedHello(&'static str),

    #[error("codec error")]
    Codec(#[from] rfc5444::CodecError),

    #[error("unknown interface {0}")]
    UnknownInterface(String),
}

pub type NhdpResult<T> = Result<T, NhdpError>;
