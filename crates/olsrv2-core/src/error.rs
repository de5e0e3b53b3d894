use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("codec error")]
    Codec(#[from] rfc5444::CodecError),

    #[error("nhdp error")]
    Nhdp(#[from] nhdp::NhdpError),

    #[error("olsrv2 error")]
    Olsrv2(#[from] olsrv2::Olsrv2Error),

    #[error("unknown interface: {0}")]
    UnknownInterface(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
