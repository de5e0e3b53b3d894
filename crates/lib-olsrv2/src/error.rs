use thiserror::Error;

#[derive(Debug, Error)]
pub enum Olsrv2Error {
    #[error("malformed TC message: {0}")]
    MalformedTc(&'static str),

    #[error("codec error")]
    Codec(#[from] rfc5444::CodecError),

    #[error("nhdp error")]
    Nhdp(#[from] nhdp::NhdpError),
}

pub type Olsrv2Result<T> = Result<T, Olsrv2Error>;
