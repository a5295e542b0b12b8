use crate::bsp::LumpType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the parsers in this crate.
///
/// Every error is fatal to the parse that produced it; a constructor that
/// returns an error leaves no partially parsed state behind.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),
    #[error("checksum mismatch: {0}")]
    InvalidChecksum(String),
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("out of bounds access: {0}")]
    OutOfBoundsAccess(&'static str),
    #[error("encountered a compressed {0:?} lump but no LZMA decompress callback was provided")]
    MissingDecompressCallback(LumpType),
}

impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        use binrw::Error as BinError;

        match e {
            BinError::Custom { err, .. } if err.is::<StringError>() => {
                Error::InvalidBody(err.downcast::<StringError>().unwrap().to_string())
            }
            // reads are pre-checked against the buffer, so an io error out of
            // binrw means a struct lied about its own wire size
            BinError::Io(_) => Error::OutOfBoundsAccess("unexpected end of pre-checked slice"),
            e => Error::InvalidBody(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StringError {
    #[error(transparent)]
    NonUtf8(#[from] std::str::Utf8Error),
    #[error("string is not null-terminated")]
    NotNullTerminated,
}
