//! Error kinds surfaced by the control-side facade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("operation on a closed AMIO interface")]
    ClosedInterface,
    #[error("attempt to initialize an already initialized AMIO interface")]
    AlreadyInitialized,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("operation not supported by this interface: {0}")]
    Unsupported(&'static str),
    #[error("AMIO bug: {0}")]
    Bug(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<amio_engine::ClipError> for Error {
    fn from(err: amio_engine::ClipError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

impl From<amio_engine::PlayspecError> for Error {
    fn from(err: amio_engine::PlayspecError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}
