use at_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = GattError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GattError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("catalog not ready (state {0})")]
    NotReady(&'static str),
    #[error("module returned an unusable identifier for {0}")]
    InvalidId(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record too short: {got} bytes, need {need}")]
    TooShort { got: usize, need: usize },
}
