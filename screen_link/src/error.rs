use thiserror::Error;
use core::result::Result as CoreResult;

pub type Result<T> = CoreResult<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Permission denied while opening serial device {path}")]
    PermissionDenied { path: String },
    #[error("Could not open serial device yet: {0}")]
    TransientOpenFailure(#[source] serialport::Error),
    #[error("{path} can not be used as a serial device")]
    InvalidSerialPath { path: String },
    #[error("Serial link closed: {0}")]
    LinkClosed(#[source] std::io::Error),
    #[error("Frame is {actual} bytes long, expected {expected}")]
    InvalidFrameLength { expected: usize, actual: usize },
    #[error("Could not parse captured data: {0}")]
    InvalidData(&'static str),
    #[error("Stopped by cancellation request")]
    Cancelled,
}

