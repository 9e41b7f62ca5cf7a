use crate::{Direction, engine::EngineError};

use super::StreamHandle;

pub(crate) type StreamResult<T> = Result<T, StreamError>;

pub const SOAPY_SDR_TIMEOUT: i32 = -1;
pub const SOAPY_SDR_STREAM_ERROR: i32 = -2;
pub const SOAPY_SDR_NOT_SUPPORTED: i32 = -5;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream error: {0}")]
    Io(#[from] EngineError),

    #[error("stream error: timed out")]
    Timeout,

    #[error("stream error: {0} stream is not open")]
    NotOpen(Direction),

    #[error("stream error: {0} stream is already open")]
    AlreadyOpen(Direction),

    #[error("stream error: {0} dma channel is in use by another process")]
    Busy(Direction),

    #[error("stream error: {0} stream is not active")]
    NotActive(Direction),

    #[error("stream error: {0} stream is still active")]
    StillActive(Direction),

    #[error("stream error: {0} cannot be used for this operation")]
    WrongDirection(StreamHandle),

    #[error("stream error: unsupported format {0:?}")]
    InvalidFormat(String),

    #[error("stream error: invalid channels: {0}")]
    InvalidChannels(&'static str),

    #[error("stream error: no ring slot {0}")]
    InvalidSlot(usize),

    #[error("stream error: {0} stream already holds a ring slot")]
    BufferHeld(Direction),

    #[error("stream error: ring slot {0} is not held")]
    NotHeld(usize),

    #[error("stream error: {got} samples given, {need} needed")]
    BufferSize { need: usize, got: usize },

    #[error("stream error: {got} samples do not fit a {mtu}-sample slot")]
    SlotOverflow { mtu: usize, got: usize },

    #[error("stream error: {0} not supported")]
    NotSupported(&'static str),
}

impl StreamError {
    /// Negative status code as the streaming framework reports it.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            StreamError::Timeout => SOAPY_SDR_TIMEOUT,
            StreamError::NotSupported(_) => SOAPY_SDR_NOT_SUPPORTED,
            _ => SOAPY_SDR_STREAM_ERROR,
        }
    }
}
