use crate::engine::EngineError;

use super::Range;

pub(crate) type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control error: {0}")]
    Engine(#[from] EngineError),

    #[error("control error: no channel {0}")]
    InvalidChannel(usize),

    #[error("control error: unknown antenna {0:?}")]
    UnknownAntenna(String),

    #[error("control error: unknown clock source {0:?}")]
    UnknownClockSource(String),

    #[error("control error: {what} {value} outside [{}, {}]", range.min, range.max)]
    OutOfRange {
        what: &'static str,
        value: f64,
        range: Range,
    },
}
