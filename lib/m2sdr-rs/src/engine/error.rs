use std::io;

use crate::{fd::FdError, mem::MemError};

pub(crate) type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
#[error("engine error: {0}")]
pub enum EngineError {
    IO(#[from] io::Error),
    Fd(#[from] FdError),
    Mem(#[from] MemError),
}
