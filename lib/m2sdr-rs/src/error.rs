use std::io;

use crate::{
    config::ConfigError, control::ControlError, engine::EngineError, mem::MemError,
    stream::StreamError,
};

#[derive(Debug, thiserror::Error)]
#[error("m2sdr error: {0}")]
pub enum M2sdrError {
    IO(#[from] io::Error),

    Config(#[from] ConfigError),
    Mem(#[from] MemError),
    Engine(#[from] EngineError),
    Control(#[from] ControlError),
    Stream(#[from] StreamError),
}
