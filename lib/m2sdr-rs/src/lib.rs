mod client;
mod config;
mod control;
mod device;
mod dir;
mod engine;
mod error;
mod fd;
mod mem;
mod regs;
mod sample;
mod stream;

pub use crate::{
    client::{open, open_with},
    config::{ConfigError, DEFAULT_PATH, DeviceConfig},
    control::{
        ClockSource, ControlError, ControlState, MAX_CHANNELS, REFERENCE_CLOCK_RATE, Range,
    },
    device::Device,
    dir::Direction,
    engine::{ControlPlane, DataPlane, Engine, EngineError, LitePcie, SimEngine},
    error::M2sdrError,
    fd::FdError,
    mem::{DmaMapping, MemError, RingGeometry},
    regs::{RegisterGuard, Registers},
    sample::{Cs16, FORMAT_CS16, FULL_SCALE},
    stream::{
        DEFAULT_TIMEOUT, Kwargs, ReadBuffer, SOAPY_SDR_NOT_SUPPORTED, SOAPY_SDR_STREAM_ERROR,
        SOAPY_SDR_TIMEOUT, StreamError, StreamFlags, StreamHandle, StreamInfo, StreamState,
        StreamStats, StreamStatus, Transfer, WriteBuffer,
    },
};
