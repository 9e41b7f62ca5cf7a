use std::sync::Arc;

use crate::{
    Device, DeviceConfig, Direction, M2sdrError,
    engine::{Engine, LitePcie},
};

/// Opens the board at `config.path`, maps its DMA rings and applies the
/// initial configuration.
#[allow(clippy::missing_errors_doc)]
pub fn open(config: &DeviceConfig) -> Result<Device, M2sdrError> {
    config.validate()?;

    let engine = LitePcie::open(config.path(), config.planes())?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Device: {}", config.path().display());

    open_with(Arc::new(engine), config)
}

/// Builds a device over an already opened engine and applies `config` to it.
/// The path and plane count in `config` are not used.
#[allow(clippy::missing_errors_doc)]
pub fn open_with(engine: Arc<dyn Engine>, config: &DeviceConfig) -> Result<Device, M2sdrError> {
    config.validate()?;

    let device = Device::new(engine);

    device.set_clock_source(config.clock_source())?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Clock Source: {}", config.clock_source());

    device.set_sample_rate(Direction::Rx, config.sample_rate())?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Sample Rate: {}", config.sample_rate());

    device.set_loopback(config.loopback())?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Loopback: {}", config.loopback());

    Ok(device)
}
