mod error;

#[cfg(feature = "clap")]
mod config_clap;

#[cfg(not(feature = "clap"))]
mod config_noclap;

use std::path::{Path, PathBuf};

use crate::control::{ClockSource, DEFAULT_SAMPLE_RATE, MAX_CHANNELS};

pub use error::ConfigError;

#[cfg(feature = "clap")]
pub use config_clap::DeviceConfig;

#[cfg(not(feature = "clap"))]
pub use config_noclap::DeviceConfig;

pub(crate) use error::ConfigResult;

pub const DEFAULT_PATH: &str = "/dev/m2sdr0";

impl DeviceConfig {
    /// Board defaults: two planes, internal clock, no loopback.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            planes: 2,
            loopback: false,
            clock_source: ClockSource::Internal.as_str().into(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    #[must_use]
    pub fn with_planes(mut self, planes: usize) -> Self {
        self.planes = planes;
        self
    }

    #[must_use]
    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    #[must_use]
    pub fn with_clock_source(mut self, source: &str) -> Self {
        self.clock_source = source.into();
        self
    }

    #[must_use]
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    pub(crate) fn validate(&self) -> ConfigResult<()> {
        if self.planes == 0 || self.planes > MAX_CHANNELS {
            return Err(ConfigError::InvalidPlanes(self.planes));
        }

        if !self.sample_rate.is_finite() || self.sample_rate <= 0. {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }

        if self.clock_source.parse::<ClockSource>().is_err() {
            return Err(ConfigError::InvalidClockSource(self.clock_source.clone()));
        }

        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> usize {
        self.planes
    }

    #[inline]
    #[must_use]
    pub fn loopback(&self) -> bool {
        self.loopback
    }

    #[inline]
    #[must_use]
    pub fn clock_source(&self) -> &str {
        &self.clock_source
    }

    #[inline]
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
