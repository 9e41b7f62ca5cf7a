//! Thin cached wrappers over the RF frontend registers.
//!
//! Each setter validates, writes the mailbox registers and updates the cache
//! while holding the register lock. Getters read the cache only.

mod csr;
mod error;
mod range;
mod state;

use crate::{Device, Direction, regs::RegisterGuard};

pub(crate) use error::ControlResult;

pub use error::ControlError;
pub use range::Range;
pub use state::{
    BANDWIDTH_RANGE, ClockSource, ControlState, DEFAULT_SAMPLE_RATE, MAX_CHANNELS,
    REFERENCE_CLOCK_RATE, SAMPLE_RATE_RANGE, antennas, frequency_range, gain_range,
};

#[inline]
fn check(what: &'static str, value: f64, range: Range) -> ControlResult<()> {
    if range.contains(value) {
        Ok(())
    } else {
        Err(ControlError::OutOfRange { what, value, range })
    }
}

impl Device {
    #[inline]
    fn check_channel(&self, channel: usize) -> ControlResult<()> {
        if channel < self.num_channels().min(MAX_CHANNELS) {
            Ok(())
        } else {
            Err(ControlError::InvalidChannel(channel))
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_hz(&self, regs: &RegisterGuard<'_>, addr: u32, hz: f64) -> ControlResult<()> {
        Ok(self.engine.write_reg(regs, addr, hz.round() as u32)?)
    }

    #[must_use]
    pub fn list_antennas(&self, dir: Direction) -> &'static [&'static str] {
        antennas(dir)
    }

    #[allow(clippy::missing_errors_doc, clippy::cast_possible_truncation)]
    pub fn set_antenna(&self, dir: Direction, channel: usize, name: &str) -> ControlResult<()> {
        self.check_channel(channel)?;

        let (index, name) = antennas(dir)
            .iter()
            .enumerate()
            .find(|(_, antenna)| **antenna == name)
            .ok_or_else(|| ControlError::UnknownAntenna(name.into()))?;

        let addr = match dir {
            Direction::Rx => csr::RX_ANTENNA,
            Direction::Tx => csr::TX_ANTENNA,
        };

        let mut regs = self.regs.lock();
        self.engine.write_reg(&regs, addr, index as u32)?;
        regs.frontend_mut(dir).antenna[channel] = name;

        Ok(())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn antenna(&self, dir: Direction, channel: usize) -> ControlResult<&'static str> {
        self.check_channel(channel)?;
        Ok(self.regs.lock().frontend(dir).antenna[channel])
    }

    #[must_use]
    pub fn gain_range(&self, dir: Direction) -> Range {
        gain_range(dir)
    }

    /// Overall gain in dB. TX gain is an attenuation and runs from -89 to 0.
    #[allow(
        clippy::missing_errors_doc,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn set_gain(&self, dir: Direction, channel: usize, db: f64) -> ControlResult<()> {
        self.check_channel(channel)?;
        check("gain", db, gain_range(dir))?;

        let addr = match dir {
            Direction::Rx => csr::RX_GAIN[channel],
            Direction::Tx => csr::TX_GAIN[channel],
        };

        let mut regs = self.regs.lock();
        // millidecibels, two's complement
        self.engine
            .write_reg(&regs, addr, (db * 1000.).round() as i32 as u32)?;
        regs.frontend_mut(dir).gain[channel] = db;

        Ok(())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn gain(&self, dir: Direction, channel: usize) -> ControlResult<f64> {
        self.check_channel(channel)?;
        Ok(self.regs.lock().frontend(dir).gain[channel])
    }

    #[must_use]
    pub fn frequency_range(&self, dir: Direction) -> Range {
        frequency_range(dir)
    }

    /// Sets the LO of `dir`. Both channels of a direction share it.
    #[allow(clippy::missing_errors_doc, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_frequency(&self, dir: Direction, channel: usize, hz: f64) -> ControlResult<()> {
        self.check_channel(channel)?;
        check("frequency", hz, frequency_range(dir))?;

        let (lo, hi) = match dir {
            Direction::Rx => (csr::RX_FREQ_LO, csr::RX_FREQ_HI),
            Direction::Tx => (csr::TX_FREQ_LO, csr::TX_FREQ_HI),
        };

        let hz_int = hz.round() as u64;

        let mut regs = self.regs.lock();
        self.engine.write_reg(&regs, lo, hz_int as u32)?;
        self.engine.write_reg(&regs, hi, (hz_int >> 32) as u32)?;
        regs.frontend_mut(dir).frequency = hz;

        Ok(())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn frequency(&self, dir: Direction, channel: usize) -> ControlResult<f64> {
        self.check_channel(channel)?;
        Ok(self.regs.lock().frontend(dir).frequency)
    }

    #[must_use]
    pub fn sample_rate_range(&self, _dir: Direction) -> Range {
        SAMPLE_RATE_RANGE
    }

    /// Sets the converter rate, which RX and TX share. A running stream keeps
    /// the rate it was activated with for its timestamps.
    #[allow(clippy::missing_errors_doc)]
    pub fn set_sample_rate(&self, _dir: Direction, rate: f64) -> ControlResult<()> {
        check("sample rate", rate, SAMPLE_RATE_RANGE)?;

        let mut regs = self.regs.lock();
        self.write_hz(&regs, csr::SAMPLE_RATE, rate)?;
        regs.sample_rate = rate;

        #[cfg(feature = "tracing")]
        tracing::debug!("sample rate: {rate} S/s");

        Ok(())
    }

    #[must_use]
    pub fn sample_rate(&self, dir: Direction) -> f64 {
        self.regs.lock().sample_rate(dir)
    }

    /// Analog filter bandwidth; applies to every channel of `dir`.
    #[allow(clippy::missing_errors_doc)]
    pub fn set_bandwidth(&self, dir: Direction, channel: usize, hz: f64) -> ControlResult<()> {
        self.check_channel(channel)?;
        check("bandwidth", hz, BANDWIDTH_RANGE)?;

        let addr = match dir {
            Direction::Rx => csr::RX_BANDWIDTH,
            Direction::Tx => csr::TX_BANDWIDTH,
        };

        let mut regs = self.regs.lock();
        self.write_hz(&regs, addr, hz)?;
        regs.frontend_mut(dir).bandwidth = hz;

        Ok(())
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn bandwidth(&self, dir: Direction, channel: usize) -> ControlResult<f64> {
        self.check_channel(channel)?;
        Ok(self.regs.lock().frontend(dir).bandwidth)
    }

    #[must_use]
    pub fn list_clock_sources(&self) -> Vec<&'static str> {
        ClockSource::ALL.iter().map(|source| source.as_str()).collect()
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn set_clock_source(&self, name: &str) -> ControlResult<()> {
        let source = name.parse::<ClockSource>()?;

        let mut regs = self.regs.lock();
        self.engine
            .write_reg(&regs, csr::CLOCK_SOURCE, u32::from(source == ClockSource::External))?;
        regs.clock_source = source;

        Ok(())
    }

    #[must_use]
    pub fn clock_source(&self) -> ClockSource {
        self.regs.lock().clock_source
    }

    #[must_use]
    pub fn reference_clock_rate(&self) -> f64 {
        REFERENCE_CLOCK_RATE
    }

    /// Routes TX DMA back into RX DMA inside the gateware.
    #[allow(clippy::missing_errors_doc)]
    pub fn set_loopback(&self, enable: bool) -> ControlResult<()> {
        let mut regs = self.regs.lock();
        self.engine.set_loopback(&regs, enable)?;
        regs.set_loopback_cached(enable);

        #[cfg(feature = "tracing")]
        tracing::debug!("dma loopback: {enable}");

        Ok(())
    }

    #[must_use]
    pub fn loopback(&self) -> bool {
        self.regs.lock().loopback()
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn read_register(&self, addr: u32) -> ControlResult<u32> {
        let regs = self.regs.lock();
        Ok(self.engine.read_reg(&regs, addr)?)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn write_register(&self, addr: u32, val: u32) -> ControlResult<()> {
        let regs = self.regs.lock();
        Ok(self.engine.write_reg(&regs, addr, val)?)
    }
}
