use std::{fmt, str::FromStr};

use crate::Direction;

use super::{ControlError, Range};

pub const MAX_CHANNELS: usize = 2;

pub const REFERENCE_CLOCK_RATE: f64 = 38.4e6;
pub const DEFAULT_SAMPLE_RATE: f64 = 30.72e6;
pub const DEFAULT_BANDWIDTH: f64 = 56e6;
pub const DEFAULT_FREQUENCY: f64 = 98.2e6;

pub const RX_GAIN_RANGE: Range = Range::new(0., 76.);
pub const TX_GAIN_RANGE: Range = Range::new(-89., 0.);
pub const RX_FREQUENCY_RANGE: Range = Range::new(70e6, 6e9);
pub const TX_FREQUENCY_RANGE: Range = Range::new(47e6, 6e9);
pub const SAMPLE_RATE_RANGE: Range = Range::new(0.55e6, 61.44e6);
pub const BANDWIDTH_RANGE: Range = Range::new(0.2e6, 56e6);

pub const RX_ANTENNAS: &[&str] = &["A_BALANCED"];
pub const TX_ANTENNAS: &[&str] = &["A"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    #[default]
    Internal,
    External,
}

impl ClockSource {
    pub const ALL: [ClockSource; 2] = [ClockSource::Internal, ClockSource::External];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ClockSource::Internal => "internal",
            ClockSource::External => "external",
        }
    }
}

impl FromStr for ClockSource {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| ControlError::UnknownClockSource(s.into()))
    }
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of one direction's frontend.
#[derive(Debug, Clone)]
pub(crate) struct Frontend {
    pub(crate) gain: [f64; MAX_CHANNELS],
    pub(crate) antenna: [&'static str; MAX_CHANNELS],
    pub(crate) frequency: f64,
    pub(crate) bandwidth: f64,
}

/// Last values written to the control registers.
///
/// Lives behind the register lock, so reads never wait on the data path.
#[derive(Debug, Clone)]
pub struct ControlState {
    pub(crate) rx: Frontend,
    pub(crate) tx: Frontend,
    pub(crate) sample_rate: f64,
    pub(crate) clock_source: ClockSource,
    loopback: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            rx: Frontend {
                gain: [RX_GAIN_RANGE.min; MAX_CHANNELS],
                antenna: [RX_ANTENNAS[0]; MAX_CHANNELS],
                frequency: DEFAULT_FREQUENCY,
                bandwidth: DEFAULT_BANDWIDTH,
            },
            tx: Frontend {
                gain: [-20.; MAX_CHANNELS],
                antenna: [TX_ANTENNAS[0]; MAX_CHANNELS],
                frequency: DEFAULT_FREQUENCY,
                bandwidth: DEFAULT_BANDWIDTH,
            },
            sample_rate: DEFAULT_SAMPLE_RATE,
            clock_source: ClockSource::Internal,
            loopback: false,
        }
    }
}

impl ControlState {
    #[inline]
    pub(crate) fn frontend(&self, dir: Direction) -> &Frontend {
        match dir {
            Direction::Rx => &self.rx,
            Direction::Tx => &self.tx,
        }
    }

    #[inline]
    pub(crate) fn frontend_mut(&mut self, dir: Direction) -> &mut Frontend {
        match dir {
            Direction::Rx => &mut self.rx,
            Direction::Tx => &mut self.tx,
        }
    }

    /// RX and TX share the converter clock.
    #[inline]
    #[must_use]
    pub fn sample_rate(&self, _dir: Direction) -> f64 {
        self.sample_rate
    }

    #[inline]
    #[must_use]
    pub fn loopback(&self) -> bool {
        self.loopback
    }

    #[inline]
    pub(crate) fn set_loopback_cached(&mut self, enable: bool) {
        self.loopback = enable;
    }
}

#[must_use]
pub const fn gain_range(dir: Direction) -> Range {
    match dir {
        Direction::Rx => RX_GAIN_RANGE,
        Direction::Tx => TX_GAIN_RANGE,
    }
}

#[must_use]
pub const fn frequency_range(dir: Direction) -> Range {
    match dir {
        Direction::Rx => RX_FREQUENCY_RANGE,
        Direction::Tx => TX_FREQUENCY_RANGE,
    }
}

#[must_use]
pub const fn antennas(dir: Direction) -> &'static [&'static str] {
    match dir {
        Direction::Rx => RX_ANTENNAS,
        Direction::Tx => TX_ANTENNAS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        let state = ControlState::default();

        for dir in [Direction::Rx, Direction::Tx] {
            let frontend = state.frontend(dir);
            assert!(frontend.gain.iter().all(|g| gain_range(dir).contains(*g)));
            assert!(frequency_range(dir).contains(frontend.frequency));
            assert!(antennas(dir).contains(&frontend.antenna[0]));
        }

        assert!(SAMPLE_RATE_RANGE.contains(state.sample_rate(Direction::Rx)));
        assert!(!state.loopback());
    }

    #[test]
    fn clock_source_parses_its_names() {
        for source in ClockSource::ALL {
            assert_eq!(source.as_str().parse::<ClockSource>().unwrap(), source);
        }

        assert!(matches!(
            "gps".parse::<ClockSource>(),
            Err(ControlError::UnknownClockSource(name)) if name == "gps"
        ));
    }
}
