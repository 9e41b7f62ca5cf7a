//! Per-direction streams over the DMA rings.
//!
//! A [`Ring`](ring::Ring) tracks slot progress, the RX and TX streams layer
//! the acquire/release protocol and sample-granularity transfers on top, and
//! the [`Stream`] trait carries the lifecycle both directions share.

mod error;
mod flags;
mod handle;
mod remainder;
mod ring;
mod rx;
mod state;
mod stats;
mod tx;

use std::{collections::BTreeMap, ptr::NonNull, slice, time::Duration};

use crate::{
    Direction,
    control::MAX_CHANNELS,
    engine::Engine,
    regs::RegisterGuard,
    sample::{Cs16, FORMAT_CS16},
};

pub(crate) use error::StreamResult;
pub(crate) use rx::RxStream;
pub(crate) use tx::TxStream;

pub use error::{SOAPY_SDR_NOT_SUPPORTED, SOAPY_SDR_STREAM_ERROR, SOAPY_SDR_TIMEOUT, StreamError};
pub use flags::StreamFlags;
pub use handle::StreamHandle;
pub use state::StreamState;
pub use stats::StreamStats;

use remainder::Remainder;
use ring::Ring;

/// Timeout the framework uses when the caller gives none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Stream arguments; none are recognised and all are ignored.
pub type Kwargs = BTreeMap<String, String>;

/// A ring slot acquired for reading, see [`Device::acquire_read_buffer`](crate::Device::acquire_read_buffer).
#[derive(Debug)]
pub struct ReadBuffer {
    /// Ring slot index, to be passed back on release.
    pub handle: usize,
    /// One plane per active channel, in setup order.
    pub buffs: Vec<NonNull<Cs16>>,
    pub samples: usize,
    pub flags: StreamFlags,
    pub time_ns: i64,
}

impl ReadBuffer {
    /// # Safety
    ///
    /// The slot must not have been released yet.
    #[must_use]
    pub unsafe fn channel(&self, index: usize) -> Option<&[Cs16]> {
        self.buffs
            .get(index)
            .map(|ptr| unsafe { slice::from_raw_parts(ptr.as_ptr(), self.samples) })
    }
}

/// A ring slot acquired for writing, see [`Device::acquire_write_buffer`](crate::Device::acquire_write_buffer).
#[derive(Debug)]
pub struct WriteBuffer {
    pub handle: usize,
    pub buffs: Vec<NonNull<Cs16>>,
    pub samples: usize,
}

impl WriteBuffer {
    /// # Safety
    ///
    /// The slot must not have been released yet.
    #[must_use]
    pub unsafe fn channel_mut(&mut self, index: usize) -> Option<&mut [Cs16]> {
        self.buffs
            .get(index)
            .map(|ptr| unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), self.samples) })
    }
}

/// Outcome of `read_stream` / `write_stream`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub samples: usize,
    pub flags: StreamFlags,
    /// Time of the first sample transferred; valid with [`StreamFlags::HAS_TIME`].
    pub time_ns: i64,
}

impl Transfer {
    #[inline]
    fn stamp(&mut self, time_ns: Option<i64>) {
        if let Some(time_ns) = time_ns {
            self.time_ns = time_ns;
            self.flags |= StreamFlags::HAS_TIME;
        }
    }
}

/// Event reported by [`Device::read_stream_status`](crate::Device::read_stream_status).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub flags: StreamFlags,
    /// Samples in the burst that completed, with [`StreamFlags::END_BURST`].
    pub samples: usize,
}

/// Snapshot of a stream's bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub state: StreamState,
    pub format: Option<&'static str>,
    pub channels: Vec<usize>,
    pub hw_count: u64,
    pub sw_count: u64,
    pub user_count: u64,
    pub overflow: bool,
    pub underflow: bool,
    pub burst_end: bool,
    pub burst_samps: usize,
    pub stats: StreamStats,
}

/// State every stream has regardless of direction.
#[derive(Debug)]
pub(crate) struct StreamCore {
    pub(crate) dir: Direction,
    pub(crate) state: StreamState,
    pub(crate) ring: Ring,
    pub(crate) remainder: Option<Remainder>,
    pub(crate) format: Option<&'static str>,
    /// Captured at activation.
    pub(crate) sample_rate: f64,
    pub(crate) stats: StreamStats,
}

impl StreamCore {
    pub(crate) fn new(dir: Direction) -> Self {
        Self {
            dir,
            state: StreamState::Closed,
            ring: Ring::new(dir),
            remainder: None,
            format: None,
            sample_rate: 0.,
            stats: StreamStats::default(),
        }
    }

    /// Time of sample `offset` in the slot with absolute count `count`.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub(crate) fn time_ns(&self, count: u64, offset: usize) -> Option<i64> {
        if self.sample_rate <= 0. {
            return None;
        }

        let mtu = self.ring.mtu().ok()? as u64;
        let sample = count * mtu + offset as u64;

        Some((sample as f64 * 1e9 / self.sample_rate).round() as i64)
    }

    pub(crate) fn check_buffers(
        &self,
        lens: impl ExactSizeIterator<Item = usize>,
        num_elems: usize,
    ) -> StreamResult<()> {
        if lens.len() != self.ring.channels().len() {
            return Err(StreamError::InvalidChannels("need one buffer per active channel"));
        }

        for got in lens {
            if got < num_elems {
                return Err(StreamError::BufferSize {
                    need: num_elems,
                    got,
                });
            }
        }

        Ok(())
    }
}

/// Lifecycle shared by the RX and TX streams. Every step runs under the
/// register lock, which the caller proves with a guard.
pub(crate) trait Stream {
    fn core(&self) -> &StreamCore;

    fn core_mut(&mut self) -> &mut StreamCore;

    /// Clears direction-specific state on activation.
    fn reset(&mut self);

    /// Adds direction-specific fields to a snapshot.
    fn describe(&self, info: &mut StreamInfo);

    fn setup(
        &mut self,
        engine: &dyn Engine,
        regs: &RegisterGuard<'_>,
        format: &str,
        channels: &[usize],
        args: &Kwargs,
    ) -> StreamResult<()> {
        let dir = self.core().dir;

        if self.core().state.is_opened() {
            return Err(StreamError::AlreadyOpen(dir));
        }

        if format != FORMAT_CS16 {
            return Err(StreamError::InvalidFormat(format.into()));
        }

        if channels.is_empty() {
            return Err(StreamError::InvalidChannels("no channel given"));
        }

        if channels.len() > MAX_CHANNELS {
            return Err(StreamError::InvalidChannels("at most two channels"));
        }

        let planes = engine.mapping().geometry().planes();
        if channels.iter().any(|&channel| channel >= planes) {
            return Err(StreamError::InvalidChannels("channel index out of range"));
        }

        if channels
            .iter()
            .enumerate()
            .any(|(i, channel)| channels[..i].contains(channel))
        {
            return Err(StreamError::InvalidChannels("duplicate channel"));
        }

        #[cfg(feature = "tracing")]
        for (key, val) in args {
            tracing::debug!("{dir}: ignoring stream argument {key}={val}");
        }
        #[cfg(not(feature = "tracing"))]
        let _ = args;

        if !engine.request(regs, dir)? {
            return Err(StreamError::Busy(dir));
        }

        let core = self.core_mut();
        core.ring.bind(engine.mapping().clone(), channels.to_vec());
        core.ring.reset();
        core.remainder = None;
        core.format = Some(FORMAT_CS16);
        core.stats = StreamStats::default();
        core.state = StreamState::Opened;

        #[cfg(feature = "tracing")]
        tracing::debug!("{dir}: stream opened on channels {channels:?}");

        Ok(())
    }

    fn activate(
        &mut self,
        engine: &dyn Engine,
        regs: &RegisterGuard<'_>,
        flags: StreamFlags,
        time_ns: i64,
        num_elems: usize,
    ) -> StreamResult<()> {
        let dir = self.core().dir;
        self.core().state.ensure_idle(dir)?;

        if flags.contains(StreamFlags::WAIT_TRIGGER) {
            return Err(StreamError::NotSupported("triggered activation"));
        }

        if flags.contains(StreamFlags::HAS_TIME) || time_ns != 0 {
            return Err(StreamError::NotSupported("timed activation"));
        }

        if num_elems != 0 {
            return Err(StreamError::NotSupported("finite bursts"));
        }

        engine.start(regs, dir)?;

        let core = self.core_mut();
        core.ring.reset();
        core.remainder = None;
        core.sample_rate = regs.sample_rate(dir);
        core.state = StreamState::Active;
        self.reset();

        #[cfg(feature = "tracing")]
        tracing::debug!("{dir}: stream active at {} S/s", regs.sample_rate(dir));

        Ok(())
    }

    fn deactivate(
        &mut self,
        engine: &dyn Engine,
        regs: &RegisterGuard<'_>,
        flags: StreamFlags,
        time_ns: i64,
    ) -> StreamResult<()> {
        let dir = self.core().dir;
        self.core().state.ensure_active(dir)?;

        if flags.contains(StreamFlags::HAS_TIME) || time_ns != 0 {
            return Err(StreamError::NotSupported("timed deactivation"));
        }

        engine.stop(regs, dir)?;
        engine.drain(dir)?;

        let core = self.core_mut();
        core.remainder = None;
        core.ring.user_count = core.ring.sw_count;
        core.state = StreamState::Opened;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "{dir}: stream stopped at hw {} sw {} user {}",
            core.ring.hw_count,
            core.ring.sw_count,
            core.ring.user_count
        );

        Ok(())
    }

    fn close(&mut self, engine: &dyn Engine, regs: &RegisterGuard<'_>) -> StreamResult<()> {
        let dir = self.core().dir;
        self.core().state.ensure_idle(dir)?;

        engine.release(regs, dir)?;

        let core = self.core_mut();
        core.ring.unbind();
        core.format = None;
        core.state = StreamState::Closed;

        #[cfg(feature = "tracing")]
        tracing::debug!("{dir}: stream closed");

        Ok(())
    }

    fn info(&self) -> StreamInfo {
        let core = self.core();
        let mut info = StreamInfo {
            state: core.state,
            format: core.format,
            channels: core.ring.channels().to_vec(),
            hw_count: core.ring.hw_count,
            sw_count: core.ring.sw_count,
            user_count: core.ring.user_count,
            overflow: false,
            underflow: false,
            burst_end: false,
            burst_samps: 0,
            stats: core.stats.clone(),
        };

        self.describe(&mut info);
        info
    }
}
