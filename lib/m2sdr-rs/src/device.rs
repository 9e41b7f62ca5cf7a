use std::{
    ptr::NonNull,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::{
    Direction,
    engine::Engine,
    mem::{DmaMapping, RingGeometry},
    regs::{RegisterGuard, Registers},
    sample::{Cs16, FORMAT_CS16, FULL_SCALE},
    stream::{
        Kwargs, ReadBuffer, RxStream, Stream, StreamError, StreamFlags, StreamHandle, StreamInfo,
        StreamResult, StreamState, StreamStatus, Transfer, TxStream, WriteBuffer,
    },
};

/// An SDR board: one RX and one TX stream over a DMA engine, plus the
/// register file both share with configuration.
///
/// `Device` is `Sync`. One thread per direction may stream while any other
/// thread configures; only the lifecycle calls of a direction contend with
/// its data path.
#[derive(Debug)]
pub struct Device {
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) regs: Registers,
    rx: Mutex<RxStream>,
    tx: Mutex<TxStream>,
}

impl Device {
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            regs: Registers::default(),
            rx: Mutex::new(RxStream::new()),
            tx: Mutex::new(TxStream::new()),
        }
    }

    #[inline]
    fn rx(&self) -> MutexGuard<'_, RxStream> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn tx(&self) -> MutexGuard<'_, TxStream> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn rx_only(handle: StreamHandle) -> StreamResult<()> {
        match handle {
            StreamHandle::Rx => Ok(()),
            StreamHandle::Tx => Err(StreamError::WrongDirection(handle)),
        }
    }

    #[inline]
    fn tx_only(handle: StreamHandle) -> StreamResult<()> {
        match handle {
            StreamHandle::Tx => Ok(()),
            StreamHandle::Rx => Err(StreamError::WrongDirection(handle)),
        }
    }

    /// Runs a lifecycle step on the stream behind `handle` with the register
    /// lock held. Lock order is stream, then registers.
    fn lifecycle<R>(
        &self,
        handle: StreamHandle,
        f: impl FnOnce(&mut dyn Stream, &dyn Engine, &RegisterGuard<'_>) -> R,
    ) -> R {
        match handle {
            StreamHandle::Rx => {
                let mut stream = self.rx();
                let regs = self.regs.lock();
                f(&mut *stream, &*self.engine, &regs)
            }
            StreamHandle::Tx => {
                let mut stream = self.tx();
                let regs = self.regs.lock();
                f(&mut *stream, &*self.engine, &regs)
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn mapping(&self) -> &Arc<DmaMapping> {
        self.engine.mapping()
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> RingGeometry {
        *self.engine.mapping().geometry()
    }

    /// Channels per direction: one per plane of a DMA slot.
    #[inline]
    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.geometry().planes()
    }

    #[inline]
    #[must_use]
    pub fn full_duplex(&self) -> bool {
        true
    }

    /// The DMA format and its full-scale value.
    #[must_use]
    pub fn native_stream_format(&self, _dir: Direction, _channel: usize) -> (&'static str, f64) {
        (FORMAT_CS16, FULL_SCALE)
    }

    #[must_use]
    pub fn stream_formats(&self, _dir: Direction, _channel: usize) -> Vec<&'static str> {
        vec![FORMAT_CS16]
    }

    /// Opens the stream of `dir` on `channels`, claiming the DMA channel.
    ///
    /// `format` must be `"CS16"`. `args` are ignored.
    #[allow(clippy::missing_errors_doc)]
    pub fn setup_stream(
        &self,
        dir: Direction,
        format: &str,
        channels: &[usize],
        args: &Kwargs,
    ) -> StreamResult<StreamHandle> {
        let handle = StreamHandle::from(dir);
        self.lifecycle(handle, |stream, engine, regs| {
            stream.setup(engine, regs, format, channels, args)
        })?;

        Ok(handle)
    }

    /// Releases the DMA channel. The stream must be deactivated first.
    #[allow(clippy::missing_errors_doc)]
    pub fn close_stream(&self, handle: StreamHandle) -> StreamResult<()> {
        self.lifecycle(handle, |stream, engine, regs| stream.close(engine, regs))
    }

    /// Starts the DMA engine; counters restart from zero.
    ///
    /// Timed (`HAS_TIME`, non-zero `time_ns`), triggered and finite
    /// (`num_elems > 0`) activation are not supported.
    #[allow(clippy::missing_errors_doc)]
    pub fn activate_stream(
        &self,
        handle: StreamHandle,
        flags: StreamFlags,
        time_ns: i64,
        num_elems: usize,
    ) -> StreamResult<()> {
        self.lifecycle(handle, |stream, engine, regs| {
            stream.activate(engine, regs, flags, time_ns, num_elems)
        })
    }

    /// Stops the DMA engine. A partly transferred slot is dropped; the
    /// counters are kept for [`Device::stream_info`].
    #[allow(clippy::missing_errors_doc)]
    pub fn deactivate_stream(
        &self,
        handle: StreamHandle,
        flags: StreamFlags,
        time_ns: i64,
    ) -> StreamResult<()> {
        self.lifecycle(handle, |stream, engine, regs| {
            stream.deactivate(engine, regs, flags, time_ns)
        })
    }

    /// Samples per channel in one ring slot.
    #[allow(clippy::missing_errors_doc)]
    pub fn stream_mtu(&self, handle: StreamHandle) -> StreamResult<usize> {
        match handle {
            StreamHandle::Rx => self.rx().core().ring.mtu(),
            StreamHandle::Tx => self.tx().core().ring.mtu(),
        }
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn num_direct_access_buffers(&self, handle: StreamHandle) -> StreamResult<usize> {
        let depth = match handle {
            StreamHandle::Rx => self.rx().core().ring.depth()?,
            StreamHandle::Tx => self.tx().core().ring.depth()?,
        };

        #[allow(clippy::cast_possible_truncation)]
        Ok(depth as usize)
    }

    /// One address per active channel into ring slot `slot`. The addresses
    /// stay valid as long as the device.
    #[allow(clippy::missing_errors_doc)]
    pub fn direct_access_buffer_addrs(
        &self,
        handle: StreamHandle,
        slot: usize,
    ) -> StreamResult<Vec<NonNull<Cs16>>> {
        match handle {
            StreamHandle::Rx => self.rx().core().ring.addrs(slot),
            StreamHandle::Tx => self.tx().core().ring.addrs(slot),
        }
    }

    /// Takes the next filled RX slot, waiting at most `timeout`.
    ///
    /// At most one slot may be held per direction; release it with
    /// [`Device::release_read_buffer`].
    #[allow(clippy::missing_errors_doc)]
    pub fn acquire_read_buffer(
        &self,
        handle: StreamHandle,
        timeout: Duration,
    ) -> StreamResult<ReadBuffer> {
        Self::rx_only(handle)?;
        self.rx().acquire(&*self.engine, timeout)
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn release_read_buffer(&self, handle: StreamHandle, slot: usize) -> StreamResult<()> {
        Self::rx_only(handle)?;
        self.rx().release(&*self.engine, slot)
    }

    /// Takes the next free TX slot, waiting at most `timeout`.
    #[allow(clippy::missing_errors_doc)]
    pub fn acquire_write_buffer(
        &self,
        handle: StreamHandle,
        timeout: Duration,
    ) -> StreamResult<WriteBuffer> {
        Self::tx_only(handle)?;
        self.tx().acquire(&*self.engine, timeout)
    }

    /// Submits the held TX slot with `num_elems` valid samples per channel.
    /// The rest of the slot is zeroed. Returns `UNDERFLOW` if one happened
    /// since the last report, and `END_BURST` if the slot ended a burst.
    #[allow(clippy::missing_errors_doc)]
    pub fn release_write_buffer(
        &self,
        handle: StreamHandle,
        slot: usize,
        num_elems: usize,
        flags: StreamFlags,
        time_ns: i64,
    ) -> StreamResult<StreamFlags> {
        Self::tx_only(handle)?;
        self.tx()
            .release(&*self.engine, slot, num_elems, flags, time_ns)
    }

    /// Reads `num_elems` samples per active channel, one buffer per channel.
    ///
    /// Blocks at most once, for at most `timeout`. Returns fewer samples only
    /// when the ring ran dry or failed after part of the request was served.
    #[allow(clippy::missing_errors_doc)]
    pub fn read_stream(
        &self,
        handle: StreamHandle,
        buffs: &mut [&mut [Cs16]],
        num_elems: usize,
        timeout: Duration,
    ) -> StreamResult<Transfer> {
        Self::rx_only(handle)?;
        self.rx()
            .read(&*self.engine, buffs, num_elems, timeout)
    }

    /// Writes `num_elems` samples per active channel. With `END_BURST` the
    /// last slot is submitted right away and marks the end of the burst.
    #[allow(clippy::missing_errors_doc)]
    pub fn write_stream(
        &self,
        handle: StreamHandle,
        buffs: &[&[Cs16]],
        num_elems: usize,
        flags: StreamFlags,
        time_ns: i64,
        timeout: Duration,
    ) -> StreamResult<Transfer> {
        Self::tx_only(handle)?;
        self.tx()
            .write(&*self.engine, buffs, num_elems, flags, time_ns, timeout)
    }

    /// Reports TX events: a burst the hardware finished sending, or an underflow.
    #[allow(clippy::missing_errors_doc)]
    pub fn read_stream_status(
        &self,
        handle: StreamHandle,
        timeout: Duration,
    ) -> StreamResult<StreamStatus> {
        match handle {
            StreamHandle::Tx => self.tx().status(&*self.engine, timeout),
            StreamHandle::Rx => Err(StreamError::NotSupported("rx stream status")),
        }
    }

    #[must_use]
    pub fn stream_info(&self, handle: StreamHandle) -> StreamInfo {
        match handle {
            StreamHandle::Rx => self.rx().info(),
            StreamHandle::Tx => self.tx().info(),
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        for handle in [StreamHandle::Rx, StreamHandle::Tx] {
            let state = self.stream_info(handle).state;

            if state == StreamState::Active {
                if let Err(_err) = self.deactivate_stream(handle, StreamFlags::empty(), 0) {
                    #[cfg(feature = "tracing")]
                    tracing::error!("{handle}: failed to stop on drop: {_err}");
                }
            }

            if state.is_opened() {
                if let Err(_err) = self.close_stream(handle) {
                    #[cfg(feature = "tracing")]
                    tracing::error!("{handle}: failed to close on drop: {_err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::SimEngine;

    use super::*;

    fn device() -> (Arc<SimEngine>, Device) {
        let sim = Arc::new(SimEngine::new(RingGeometry::new(8, 256, 2).unwrap()).unwrap());
        (sim.clone(), Device::new(sim))
    }

    #[test]
    fn device_is_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<Device>();
    }

    #[test]
    fn setup_claims_dma_and_close_releases() {
        let (sim, device) = device();

        let handle = device
            .setup_stream(Direction::Tx, "CS16", &[0, 1], &Kwargs::new())
            .unwrap();
        assert_eq!(handle, StreamHandle::Tx);
        assert!(sim.is_locked(Direction::Tx));
        assert!(!sim.is_locked(Direction::Rx));
        assert_eq!(device.stream_mtu(handle).unwrap(), 32);
        assert_eq!(device.num_direct_access_buffers(handle).unwrap(), 8);

        device.close_stream(handle).unwrap();
        assert!(!sim.is_locked(Direction::Tx));
        assert!(matches!(
            device.stream_mtu(handle),
            Err(StreamError::NotOpen(Direction::Tx))
        ));
    }

    #[test]
    fn setup_validates_format_and_channels() {
        let (sim, device) = device();
        let args = Kwargs::new();

        assert!(matches!(
            device.setup_stream(Direction::Rx, "CF32", &[0], &args),
            Err(StreamError::InvalidFormat(_))
        ));

        let cases: [&[usize]; 4] = [&[], &[2], &[0, 0], &[0, 1, 1]];
        for channels in cases {
            assert!(matches!(
                device.setup_stream(Direction::Rx, "CS16", channels, &args),
                Err(StreamError::InvalidChannels(_))
            ));
        }

        assert!(!sim.is_locked(Direction::Rx));
        assert_eq!(device.stream_info(StreamHandle::Rx).state, StreamState::Closed);
    }

    #[test]
    fn direction_is_checked() {
        let (_sim, device) = device();

        assert!(matches!(
            device.acquire_read_buffer(StreamHandle::Tx, Duration::ZERO),
            Err(StreamError::WrongDirection(StreamHandle::Tx))
        ));
        assert!(matches!(
            device.write_stream(StreamHandle::Rx, &[], 0, StreamFlags::empty(), 0, Duration::ZERO),
            Err(StreamError::WrongDirection(StreamHandle::Rx))
        ));
        assert!(matches!(
            device.read_stream_status(StreamHandle::Rx, Duration::ZERO),
            Err(StreamError::NotSupported(_))
        ));
    }

    #[test]
    fn activation_captures_sample_rate() {
        let (_sim, device) = device();
        device.set_sample_rate(Direction::Rx, 1e6).unwrap();

        let rx = device
            .setup_stream(Direction::Rx, "CS16", &[0], &Kwargs::new())
            .unwrap();
        device
            .activate_stream(rx, StreamFlags::empty(), 0, 0)
            .unwrap();

        device.set_sample_rate(Direction::Rx, 2e6).unwrap();
        assert_eq!(device.rx().core().sample_rate, 1e6);
    }

    #[test]
    fn drop_stops_and_releases() {
        let (sim, device) = device();
        let rx = device
            .setup_stream(Direction::Rx, "CS16", &[0], &Kwargs::new())
            .unwrap();
        device
            .activate_stream(rx, StreamFlags::empty(), 0, 0)
            .unwrap();
        assert!(sim.is_enabled(Direction::Rx));

        drop(device);
        assert!(!sim.is_enabled(Direction::Rx));
        assert!(!sim.is_locked(Direction::Rx));
    }
}
