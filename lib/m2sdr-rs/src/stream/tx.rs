use std::{collections::VecDeque, mem, time::Duration};

use crate::{Direction, engine::DataPlane, sample::Cs16};

use super::{
    Remainder, Stream, StreamCore, StreamFlags, StreamInfo, StreamStatus, Transfer, WriteBuffer,
    error::{StreamError, StreamResult},
};

const DIR: Direction = Direction::Tx;

#[derive(Debug)]
pub(crate) struct TxStream {
    core: StreamCore,
    /// Sticky until the next activation.
    underflow: bool,
    /// Underflow not yet reported through flags or status.
    underflow_pending: bool,
    /// Nothing submitted since activation or since the last burst completed;
    /// the reader running dry is expected then.
    idle: bool,
    burst_end: bool,
    burst_samps: usize,
    /// Samples submitted since the current burst began.
    burst_total: usize,
    /// Ended bursts the reader has not finished: slot count at which each
    /// ends, and its size in samples.
    pending_bursts: VecDeque<(u64, usize)>,
    /// Sizes of completed bursts not yet reported by status.
    done_bursts: VecDeque<usize>,
}

impl Stream for TxStream {
    #[inline]
    fn core(&self) -> &StreamCore {
        &self.core
    }

    #[inline]
    fn core_mut(&mut self) -> &mut StreamCore {
        &mut self.core
    }

    fn reset(&mut self) {
        self.underflow = false;
        self.underflow_pending = false;
        self.idle = true;
        self.burst_end = false;
        self.burst_samps = 0;
        self.burst_total = 0;
        self.pending_bursts.clear();
        self.done_bursts.clear();
    }

    fn describe(&self, info: &mut StreamInfo) {
        info.underflow = self.underflow;
        info.burst_end = self.burst_end;
        info.burst_samps = self.burst_samps;
    }
}

impl TxStream {
    pub(crate) fn new() -> Self {
        Self {
            core: StreamCore::new(DIR),
            underflow: false,
            underflow_pending: false,
            idle: true,
            burst_end: false,
            burst_samps: 0,
            burst_total: 0,
            pending_bursts: VecDeque::new(),
            done_bursts: VecDeque::new(),
        }
    }

    /// Accounts for what the reader did since the last refresh: completes
    /// ended bursts once they have been read, and detects the reader running
    /// past submitted slots.
    fn track_reader(&mut self) -> StreamResult<()> {
        let ring = &mut self.core.ring;
        let reads = ring.hw_count.saturating_sub(ring.depth()?);

        while let Some(&(limit, samples)) = self.pending_bursts.front() {
            if reads < limit {
                break;
            }

            self.pending_bursts.pop_front();
            self.done_bursts.push_back(samples);
            // slots submitted past the end already belong to the next burst
            self.idle = ring.user_count == limit;

            #[cfg(feature = "tracing")]
            tracing::debug!("{DIR}: burst of {samples} samples sent");
        }

        if reads > ring.user_count && !ring.held() {
            if !self.idle && self.pending_bursts.is_empty() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "{DIR}: underflow, reader {} slots past submitted data",
                    reads - ring.user_count
                );

                self.underflow = true;
                self.underflow_pending = true;
                self.core.stats.underflows += 1;
            }

            ring.sw_count = reads;
            ring.user_count = reads;
        }

        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn acquire_slot<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        timeout: Duration,
    ) -> StreamResult<(usize, u64)> {
        self.core.state.ensure_active(DIR)?;

        if self.core.ring.held() {
            return Err(StreamError::BufferHeld(DIR));
        }

        let (ready, waited) = self.core.ring.wait_ready(engine, timeout)?;
        self.track_reader()?;

        let core = &mut self.core;
        if waited {
            core.stats.empty_waits += 1;
        }

        if !ready {
            core.stats.timeouts += 1;
            return Err(StreamError::Timeout);
        }

        let depth = core.ring.depth()?;
        let count = core.ring.sw_count;
        core.ring.sw_count += 1;

        Ok(((count % depth) as usize, count))
    }

    pub(crate) fn acquire<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        timeout: Duration,
    ) -> StreamResult<WriteBuffer> {
        let (slot, _) = self.acquire_slot(engine, timeout)?;

        let buffs = match self.core.ring.addrs(slot) {
            Ok(buffs) => buffs,
            Err(err) => {
                self.core.ring.sw_count -= 1;
                return Err(err);
            }
        };

        Ok(WriteBuffer {
            handle: slot,
            buffs,
            samples: self.core.ring.mtu()?,
        })
    }

    pub(crate) fn release<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        slot: usize,
        num_elems: usize,
        flags: StreamFlags,
        _time_ns: i64,
    ) -> StreamResult<StreamFlags> {
        self.core.state.ensure_active(DIR)?;

        if self.core.ring.held_slot()? != Some(slot) {
            return Err(StreamError::NotHeld(slot));
        }

        if flags.contains(StreamFlags::HAS_TIME) {
            return Err(StreamError::NotSupported("timed transmission"));
        }

        self.release_held(engine, num_elems, flags.contains(StreamFlags::END_BURST))
    }

    /// Submits the held slot with `num_elems` valid samples per channel.
    fn release_held<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        num_elems: usize,
        end: bool,
    ) -> StreamResult<StreamFlags> {
        let ring = &mut self.core.ring;

        let mtu = ring.mtu()?;
        if num_elems > mtu {
            return Err(StreamError::SlotOverflow { mtu, got: num_elems });
        }

        if let Some(slot) = ring.held_slot()? {
            ring.zero_fill(slot, num_elems)?;
        }

        engine.update(DIR, ring.user_count + 1, end)?;
        ring.user_count += 1;

        self.core.remainder = None;
        self.core.stats.slots += 1;
        self.idle = false;

        if self.burst_end {
            self.burst_end = false;
            self.burst_samps = 0;
        }
        self.burst_total += num_elems;

        let mut flags = StreamFlags::empty();
        if end {
            self.end_burst();
            flags |= StreamFlags::END_BURST;
        }

        if mem::take(&mut self.underflow_pending) {
            flags |= StreamFlags::UNDERFLOW;
        }

        Ok(flags)
    }

    fn end_burst(&mut self) {
        self.burst_end = true;
        self.burst_samps = mem::take(&mut self.burst_total);
        self.pending_bursts
            .push_back((self.core.ring.user_count, self.burst_samps));
        self.core.stats.bursts += 1;
    }

    /// Marks everything submitted so far as the end of the current burst.
    fn mark_burst_end<E: DataPlane + ?Sized>(&mut self, engine: &E) -> StreamResult<StreamFlags> {
        if self.core.ring.held() {
            return Err(StreamError::BufferHeld(DIR));
        }

        if self.idle || self.burst_end {
            return Ok(StreamFlags::empty());
        }

        engine.update(DIR, self.core.ring.user_count, true)?;
        self.end_burst();

        Ok(StreamFlags::END_BURST)
    }

    /// Writes `num_elems` samples per active channel from `buffs`.
    ///
    /// Blocks at most once. A slot filled only partly is kept for the next
    /// call unless `flags` has [`StreamFlags::END_BURST`], which submits it
    /// zero-padded.
    pub(crate) fn write<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        buffs: &[&[Cs16]],
        num_elems: usize,
        flags: StreamFlags,
        _time_ns: i64,
        timeout: Duration,
    ) -> StreamResult<Transfer> {
        self.core.state.ensure_active(DIR)?;

        if flags.contains(StreamFlags::HAS_TIME) {
            return Err(StreamError::NotSupported("timed transmission"));
        }

        self.core
            .check_buffers(buffs.iter().map(|buf| buf.len()), num_elems)?;

        let mtu = self.core.ring.mtu()?;

        // submit that failed on the previous call
        if self.core.remainder.is_some_and(|rem| rem.is_exhausted()) {
            self.release_held(engine, mtu, false)?;
        }

        let end = flags.contains(StreamFlags::END_BURST);
        let mut transfer = Transfer::default();
        let mut wait = timeout;
        let mut complete = true;

        while transfer.samples < num_elems {
            let mut rem = match self.core.remainder {
                Some(rem) => rem,
                None => match self.acquire_slot(engine, mem::take(&mut wait)) {
                    Ok((slot, count)) => Remainder::new(slot, count, mtu),
                    Err(_) if transfer.samples > 0 => {
                        complete = false;
                        break;
                    }
                    Err(err) => return Err(err),
                },
            };

            let n = (num_elems - transfer.samples).min(rem.samps);
            self.core
                .ring
                .copy_in(rem.slot, rem.offset, buffs, transfer.samples, n)?;

            rem.advance(n);
            transfer.samples += n;
            self.core.remainder = Some(rem);

            if rem.is_exhausted() {
                let last = end && transfer.samples == num_elems;

                match self.release_held(engine, mtu, last) {
                    Ok(released) => transfer.flags |= released,
                    Err(_err) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("{DIR}: slot submit failed, retrying on next write: {_err}");

                        complete = false;
                        break;
                    }
                }
            }
        }

        if end && complete && !transfer.flags.contains(StreamFlags::END_BURST) {
            transfer.flags |= match self.core.remainder {
                Some(rem) => self.release_held(engine, rem.offset, true)?,
                None => self.mark_burst_end(engine)?,
            };
        }

        self.core.stats.samples += transfer.samples as u64;
        Ok(transfer)
    }

    /// Reports a completed burst or an underflow, waiting at most once for one.
    pub(crate) fn status<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        timeout: Duration,
    ) -> StreamResult<StreamStatus> {
        self.core.state.ensure_active(DIR)?;

        self.core.ring.refresh(engine)?;
        self.track_reader()?;

        if let Some(status) = self.take_status() {
            return Ok(status);
        }

        if !timeout.is_zero() {
            engine.wait(DIR, timeout)?;
            self.core.ring.refresh(engine)?;
            self.track_reader()?;

            if let Some(status) = self.take_status() {
                return Ok(status);
            }
        }

        Err(StreamError::Timeout)
    }

    fn take_status(&mut self) -> Option<StreamStatus> {
        let mut status = StreamStatus::default();

        if let Some(samples) = self.done_bursts.pop_front() {
            status.flags |= StreamFlags::END_BURST;
            status.samples = samples;
        }

        if mem::take(&mut self.underflow_pending) {
            status.flags |= StreamFlags::UNDERFLOW;
        }

        (!status.flags.is_empty()).then_some(status)
    }
}
