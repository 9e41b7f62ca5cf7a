use std::{mem, time::Duration};

use crate::{Direction, engine::DataPlane, sample::Cs16};

use super::{
    ReadBuffer, Remainder, Stream, StreamCore, StreamFlags, StreamInfo, Transfer,
    error::{StreamError, StreamResult},
};

const DIR: Direction = Direction::Rx;

#[derive(Debug)]
pub(crate) struct RxStream {
    core: StreamCore,
    /// Sticky until the next activation.
    overflow: bool,
}

impl Stream for RxStream {
    #[inline]
    fn core(&self) -> &StreamCore {
        &self.core
    }

    #[inline]
    fn core_mut(&mut self) -> &mut StreamCore {
        &mut self.core
    }

    fn reset(&mut self) {
        self.overflow = false;
    }

    fn describe(&self, info: &mut StreamInfo) {
        info.overflow = self.overflow;
    }
}

impl RxStream {
    pub(crate) fn new() -> Self {
        Self {
            core: StreamCore::new(DIR),
            overflow: false,
        }
    }

    /// Takes the next written slot, waiting at most `timeout` for one.
    ///
    /// Returns the ring slot, its absolute count and the flags for it.
    #[allow(clippy::cast_possible_truncation)]
    fn acquire_slot<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        timeout: Duration,
    ) -> StreamResult<(usize, u64, StreamFlags)> {
        let core = &mut self.core;
        core.state.ensure_active(DIR)?;

        if core.ring.held() {
            return Err(StreamError::BufferHeld(DIR));
        }

        let (ready, waited) = core.ring.wait_ready(engine, timeout)?;
        if waited {
            core.stats.empty_waits += 1;
        }

        if !ready {
            core.stats.timeouts += 1;
            return Err(StreamError::Timeout);
        }

        let depth = core.ring.depth()?;
        let mut flags = StreamFlags::empty();

        // hardware lapped the reader and overwrote slots nobody consumed
        if core.ring.hw_count - core.ring.user_count > depth {
            let resync = core.ring.hw_count - (depth / 2).max(1);
            engine.update(DIR, resync, false)?;

            #[cfg(feature = "tracing")]
            tracing::warn!(
                "{DIR}: overflow, {} slots lost, skipping to {resync}",
                core.ring.hw_count - core.ring.user_count - depth
            );

            core.ring.sw_count = resync;
            core.ring.user_count = resync;
            core.stats.overflows += 1;
            self.overflow = true;
            flags |= StreamFlags::OVERFLOW;
        }

        let count = core.ring.sw_count;
        core.ring.sw_count += 1;

        Ok(((count % depth) as usize, count, flags))
    }

    pub(crate) fn acquire<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        timeout: Duration,
    ) -> StreamResult<ReadBuffer> {
        let (slot, count, mut flags) = self.acquire_slot(engine, timeout)?;

        let buffs = match self.core.ring.addrs(slot) {
            Ok(buffs) => buffs,
            Err(err) => {
                self.core.ring.sw_count -= 1;
                return Err(err);
            }
        };

        let time_ns = self.core.time_ns(count, 0);
        if time_ns.is_some() {
            flags |= StreamFlags::HAS_TIME;
        }

        Ok(ReadBuffer {
            handle: slot,
            buffs,
            samples: self.core.ring.mtu()?,
            flags,
            time_ns: time_ns.unwrap_or_default(),
        })
    }

    pub(crate) fn release<E: DataPlane + ?Sized>(&mut self, engine: &E, slot: usize) -> StreamResult<()> {
        self.core.state.ensure_active(DIR)?;

        if self.core.ring.held_slot()? != Some(slot) {
            return Err(StreamError::NotHeld(slot));
        }

        self.release_held(engine)
    }

    /// Hands the held slot back to the hardware.
    fn release_held<E: DataPlane + ?Sized>(&mut self, engine: &E) -> StreamResult<()> {
        let ring = &mut self.core.ring;

        engine.update(DIR, ring.user_count + 1, false)?;
        ring.user_count += 1;

        self.core.remainder = None;
        self.core.stats.slots += 1;

        Ok(())
    }

    /// Reads `num_elems` samples per active channel into `buffs`.
    ///
    /// Blocks at most once, on the first slot it has to acquire. A slot read
    /// only partly is kept for the next call.
    pub(crate) fn read<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        buffs: &mut [&mut [Cs16]],
        num_elems: usize,
        timeout: Duration,
    ) -> StreamResult<Transfer> {
        self.core.state.ensure_active(DIR)?;
        self.core
            .check_buffers(buffs.iter().map(|buf| buf.len()), num_elems)?;

        // release that failed on the previous call
        if self.core.remainder.is_some_and(|rem| rem.is_exhausted()) {
            self.release_held(engine)?;
        }

        let mtu = self.core.ring.mtu()?;
        let mut transfer = Transfer::default();
        let mut wait = timeout;

        while transfer.samples < num_elems {
            let mut rem = match self.core.remainder {
                Some(rem) => rem,
                None => match self.acquire_slot(engine, mem::take(&mut wait)) {
                    Ok((slot, count, flags)) => {
                        transfer.flags |= flags;
                        Remainder::new(slot, count, mtu)
                    }
                    Err(_) if transfer.samples > 0 => break,
                    Err(err) => return Err(err),
                },
            };

            let n = (num_elems - transfer.samples).min(rem.samps);
            self.core
                .ring
                .copy_out(rem.slot, rem.offset, buffs, transfer.samples, n)?;

            if transfer.samples == 0 {
                transfer.stamp(self.core.time_ns(rem.count, rem.offset));
            }

            rem.advance(n);
            transfer.samples += n;
            self.core.remainder = Some(rem);

            if rem.is_exhausted() {
                if let Err(_err) = self.release_held(engine) {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("{DIR}: slot release failed, retrying on next read: {_err}");
                    break;
                }
            }
        }

        self.core.stats.samples += transfer.samples as u64;
        Ok(transfer)
    }
}
