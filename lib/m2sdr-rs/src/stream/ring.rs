use std::{ptr::NonNull, sync::Arc, time::Duration};

use quanta::Clock;

use crate::{
    Direction,
    engine::DataPlane,
    mem::{DmaMapping, RingGeometry},
    sample::Cs16,
};

use super::error::{StreamError, StreamResult};

#[derive(Debug)]
struct Binding {
    mapping: Arc<DmaMapping>,
    channels: Vec<usize>,
}

/// Progress of one direction over its DMA ring.
///
/// `user_count <= sw_count <= hw_count` always holds. `hw_count` is the count
/// software may advance `sw_count` to: slots written by hardware for RX, and
/// slots read by hardware plus the ring depth for TX. A slot is held by the
/// user while `sw_count > user_count`.
#[derive(Debug)]
pub(crate) struct Ring {
    dir: Direction,
    binding: Option<Binding>,
    pub(crate) hw_count: u64,
    pub(crate) sw_count: u64,
    pub(crate) user_count: u64,
    clock: Clock,
}

impl Ring {
    pub(crate) fn new(dir: Direction) -> Self {
        Self {
            dir,
            binding: None,
            hw_count: 0,
            sw_count: 0,
            user_count: 0,
            clock: Clock::new(),
        }
    }

    pub(crate) fn bind(&mut self, mapping: Arc<DmaMapping>, channels: Vec<usize>) {
        self.binding = Some(Binding { mapping, channels });
    }

    pub(crate) fn unbind(&mut self) {
        self.binding = None;
    }

    #[inline]
    fn binding(&self) -> StreamResult<&Binding> {
        self.binding.as_ref().ok_or(StreamError::NotOpen(self.dir))
    }

    #[inline]
    pub(crate) fn channels(&self) -> &[usize] {
        self.binding.as_ref().map_or(&[], |b| b.channels.as_slice())
    }

    #[inline]
    pub(crate) fn geometry(&self) -> StreamResult<RingGeometry> {
        Ok(*self.binding()?.mapping.geometry())
    }

    #[inline]
    pub(crate) fn depth(&self) -> StreamResult<u64> {
        Ok(self.geometry()?.depth() as u64)
    }

    /// Samples per channel per slot.
    #[inline]
    pub(crate) fn mtu(&self) -> StreamResult<usize> {
        Ok(self.geometry()?.samples_per_slot())
    }

    pub(crate) fn reset(&mut self) {
        self.hw_count = 0;
        self.sw_count = 0;
        self.user_count = 0;
    }

    #[inline]
    pub(crate) fn held(&self) -> bool {
        self.sw_count > self.user_count
    }

    /// Ring slot of the oldest slot held by the user.
    #[inline]
    pub(crate) fn held_slot(&self) -> StreamResult<Option<usize>> {
        if self.held() {
            #[allow(clippy::cast_possible_truncation)]
            Ok(Some((self.user_count % self.depth()?) as usize))
        } else {
            Ok(None)
        }
    }

    #[inline]
    pub(crate) fn ready(&self) -> bool {
        self.hw_count > self.sw_count
    }

    /// Pulls the hardware counter from the engine.
    pub(crate) fn refresh<E: DataPlane + ?Sized>(&mut self, engine: &E) -> StreamResult<()> {
        let done = engine.hw_count(self.dir)?;
        let frontier = match self.dir {
            Direction::Rx => done,
            Direction::Tx => done + self.depth()?,
        };

        self.hw_count = self.hw_count.max(frontier);
        Ok(())
    }

    /// Refreshes, then waits on readiness until a slot is available or
    /// `timeout` has passed. A zero timeout never waits.
    ///
    /// Returns whether a slot is available, and whether the call had to wait.
    pub(crate) fn wait_ready<E: DataPlane + ?Sized>(
        &mut self,
        engine: &E,
        timeout: Duration,
    ) -> StreamResult<(bool, bool)> {
        self.refresh(engine)?;
        if self.ready() {
            return Ok((true, false));
        }

        if timeout.is_zero() {
            return Ok((false, false));
        }

        let deadline = self.clock.now().checked_add(timeout);
        loop {
            let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(self.clock.now()));
            if remaining.is_zero() {
                return Ok((false, true));
            }

            let woken = engine.wait(self.dir, remaining)?;
            self.refresh(engine)?;

            if self.ready() {
                return Ok((true, true));
            }

            if !woken {
                return Ok((false, true));
            }
        }
    }

    /// One address per active channel, pointing at the channel's plane in `slot`.
    pub(crate) fn addrs(&self, slot: usize) -> StreamResult<Vec<NonNull<Cs16>>> {
        let binding = self.binding()?;

        binding
            .channels
            .iter()
            .map(|&channel| {
                binding
                    .mapping
                    .plane(self.dir, slot, channel)
                    .ok_or(StreamError::InvalidSlot(slot))
            })
            .collect()
    }

    /// Copies `n` samples per active channel out of `slot`, starting at sample
    /// `offset`, into `dst[i][at..at + n]`.
    pub(crate) fn copy_out(
        &self,
        slot: usize,
        offset: usize,
        dst: &mut [&mut [Cs16]],
        at: usize,
        n: usize,
    ) -> StreamResult<()> {
        let binding = self.binding()?;

        for (buf, &channel) in dst.iter_mut().zip(&binding.channels) {
            // SAFETY: the slot is held by this stream; hardware does not write it
            // and no other view of it exists.
            let plane = unsafe { binding.mapping.samples(self.dir, slot, channel) }
                .ok_or(StreamError::InvalidSlot(slot))?;

            buf[at..at + n].copy_from_slice(&plane[offset..offset + n]);
        }

        Ok(())
    }

    /// Copies `src[i][at..at + n]` into `slot` at sample `offset`.
    pub(crate) fn copy_in(
        &self,
        slot: usize,
        offset: usize,
        src: &[&[Cs16]],
        at: usize,
        n: usize,
    ) -> StreamResult<()> {
        let binding = self.binding()?;

        for (buf, &channel) in src.iter().zip(&binding.channels) {
            // SAFETY: as in copy_out.
            let plane = unsafe { binding.mapping.samples_mut(self.dir, slot, channel) }
                .ok_or(StreamError::InvalidSlot(slot))?;

            plane[offset..offset + n].copy_from_slice(&buf[at..at + n]);
        }

        Ok(())
    }

    /// Zeroes every sample of `slot` past `from` on active channels, and all of
    /// the planes of inactive channels.
    pub(crate) fn zero_fill(&self, slot: usize, from: usize) -> StreamResult<()> {
        let binding = self.binding()?;

        for channel in 0..binding.mapping.geometry().planes() {
            let start = if binding.channels.contains(&channel) {
                from
            } else {
                0
            };

            // SAFETY: as in copy_out.
            let plane = unsafe { binding.mapping.samples_mut(self.dir, slot, channel) }
                .ok_or(StreamError::InvalidSlot(slot))?;

            plane[start..].fill(Cs16::default());
        }

        Ok(())
    }
}
