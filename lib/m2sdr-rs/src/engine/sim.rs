use std::{
    collections::BTreeMap,
    io,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::{
    Direction,
    mem::{DmaMapping, Mmap, RingGeometry},
    regs::RegisterGuard,
    sample::Cs16,
};

use super::{ControlPlane, DataPlane, Engine, EngineError, EngineResult};

/// Software model of the board's DMA engine.
///
/// Nothing moves on its own: the owner plays the hardware side by calling
/// [`SimEngine::produce_rx`] and [`SimEngine::consume_tx`], from any thread.
/// Readiness is level-triggered, as with `poll(2)` on the real device.
#[derive(Debug)]
pub struct SimEngine {
    mapping: Arc<DmaMapping>,
    state: Mutex<SimState>,
    ready: Condvar,
}

#[derive(Debug, Default)]
struct SimState {
    rx: SimDma,
    tx: SimDma,
    loopback: bool,
    regs: BTreeMap<u32, u32>,
    faults: u32,
}

#[derive(Debug, Default)]
struct SimDma {
    locked: bool,
    enabled: bool,
    hw_count: u64,
    sw_count: u64,
    burst_end: Option<u64>,
}

impl SimState {
    #[inline]
    fn dma(&self, dir: Direction) -> &SimDma {
        match dir {
            Direction::Rx => &self.rx,
            Direction::Tx => &self.tx,
        }
    }

    #[inline]
    fn dma_mut(&mut self, dir: Direction) -> &mut SimDma {
        match dir {
            Direction::Rx => &mut self.rx,
            Direction::Tx => &mut self.tx,
        }
    }

    fn fault(&mut self) -> EngineResult<()> {
        if self.faults > 0 {
            self.faults -= 1;
            Err(EngineError::IO(io::Error::other("simulated dma fault")))
        } else {
            Ok(())
        }
    }
}

impl SimEngine {
    #[allow(clippy::missing_errors_doc)]
    pub fn new(geometry: RingGeometry) -> EngineResult<Self> {
        let rx = Mmap::anonymous(geometry.region_len())?;
        let tx = Mmap::anonymous(geometry.region_len())?;

        Ok(Self {
            mapping: Arc::new(DmaMapping::new(geometry, rx, tx)?),
            state: Mutex::new(SimState::default()),
            ready: Condvar::new(),
        })
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn depth(&self) -> u64 {
        self.mapping.geometry().depth() as u64
    }

    fn is_ready(&self, state: &SimState, dir: Direction) -> bool {
        let dma = state.dma(dir);
        dma.enabled
            && match dir {
                Direction::Rx => dma.hw_count > dma.sw_count,
                Direction::Tx => dma.hw_count + self.depth() > dma.sw_count,
            }
    }

    /// Hardware writes `slots` RX slots filled with [`Cs16::ramp`], overwriting
    /// whatever software has not handed back yet. Returns the slots written,
    /// zero while the RX channel is stopped.
    pub fn produce_rx(&self, slots: usize) -> usize {
        self.produce_rx_with(slots, Cs16::ramp)
    }

    /// Like [`SimEngine::produce_rx`]; `sample(channel, index)` gives the value of
    /// the `index`-th sample since the channel started.
    pub fn produce_rx_with(&self, slots: usize, mut sample: impl FnMut(usize, u64) -> Cs16) -> usize {
        let mut state = self.lock();
        if !state.rx.enabled {
            return 0;
        }

        let geometry = *self.mapping.geometry();
        let spp = geometry.samples_per_slot() as u64;

        for _ in 0..slots {
            let count = state.rx.hw_count;
            let slot = (count % self.depth()) as usize;

            for channel in 0..geometry.planes() {
                if let Some(plane) = unsafe { self.mapping.samples_mut(Direction::Rx, slot, channel) } {
                    for (k, s) in plane.iter_mut().enumerate() {
                        *s = sample(channel, count * spp + k as u64);
                    }
                }
            }

            state.rx.hw_count += 1;
        }

        self.ready.notify_all();
        slots
    }

    /// Hardware reads up to `slots` TX slots. Reading stops at a marked burst
    /// end; otherwise it runs past what software submitted, as the real reader
    /// does. With loopback on, every slot read is written to the next RX slot.
    pub fn consume_tx(&self, slots: usize) -> usize {
        let mut state = self.lock();
        if !state.tx.enabled {
            return 0;
        }

        let planes = self.mapping.geometry().planes();
        let mut consumed = 0;

        while consumed < slots {
            if state.tx.burst_end.is_some_and(|end| state.tx.hw_count >= end) {
                break;
            }

            if state.loopback && state.rx.enabled {
                let src = (state.tx.hw_count % self.depth()) as usize;
                let dst = (state.rx.hw_count % self.depth()) as usize;

                for channel in 0..planes {
                    let from = unsafe { self.mapping.samples(Direction::Tx, src, channel) };
                    let to = unsafe { self.mapping.samples_mut(Direction::Rx, dst, channel) };

                    if let (Some(from), Some(to)) = (from, to) {
                        to.copy_from_slice(from);
                    }
                }

                state.rx.hw_count += 1;
            }

            state.tx.hw_count += 1;
            consumed += 1;
        }

        self.ready.notify_all();
        consumed
    }

    /// Makes the next `calls` counter reads, updates or stops fail with an I/O error.
    pub fn fail_next(&self, calls: u32) {
        self.lock().faults = calls;
    }

    #[must_use]
    pub fn is_enabled(&self, dir: Direction) -> bool {
        self.lock().dma(dir).enabled
    }

    #[must_use]
    pub fn is_locked(&self, dir: Direction) -> bool {
        self.lock().dma(dir).locked
    }

    #[must_use]
    pub fn is_loopback(&self) -> bool {
        self.lock().loopback
    }

    /// Slot count the hardware last received from software.
    #[must_use]
    pub fn sw_count(&self, dir: Direction) -> u64 {
        self.lock().dma(dir).sw_count
    }

    #[must_use]
    pub fn register(&self, addr: u32) -> Option<u32> {
        self.lock().regs.get(&addr).copied()
    }

    /// Samples of `channel` in TX slot `slot`, as the hardware would read them.
    #[must_use]
    pub fn tx_samples(&self, slot: usize, channel: usize) -> Option<Vec<Cs16>> {
        let _state = self.lock();
        unsafe { self.mapping.samples(Direction::Tx, slot, channel) }.map(<[Cs16]>::to_vec)
    }
}

impl DataPlane for SimEngine {
    fn hw_count(&self, dir: Direction) -> EngineResult<u64> {
        let mut state = self.lock();
        state.fault()?;

        Ok(state.dma(dir).hw_count)
    }

    fn update(&self, dir: Direction, sw_count: u64, burst_end: bool) -> EngineResult<()> {
        let mut state = self.lock();
        state.fault()?;

        let dma = state.dma_mut(dir);

        dma.sw_count = sw_count;
        if dir == Direction::Tx {
            dma.burst_end = burst_end.then_some(sw_count);
        }

        self.ready.notify_all();
        Ok(())
    }

    fn wait(&self, dir: Direction, timeout: Duration) -> EngineResult<bool> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock();

        loop {
            if self.is_ready(&state, dir) {
                return Ok(true);
            }

            let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
            if remaining.is_zero() {
                return Ok(false);
            }

            state = self
                .ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    #[inline]
    fn drain(&self, _dir: Direction) -> EngineResult<()> {
        Ok(())
    }
}

impl ControlPlane for SimEngine {
    fn request(&self, _regs: &RegisterGuard<'_>, dir: Direction) -> EngineResult<bool> {
        let mut state = self.lock();
        let dma = state.dma_mut(dir);

        if dma.locked {
            Ok(false)
        } else {
            dma.locked = true;
            Ok(true)
        }
    }

    fn release(&self, _regs: &RegisterGuard<'_>, dir: Direction) -> EngineResult<()> {
        self.lock().dma_mut(dir).locked = false;
        Ok(())
    }

    fn start(&self, _regs: &RegisterGuard<'_>, dir: Direction) -> EngineResult<()> {
        let mut state = self.lock();
        let locked = state.dma(dir).locked;
        *state.dma_mut(dir) = SimDma {
            locked,
            enabled: true,
            ..SimDma::default()
        };

        self.ready.notify_all();
        Ok(())
    }

    fn stop(&self, _regs: &RegisterGuard<'_>, dir: Direction) -> EngineResult<()> {
        let mut state = self.lock();
        state.fault()?;

        state.dma_mut(dir).enabled = false;
        drop(state);
        self.ready.notify_all();
        Ok(())
    }

    fn read_reg(&self, _regs: &RegisterGuard<'_>, addr: u32) -> EngineResult<u32> {
        Ok(self.register(addr).unwrap_or(0))
    }

    fn write_reg(&self, _regs: &RegisterGuard<'_>, addr: u32, val: u32) -> EngineResult<()> {
        self.lock().regs.insert(addr, val);
        Ok(())
    }

    fn set_loopback(&self, _regs: &RegisterGuard<'_>, enable: bool) -> EngineResult<()> {
        self.lock().loopback = enable;
        Ok(())
    }
}

impl Engine for SimEngine {
    #[inline]
    fn mapping(&self) -> &Arc<DmaMapping> {
        &self.mapping
    }
}
