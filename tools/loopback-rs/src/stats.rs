use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use m2sdr::{Device, StreamHandle};
use quanta::{Clock, Instant};

/// Counters shared between the stream threads and the reporter.
#[derive(Debug, Default)]
pub struct Counters {
    pub tx_samples: AtomicU64,
    pub rx_samples: AtomicU64,
    pub mismatches: AtomicU64,
    pub errors: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Snapshot {
    tx_samples: u64,
    rx_samples: u64,
    mismatches: u64,
    errors: u64,
    overflows: u64,
    underflows: u64,
}

#[derive(Debug)]
pub struct Reporter {
    device: Arc<Device>,
    counters: Arc<Counters>,
    clock: Clock,
    last_timestamp: Instant,
    last: Snapshot,
}

impl Reporter {
    pub fn new(device: Arc<Device>, counters: Arc<Counters>) -> Self {
        let clock = Clock::new();
        let last_timestamp = clock.now();

        Self {
            device,
            counters,
            clock,
            last_timestamp,
            last: Snapshot::default(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        let rx = self.device.stream_info(StreamHandle::Rx).stats;
        let tx = self.device.stream_info(StreamHandle::Tx).stats;

        Snapshot {
            tx_samples: self.counters.tx_samples.load(Ordering::Relaxed),
            rx_samples: self.counters.rx_samples.load(Ordering::Relaxed),
            mismatches: self.counters.mismatches.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            overflows: rx.overflows,
            underflows: tx.underflows,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn report(&mut self) {
        let now = self.clock.now();
        let diff = now.duration_since(self.last_timestamp).as_secs_f64();
        let cur = self.snapshot();

        if diff > 0. {
            let rate = |new: u64, old: u64| (new - old) as f64 / diff / 1e6;

            println!(
                "tx {:8.3} MS/s | rx {:8.3} MS/s | overflows {:5} | underflows {:5} | mismatches {:8} | errors {:5}",
                rate(cur.tx_samples, self.last.tx_samples),
                rate(cur.rx_samples, self.last.rx_samples),
                cur.overflows,
                cur.underflows,
                cur.mismatches,
                cur.errors,
            );

            #[cfg(feature = "tracing")]
            if cur.mismatches > self.last.mismatches {
                tracing::warn!(
                    "{} samples did not match the ramp",
                    cur.mismatches - self.last.mismatches
                );
            }
        }

        self.last = cur;
        self.last_timestamp = now;
    }
}
