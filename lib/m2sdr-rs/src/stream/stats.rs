/// Counters of one stream since it was last set up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamStats {
    /// Slots handed back to (RX) or submitted to (TX) the hardware.
    pub slots: u64,
    /// Samples moved through `read_stream` / `write_stream`.
    pub samples: u64,
    pub overflows: u64,
    pub underflows: u64,
    pub bursts: u64,
    pub timeouts: u64,
    /// Acquires that found the ring empty (RX) or full (TX) and had to wait.
    pub empty_waits: u64,
}
