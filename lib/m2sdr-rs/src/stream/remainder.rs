/// The part of a held slot that `read_stream` has not handed out yet, or that
/// `write_stream` has not filled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Remainder {
    pub(crate) slot: usize,
    /// Absolute slot count, for timestamps.
    pub(crate) count: u64,
    pub(crate) offset: usize,
    pub(crate) samps: usize,
}

impl Remainder {
    #[inline]
    pub(crate) fn new(slot: usize, count: u64, mtu: usize) -> Self {
        Self {
            slot,
            count,
            offset: 0,
            samps: mtu,
        }
    }

    #[inline]
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.samps);
        self.offset += n;
        self.samps -= n;
    }

    /// Every sample of the slot has been transferred; the slot still awaits release.
    #[inline]
    pub(crate) fn is_exhausted(&self) -> bool {
        self.samps == 0
    }
}
