use bitflags::bitflags;

bitflags! {
    /// Per-call stream flags; bit values follow the framework's `SOAPY_SDR_*` flags.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StreamFlags: i32 {
        const END_BURST = 1 << 1;
        const HAS_TIME = 1 << 2;
        const END_ABRUPT = 1 << 3;
        const ONE_PACKET = 1 << 4;
        const MORE_FRAGMENTS = 1 << 5;
        const WAIT_TRIGGER = 1 << 6;

        /// RX slots were overwritten before software consumed them.
        const OVERFLOW = 1 << 8;
        /// TX hardware ran out of submitted slots.
        const UNDERFLOW = 1 << 9;
    }
}
