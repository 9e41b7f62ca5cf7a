/// Name of the only sample format the DMA engine produces and consumes.
pub const FORMAT_CS16: &str = "CS16";

/// Full-scale magnitude of a [`Cs16`] component.
pub const FULL_SCALE: f64 = 4096.0;

/// One complex sample as laid out in a DMA plane: interleaved signed 16-bit I and Q.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cs16 {
    pub i: i16,
    pub q: i16,
}

impl Cs16 {
    pub const BYTES: usize = size_of::<Self>();

    #[inline]
    #[must_use]
    pub const fn new(i: i16, q: i16) -> Self {
        Self { i, q }
    }

    /// Deterministic test pattern: sample `index` of `channel`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    #[inline]
    #[must_use]
    pub const fn ramp(channel: usize, index: u64) -> Self {
        Self {
            i: index as u16 as i16,
            q: ((index >> 16) as u16 ^ channel as u16) as i16,
        }
    }
}
