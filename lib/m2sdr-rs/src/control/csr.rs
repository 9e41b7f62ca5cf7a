//! Register map of the RF frontend mailbox, as word offsets in the CSR space.
//!
//! Values are latched by the gateware and applied to the transceiver; nothing
//! here reads back.

pub(crate) const RX_GAIN: [u32; 2] = [0x3800, 0x3804];
pub(crate) const TX_GAIN: [u32; 2] = [0x3808, 0x380c];

pub(crate) const RX_FREQ_LO: u32 = 0x3810;
pub(crate) const RX_FREQ_HI: u32 = 0x3814;
pub(crate) const TX_FREQ_LO: u32 = 0x3818;
pub(crate) const TX_FREQ_HI: u32 = 0x381c;

pub(crate) const SAMPLE_RATE: u32 = 0x3820;
pub(crate) const RX_BANDWIDTH: u32 = 0x3824;
pub(crate) const TX_BANDWIDTH: u32 = 0x3828;

pub(crate) const RX_ANTENNA: u32 = 0x382c;
pub(crate) const TX_ANTENNA: u32 = 0x3830;

pub(crate) const CLOCK_SOURCE: u32 = 0x3834;
