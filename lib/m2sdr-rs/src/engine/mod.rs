//! The seam between the stream engine and a DMA implementation.

mod error;
mod litepcie;
mod sim;

use std::{fmt, sync::Arc, time::Duration};

use crate::{Direction, mem::DmaMapping, regs::RegisterGuard};

pub(crate) use error::EngineResult;

pub use error::EngineError;
pub use litepcie::LitePcie;
pub use sim::SimEngine;

/// Per-sample path. Implementations must not touch the register lock.
pub trait DataPlane {
    /// Slots completed by the hardware since the last [`ControlPlane::start`]:
    /// written for RX, read for TX.
    #[allow(clippy::missing_errors_doc)]
    fn hw_count(&self, dir: Direction) -> Result<u64, EngineError>;

    /// Reports how many slots software has handed back (RX) or submitted (TX).
    /// `burst_end` marks the submitted count as the end of a TX burst.
    #[allow(clippy::missing_errors_doc)]
    fn update(&self, dir: Direction, sw_count: u64, burst_end: bool) -> Result<(), EngineError>;

    /// Waits at most `timeout` on the direction's readiness descriptor.
    /// `Ok(false)` means the wait timed out.
    #[allow(clippy::missing_errors_doc)]
    fn wait(&self, dir: Direction, timeout: Duration) -> Result<bool, EngineError>;

    /// Consumes any readiness notification still pending for `dir`.
    #[allow(clippy::missing_errors_doc)]
    fn drain(&self, dir: Direction) -> Result<(), EngineError>;
}

/// Register-file path; every call needs the register lock.
pub trait ControlPlane {
    /// Requests exclusive use of the direction's DMA channel. `Ok(false)` if
    /// another owner holds it.
    #[allow(clippy::missing_errors_doc)]
    fn request(&self, regs: &RegisterGuard<'_>, dir: Direction) -> Result<bool, EngineError>;

    #[allow(clippy::missing_errors_doc)]
    fn release(&self, regs: &RegisterGuard<'_>, dir: Direction) -> Result<(), EngineError>;

    /// Enables the DMA channel; hardware counters restart from zero.
    #[allow(clippy::missing_errors_doc)]
    fn start(&self, regs: &RegisterGuard<'_>, dir: Direction) -> Result<(), EngineError>;

    #[allow(clippy::missing_errors_doc)]
    fn stop(&self, regs: &RegisterGuard<'_>, dir: Direction) -> Result<(), EngineError>;

    #[allow(clippy::missing_errors_doc)]
    fn read_reg(&self, regs: &RegisterGuard<'_>, addr: u32) -> Result<u32, EngineError>;

    #[allow(clippy::missing_errors_doc)]
    fn write_reg(&self, regs: &RegisterGuard<'_>, addr: u32, val: u32) -> Result<(), EngineError>;

    /// Routes TX DMA straight back into RX DMA inside the gateware.
    #[allow(clippy::missing_errors_doc)]
    fn set_loopback(&self, regs: &RegisterGuard<'_>, enable: bool) -> Result<(), EngineError>;
}

pub trait Engine: DataPlane + ControlPlane + Send + Sync + fmt::Debug {
    fn mapping(&self) -> &Arc<DmaMapping>;
}
