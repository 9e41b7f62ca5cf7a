mod error;
mod litepcie;

#[allow(clippy::module_inception)]
mod fd;

pub(crate) use fd::DeviceFd;
pub(crate) use litepcie::LockIoctl;

pub use error::FdError;
