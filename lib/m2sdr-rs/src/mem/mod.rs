mod error;
mod mapping;
mod mmap;

pub(crate) use error::MemResult;
pub(crate) use mmap::Mmap;

pub use error::MemError;
pub use mapping::{DmaMapping, RingGeometry};
