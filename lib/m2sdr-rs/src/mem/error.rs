use std::io;

pub(crate) type MemResult<T> = Result<T, MemError>;

#[derive(Debug, thiserror::Error)]
pub enum MemError {
    #[error("mem error: {0}")]
    IO(#[from] io::Error),

    #[error("mem error: mmap not page aligned")]
    MmapAlign,

    #[error("mem error: invalid ring geometry: {0}")]
    Geometry(&'static str),

    #[error("mem error: {dir} region holds {len} bytes, ring needs {need}")]
    RegionTooSmall {
        dir: crate::Direction,
        len: usize,
        need: usize,
    },
}

impl MemError {
    #[inline]
    pub(crate) fn last_os_error() -> Self {
        MemError::IO(io::Error::last_os_error())
    }
}
