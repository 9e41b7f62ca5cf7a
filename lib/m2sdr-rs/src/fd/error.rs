use std::io;

pub(crate) type FdResult<T> = Result<T, FdError>;

#[derive(Debug, thiserror::Error)]
#[error("fd error: {0}")]
pub enum FdError {
    IO(#[from] io::Error),

    #[error("fd error: dma info reports invalid {0}: {1}")]
    DmaInfo(&'static str, i64),

    #[error("fd error: rx and tx dma buffers differ in geometry")]
    DmaAsymmetric,
}

impl FdError {
    #[inline]
    pub(crate) fn last_os_error() -> Self {
        FdError::IO(io::Error::last_os_error())
    }
}
