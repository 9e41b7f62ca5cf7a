use std::{
    fmt,
    fs::{File, OpenOptions},
    os::fd::AsRawFd as _,
    path::{Path, PathBuf},
    ptr,
    time::Duration,
};

use libc::{pollfd, timespec};

use crate::mem::{MemError, Mmap};

use super::{
    error::{FdError, FdResult},
    litepcie::{
        DmaCountIoctl, DmaIoctl, LITEPCIE_IOCTL_DMA, LITEPCIE_IOCTL_DMA_READER,
        LITEPCIE_IOCTL_DMA_WRITER, LITEPCIE_IOCTL_LOCK, LITEPCIE_IOCTL_MMAP_DMA_INFO,
        LITEPCIE_IOCTL_MMAP_DMA_READER_UPDATE, LITEPCIE_IOCTL_MMAP_DMA_WRITER_UPDATE,
        LITEPCIE_IOCTL_REG, LockIoctl, MmapDmaInfo, MmapDmaUpdate, RegIoctl,
    },
};

pub(crate) struct DeviceFd {
    file: File,
    path: PathBuf,
}

#[allow(clippy::missing_fields_in_debug)]
impl fmt::Debug for DeviceFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceFd")
            .field("id", &self.file.as_raw_fd())
            .field("path", &self.path)
            .finish()
    }
}

impl DeviceFd {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> FdResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[inline]
    fn ioctl<T>(&self, request: libc::Ioctl, arg: &mut T) -> FdResult<()> {
        if unsafe { libc::ioctl(self.file.as_raw_fd(), request, ptr::from_mut(arg)) } < 0 {
            Err(FdError::last_os_error())
        } else {
            Ok(())
        }
    }

    #[inline]
    pub(crate) fn mmap(&self, len: usize, offset: i64) -> Result<Mmap, MemError> {
        Mmap::new(len, self.file.as_raw_fd(), offset, false)
    }

    pub(crate) fn reg_read(&self, addr: u32) -> FdResult<u32> {
        let mut reg = RegIoctl {
            addr,
            ..RegIoctl::default()
        };
        self.ioctl(LITEPCIE_IOCTL_REG, &mut reg)?;

        Ok(reg.val)
    }

    pub(crate) fn reg_write(&self, addr: u32, val: u32) -> FdResult<()> {
        let mut reg = RegIoctl {
            addr,
            val,
            is_write: 1,
        };
        self.ioctl(LITEPCIE_IOCTL_REG, &mut reg)
    }

    pub(crate) fn dma_loopback(&self, enable: bool) -> FdResult<()> {
        let mut dma = DmaIoctl {
            loopback_enable: u8::from(enable),
        };
        self.ioctl(LITEPCIE_IOCTL_DMA, &mut dma)
    }

    /// Sets the RX (writer) enable bit and returns `(hw_count, sw_count)`.
    pub(crate) fn dma_writer(&self, enable: bool) -> FdResult<(i64, i64)> {
        let mut dma = DmaCountIoctl {
            enable: u8::from(enable),
            ..DmaCountIoctl::default()
        };
        self.ioctl(LITEPCIE_IOCTL_DMA_WRITER, &mut dma)?;

        Ok((dma.hw_count, dma.sw_count))
    }

    /// Sets the TX (reader) enable bit and returns `(hw_count, sw_count)`.
    pub(crate) fn dma_reader(&self, enable: bool) -> FdResult<(i64, i64)> {
        let mut dma = DmaCountIoctl {
            enable: u8::from(enable),
            ..DmaCountIoctl::default()
        };
        self.ioctl(LITEPCIE_IOCTL_DMA_READER, &mut dma)?;

        Ok((dma.hw_count, dma.sw_count))
    }

    #[inline]
    pub(crate) fn writer_update(&self, sw_count: i64) -> FdResult<()> {
        self.ioctl(
            LITEPCIE_IOCTL_MMAP_DMA_WRITER_UPDATE,
            &mut MmapDmaUpdate { sw_count },
        )
    }

    #[inline]
    pub(crate) fn reader_update(&self, sw_count: i64) -> FdResult<()> {
        self.ioctl(
            LITEPCIE_IOCTL_MMAP_DMA_READER_UPDATE,
            &mut MmapDmaUpdate { sw_count },
        )
    }

    pub(crate) fn mmap_dma_info(&self) -> FdResult<MmapDmaInfo> {
        let mut info = MmapDmaInfo::default();
        self.ioctl(LITEPCIE_IOCTL_MMAP_DMA_INFO, &mut info)?;

        Ok(info)
    }

    pub(crate) fn lock(&self, mut lock: LockIoctl) -> FdResult<LockIoctl> {
        self.ioctl(LITEPCIE_IOCTL_LOCK, &mut lock)?;
        Ok(lock)
    }

    /// Waits up to `timeout` for `events`; `Ok(false)` on timeout. Interrupted waits report not ready.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(crate) fn poll(&self, events: i16, timeout: Duration) -> FdResult<bool> {
        let mut poll_fd = pollfd {
            fd: self.file.as_raw_fd(),
            events,
            revents: 0,
        };

        let ts = timespec {
            tv_sec: timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: libc::c_long::from(timeout.subsec_nanos() as i32),
        };

        match unsafe { libc::ppoll(&raw mut poll_fd, 1, &raw const ts, ptr::null()) } {
            -1 => {
                let err = FdError::last_os_error();
                match &err {
                    FdError::IO(io) if io.kind() == std::io::ErrorKind::Interrupted => Ok(false),
                    _ => Err(err),
                }
            }
            0 => Ok(false),
            _ => Ok(poll_fd.revents & events != 0),
        }
    }
}
