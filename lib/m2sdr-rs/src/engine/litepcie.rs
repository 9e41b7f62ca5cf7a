use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use libc::{POLLIN, POLLOUT};

use crate::{
    Direction,
    fd::{DeviceFd, FdError, LockIoctl},
    mem::{DmaMapping, RingGeometry},
    regs::RegisterGuard,
};

use super::{ControlPlane, DataPlane, Engine, EngineResult};

/// DMA engine of a LitePCIe board, driven through its character device.
#[derive(Debug)]
pub struct LitePcie {
    fd: DeviceFd,
    mapping: Arc<DmaMapping>,
    enabled: [AtomicBool; 2],
}

impl LitePcie {
    /// Opens `path`, queries the DMA buffer layout and maps both rings.
    ///
    /// Each slot is split into `planes` per-channel planes.
    #[allow(clippy::missing_errors_doc, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn open<P: AsRef<Path>>(path: P, planes: usize) -> EngineResult<Self> {
        let fd = DeviceFd::open(path)?;
        let info = fd.mmap_dma_info()?;

        for (what, val) in [
            ("rx buffer size", info.dma_rx_buf_size),
            ("rx buffer count", info.dma_rx_buf_count),
            ("tx buffer size", info.dma_tx_buf_size),
            ("tx buffer count", info.dma_tx_buf_count),
        ] {
            if val <= 0 {
                return Err(FdError::DmaInfo(what, val).into());
            }
        }

        for (what, val) in [
            ("rx buffer offset", info.dma_rx_buf_offset),
            ("tx buffer offset", info.dma_tx_buf_offset),
        ] {
            if val < 0 {
                return Err(FdError::DmaInfo(what, val).into());
            }
        }

        if info.dma_rx_buf_size != info.dma_tx_buf_size
            || info.dma_rx_buf_count != info.dma_tx_buf_count
        {
            return Err(FdError::DmaAsymmetric.into());
        }

        let geometry = RingGeometry::new(
            info.dma_rx_buf_count as usize,
            info.dma_rx_buf_size as usize,
            planes,
        )?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "litepcie: {} slots x {} bytes, {} planes, rx @ {:#x}, tx @ {:#x}",
            geometry.depth(),
            geometry.slot_size(),
            geometry.planes(),
            info.dma_rx_buf_offset,
            info.dma_tx_buf_offset
        );

        let rx = fd.mmap(geometry.region_len(), info.dma_rx_buf_offset)?;
        let tx = fd.mmap(geometry.region_len(), info.dma_tx_buf_offset)?;

        Ok(Self {
            fd,
            mapping: Arc::new(DmaMapping::new(geometry, rx, tx)?),
            enabled: [AtomicBool::new(false), AtomicBool::new(false)],
        })
    }

    #[inline]
    fn is_enabled(&self, dir: Direction) -> bool {
        self.enabled[dir.index()].load(Ordering::Acquire)
    }

    fn set_enabled(&self, dir: Direction, enable: bool) -> EngineResult<()> {
        match dir {
            Direction::Rx => self.fd.dma_writer(enable)?,
            Direction::Tx => self.fd.dma_reader(enable)?,
        };

        self.enabled[dir.index()].store(enable, Ordering::Release);
        Ok(())
    }

    #[inline]
    const fn events(dir: Direction) -> i16 {
        match dir {
            Direction::Rx => POLLIN,
            Direction::Tx => POLLOUT,
        }
    }
}

impl DataPlane for LitePcie {
    #[allow(clippy::cast_sign_loss)]
    fn hw_count(&self, dir: Direction) -> EngineResult<u64> {
        let enable = self.is_enabled(dir);
        let (hw_count, _) = match dir {
            Direction::Rx => self.fd.dma_writer(enable)?,
            Direction::Tx => self.fd.dma_reader(enable)?,
        };

        Ok(hw_count.max(0) as u64)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn update(&self, dir: Direction, sw_count: u64, burst_end: bool) -> EngineResult<()> {
        match dir {
            Direction::Rx => self.fd.writer_update(sw_count as i64)?,
            Direction::Tx => {
                // the reader has no burst marker; it idles once it reaches sw_count
                #[cfg(feature = "tracing")]
                if burst_end {
                    tracing::trace!("litepcie: tx burst ends at slot count {sw_count}");
                }
                #[cfg(not(feature = "tracing"))]
                let _ = burst_end;

                self.fd.reader_update(sw_count as i64)?;
            }
        }

        Ok(())
    }

    #[inline]
    fn wait(&self, dir: Direction, timeout: Duration) -> EngineResult<bool> {
        Ok(self.fd.poll(Self::events(dir), timeout)?)
    }

    #[inline]
    fn drain(&self, dir: Direction) -> EngineResult<()> {
        self.fd.poll(Self::events(dir), Duration::ZERO)?;
        Ok(())
    }
}

impl ControlPlane for LitePcie {
    fn request(&self, _regs: &RegisterGuard<'_>, dir: Direction) -> EngineResult<bool> {
        let status = match dir {
            Direction::Rx => {
                self.fd
                    .lock(LockIoctl {
                        dma_writer_request: 1,
                        ..LockIoctl::default()
                    })?
                    .dma_writer_status
            }
            Direction::Tx => {
                self.fd
                    .lock(LockIoctl {
                        dma_reader_request: 1,
                        ..LockIoctl::default()
                    })?
                    .dma_reader_status
            }
        };

        Ok(status != 0)
    }

    fn release(&self, _regs: &RegisterGuard<'_>, dir: Direction) -> EngineResult<()> {
        let lock = match dir {
            Direction::Rx => LockIoctl {
                dma_writer_release: 1,
                ..LockIoctl::default()
            },
            Direction::Tx => LockIoctl {
                dma_reader_release: 1,
                ..LockIoctl::default()
            },
        };

        self.fd.lock(lock)?;
        Ok(())
    }

    #[inline]
    fn start(&self, _regs: &RegisterGuard<'_>, dir: Direction) -> EngineResult<()> {
        self.set_enabled(dir, true)
    }

    #[inline]
    fn stop(&self, _regs: &RegisterGuard<'_>, dir: Direction) -> EngineResult<()> {
        self.set_enabled(dir, false)
    }

    #[inline]
    fn read_reg(&self, _regs: &RegisterGuard<'_>, addr: u32) -> EngineResult<u32> {
        Ok(self.fd.reg_read(addr)?)
    }

    #[inline]
    fn write_reg(&self, _regs: &RegisterGuard<'_>, addr: u32, val: u32) -> EngineResult<()> {
        Ok(self.fd.reg_write(addr, val)?)
    }

    #[inline]
    fn set_loopback(&self, _regs: &RegisterGuard<'_>, enable: bool) -> EngineResult<()> {
        Ok(self.fd.dma_loopback(enable)?)
    }
}

impl Engine for LitePcie {
    #[inline]
    fn mapping(&self) -> &Arc<DmaMapping> {
        &self.mapping
    }
}
