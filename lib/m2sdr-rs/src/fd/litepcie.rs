use std::mem;

const LITEPCIE_IOCTL: u32 = b'S' as u32;

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

#[allow(clippy::cast_possible_truncation)]
const fn ioc<T>(dir: u32, nr: u32) -> libc::Ioctl {
    ((dir << 30) | ((mem::size_of::<T>() as u32) << 16) | (LITEPCIE_IOCTL << 8) | nr) as _
}

pub(super) const LITEPCIE_IOCTL_REG: libc::Ioctl = ioc::<RegIoctl>(IOC_READ | IOC_WRITE, 0);
pub(super) const LITEPCIE_IOCTL_DMA: libc::Ioctl = ioc::<DmaIoctl>(IOC_WRITE, 20);
pub(super) const LITEPCIE_IOCTL_DMA_WRITER: libc::Ioctl =
    ioc::<DmaCountIoctl>(IOC_READ | IOC_WRITE, 21);
pub(super) const LITEPCIE_IOCTL_DMA_READER: libc::Ioctl =
    ioc::<DmaCountIoctl>(IOC_READ | IOC_WRITE, 22);
pub(super) const LITEPCIE_IOCTL_MMAP_DMA_INFO: libc::Ioctl = ioc::<MmapDmaInfo>(IOC_READ, 24);
pub(super) const LITEPCIE_IOCTL_LOCK: libc::Ioctl = ioc::<LockIoctl>(IOC_READ | IOC_WRITE, 25);
pub(super) const LITEPCIE_IOCTL_MMAP_DMA_WRITER_UPDATE: libc::Ioctl =
    ioc::<MmapDmaUpdate>(IOC_WRITE, 26);
pub(super) const LITEPCIE_IOCTL_MMAP_DMA_READER_UPDATE: libc::Ioctl =
    ioc::<MmapDmaUpdate>(IOC_WRITE, 27);

#[repr(C)]
#[derive(Debug, Default)]
pub(super) struct RegIoctl {
    pub(super) addr: u32,
    pub(super) val: u32,
    pub(super) is_write: u8,
}

#[repr(C)]
#[derive(Debug, Default)]
pub(super) struct DmaIoctl {
    pub(super) loopback_enable: u8,
}

/// Shared layout of the writer (RX) and reader (TX) control ioctls.
#[repr(C)]
#[derive(Debug, Default)]
pub(super) struct DmaCountIoctl {
    pub(super) enable: u8,
    pub(super) hw_count: i64,
    pub(super) sw_count: i64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct MmapDmaInfo {
    pub(crate) dma_tx_buf_offset: i64,
    pub(crate) dma_tx_buf_size: i64,
    pub(crate) dma_tx_buf_count: i64,
    pub(crate) dma_rx_buf_offset: i64,
    pub(crate) dma_rx_buf_size: i64,
    pub(crate) dma_rx_buf_count: i64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LockIoctl {
    pub(crate) dma_reader_request: u8,
    pub(crate) dma_writer_request: u8,
    pub(crate) dma_reader_release: u8,
    pub(crate) dma_writer_release: u8,
    pub(crate) dma_reader_status: u8,
    pub(crate) dma_writer_status: u8,
}

#[repr(C)]
#[derive(Debug, Default)]
pub(super) struct MmapDmaUpdate {
    pub(super) sw_count: i64,
}
