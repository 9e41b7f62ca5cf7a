use std::{
    io,
    ptr::{self, NonNull},
};

use libc::{
    _SC_PAGESIZE, MAP_ANONYMOUS, MAP_FAILED, MAP_POPULATE, MAP_PRIVATE, MAP_SHARED, PROT_READ,
    PROT_WRITE, c_void,
};

use super::error::{MemError, MemResult};

#[derive(Debug)]
pub(crate) struct Mmap {
    addr: NonNull<c_void>,
    len: usize,
}

unsafe impl Send for Mmap {}
unsafe impl Sync for Mmap {}

impl Mmap {
    pub(crate) fn new(len: usize, fd: i32, offset: i64, populate: bool) -> MemResult<Self> {
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                if populate {
                    MAP_SHARED | MAP_POPULATE
                } else {
                    MAP_SHARED
                },
                fd,
                offset,
            )
        };

        Self::checked(addr, len)
    }

    /// Zero-filled private memory standing in for a device region.
    pub(crate) fn anonymous(len: usize) -> MemResult<Self> {
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        Self::checked(addr, len)
    }

    fn checked(addr: *mut c_void, len: usize) -> MemResult<Self> {
        if addr == MAP_FAILED {
            return Err(MemError::last_os_error());
        }

        let Some(addr) = NonNull::new(addr) else {
            return Err(MemError::IO(io::Error::other(
                "unexpected null pointer from `mmap()`",
            )));
        };

        let mmap = Mmap { addr, len };
        if mmap.is_page_aligned() {
            Ok(mmap)
        } else {
            Err(MemError::MmapAlign)
        }
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn is_page_aligned(&self) -> bool {
        let addr = self.addr.as_ptr() as usize;
        let pg_size = unsafe { libc::sysconf(_SC_PAGESIZE) as usize };

        addr & (pg_size - 1) == 0
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> NonNull<u8> {
        self.addr.cast()
    }
}

impl Drop for Mmap {
    fn drop(&mut self) {
        #[cfg(feature = "tracing")]
        if unsafe { libc::munmap(self.addr.as_ptr(), self.len) } != 0 {
            tracing::error!(
                "`munmap()` failed with error: {}",
                io::Error::last_os_error()
            );
        }

        #[cfg(not(feature = "tracing"))]
        if unsafe { libc::munmap(self.addr.as_ptr(), self.len) } != 0 {
            eprintln!("error unmapping memory: {}", io::Error::last_os_error());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_mapping_is_zeroed_and_aligned() {
        let mmap = Mmap::anonymous(8192).unwrap();
        assert_eq!(mmap.len(), 8192);

        let bytes = unsafe { std::slice::from_raw_parts(mmap.as_ptr().as_ptr(), mmap.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
