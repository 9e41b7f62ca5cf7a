use std::{ptr::NonNull, slice};

use crate::{Direction, sample::Cs16};

use super::{
    error::{MemError, MemResult},
    mmap::Mmap,
};

/// Shape of one direction's DMA ring.
///
/// Every slot is `slot_size` bytes and is split into `planes` equal,
/// contiguous per-channel planes of interleaved [`Cs16`] samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    depth: usize,
    slot_size: usize,
    planes: usize,
}

impl RingGeometry {
    #[allow(clippy::missing_errors_doc)]
    pub fn new(depth: usize, slot_size: usize, planes: usize) -> Result<Self, MemError> {
        if depth == 0 {
            return Err(MemError::Geometry("ring depth must be non-zero"));
        }

        if planes == 0 {
            return Err(MemError::Geometry("slot must hold at least one plane"));
        }

        if slot_size == 0 || slot_size % (planes * Cs16::BYTES) != 0 {
            return Err(MemError::Geometry(
                "slot size must be a non-zero multiple of planes * sample size",
            ));
        }

        Ok(Self {
            depth,
            slot_size,
            planes,
        })
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> usize {
        self.planes
    }

    #[inline]
    #[must_use]
    pub fn plane_size(&self) -> usize {
        self.slot_size / self.planes
    }

    /// Samples per channel per slot.
    #[inline]
    #[must_use]
    pub fn samples_per_slot(&self) -> usize {
        self.plane_size() / Cs16::BYTES
    }

    #[inline]
    #[must_use]
    pub fn region_len(&self) -> usize {
        self.depth * self.slot_size
    }
}

/// The two mapped DMA regions of a board, one per direction.
#[derive(Debug)]
pub struct DmaMapping {
    geometry: RingGeometry,
    rx: Mmap,
    tx: Mmap,
}

impl DmaMapping {
    pub(crate) fn new(geometry: RingGeometry, rx: Mmap, tx: Mmap) -> MemResult<Self> {
        let need = geometry.region_len();

        for (dir, region) in [(Direction::Rx, &rx), (Direction::Tx, &tx)] {
            if region.len() < need {
                return Err(MemError::RegionTooSmall {
                    dir,
                    len: region.len(),
                    need,
                });
            }
        }

        Ok(Self { geometry, rx, tx })
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> &RingGeometry {
        &self.geometry
    }

    #[inline]
    fn region(&self, dir: Direction) -> &Mmap {
        match dir {
            Direction::Rx => &self.rx,
            Direction::Tx => &self.tx,
        }
    }

    /// Start of `channel`'s plane inside ring slot `slot`.
    #[must_use]
    pub fn plane(&self, dir: Direction, slot: usize, channel: usize) -> Option<NonNull<Cs16>> {
        if slot >= self.geometry.depth || channel >= self.geometry.planes {
            return None;
        }

        let offset = slot * self.geometry.slot_size + channel * self.geometry.plane_size();
        Some(unsafe { self.region(dir).as_ptr().add(offset).cast() })
    }

    /// # Safety
    ///
    /// No mutable view of the same plane may be alive.
    #[inline]
    pub(crate) unsafe fn samples(&self, dir: Direction, slot: usize, channel: usize) -> Option<&[Cs16]> {
        self.plane(dir, slot, channel)
            .map(|ptr| unsafe { slice::from_raw_parts(ptr.as_ptr(), self.geometry.samples_per_slot()) })
    }

    /// # Safety
    ///
    /// No other view of the same plane may be alive.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub(crate) unsafe fn samples_mut(
        &self,
        dir: Direction,
        slot: usize,
        channel: usize,
    ) -> Option<&mut [Cs16]> {
        self.plane(dir, slot, channel).map(|ptr| unsafe {
            slice::from_raw_parts_mut(ptr.as_ptr(), self.geometry.samples_per_slot())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(depth: usize, slot_size: usize, planes: usize) -> DmaMapping {
        let geometry = RingGeometry::new(depth, slot_size, planes).unwrap();
        DmaMapping::new(
            geometry,
            Mmap::anonymous(geometry.region_len()).unwrap(),
            Mmap::anonymous(geometry.region_len()).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn geometry_rejects_degenerate_shapes() {
        assert!(RingGeometry::new(0, 1024, 1).is_err());
        assert!(RingGeometry::new(4, 1024, 0).is_err());
        assert!(RingGeometry::new(4, 1022, 1).is_err());
        assert!(RingGeometry::new(4, 1028, 2).is_err());
    }

    #[test]
    fn geometry_derives_plane_layout() {
        let geometry = RingGeometry::new(8, 8192, 2).unwrap();
        assert_eq!(geometry.plane_size(), 4096);
        assert_eq!(geometry.samples_per_slot(), 1024);
        assert_eq!(geometry.region_len(), 65536);
    }

    #[test]
    fn planes_are_disjoint_and_in_bounds() {
        let map = mapping(4, 2048, 2);
        let base = map.plane(Direction::Rx, 0, 0).unwrap().as_ptr() as usize;

        assert_eq!(map.plane(Direction::Rx, 0, 1).unwrap().as_ptr() as usize - base, 1024);
        assert_eq!(map.plane(Direction::Rx, 3, 1).unwrap().as_ptr() as usize - base, 3 * 2048 + 1024);
        assert!(map.plane(Direction::Rx, 4, 0).is_none());
        assert!(map.plane(Direction::Rx, 0, 2).is_none());

        let tx = map.plane(Direction::Tx, 0, 0).unwrap().as_ptr() as usize;
        assert!(tx >= base + map.geometry().region_len() || tx + map.geometry().region_len() <= base);
    }

    #[test]
    fn region_smaller_than_ring_is_rejected() {
        let geometry = RingGeometry::new(4, 4096, 1).unwrap();
        let err = DmaMapping::new(
            geometry,
            Mmap::anonymous(4096).unwrap(),
            Mmap::anonymous(geometry.region_len()).unwrap(),
        )
        .unwrap_err();

        assert!(matches!(err, MemError::RegionTooSmall { dir: Direction::Rx, .. }));
    }
}
