use std::fmt;

use crate::Direction;

/// Identifies one of the two per-direction streams of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamHandle {
    Rx,
    Tx,
}

impl StreamHandle {
    #[inline]
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            StreamHandle::Rx => Direction::Rx,
            StreamHandle::Tx => Direction::Tx,
        }
    }
}

impl From<Direction> for StreamHandle {
    #[inline]
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Rx => StreamHandle::Rx,
            Direction::Tx => StreamHandle::Tx,
        }
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stream", self.direction())
    }
}
