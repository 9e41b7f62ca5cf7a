use crate::Direction;

use super::error::{StreamError, StreamResult};

/// `Closed -> Opened -> Active -> Opened -> Closed`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Closed,
    Opened,
    Active,
}

impl StreamState {
    #[inline]
    #[must_use]
    pub fn is_opened(self) -> bool {
        self != StreamState::Closed
    }

    #[inline]
    pub(crate) fn ensure_active(self, dir: Direction) -> StreamResult<()> {
        match self {
            StreamState::Active => Ok(()),
            _ => Err(StreamError::NotActive(dir)),
        }
    }

    /// Opened but not active: the only state activate and close accept.
    #[inline]
    pub(crate) fn ensure_idle(self, dir: Direction) -> StreamResult<()> {
        match self {
            StreamState::Opened => Ok(()),
            StreamState::Active => Err(StreamError::StillActive(dir)),
            StreamState::Closed => Err(StreamError::NotOpen(dir)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_passes_data_path_check() {
        assert!(StreamState::Active.ensure_active(Direction::Rx).is_ok());
        assert!(matches!(
            StreamState::Opened.ensure_active(Direction::Rx),
            Err(StreamError::NotActive(Direction::Rx))
        ));
        assert!(StreamState::Closed.ensure_active(Direction::Tx).is_err());
    }

    #[test]
    fn idle_check_names_the_state() {
        assert!(StreamState::Opened.ensure_idle(Direction::Tx).is_ok());
        assert!(matches!(
            StreamState::Active.ensure_idle(Direction::Tx),
            Err(StreamError::StillActive(Direction::Tx))
        ));
        assert!(matches!(
            StreamState::Closed.ensure_idle(Direction::Tx),
            Err(StreamError::NotOpen(Direction::Tx))
        ));
    }
}
