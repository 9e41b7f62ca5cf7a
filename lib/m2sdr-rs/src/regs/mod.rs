//! Serialization of control-plane register traffic.
//!
//! Configuration calls and stream activation share one register file with the
//! DMA control logic. Every [`ControlPlane`](crate::ControlPlane) method takes a
//! [`RegisterGuard`], which can only be obtained from [`Registers::lock`], so
//! control-plane access without the lock does not type-check. The data path
//! (acquire, release, remainder copies) has no use for a guard and never takes
//! the lock.

use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::control::ControlState;

#[derive(Debug, Default)]
pub struct Registers {
    state: Mutex<ControlState>,
}

impl Registers {
    #[must_use]
    pub fn new(state: ControlState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Blocks until the register file is free.
    #[inline]
    pub fn lock(&self) -> RegisterGuard<'_> {
        RegisterGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Proof that the caller holds the register lock, plus the cached control state it protects.
pub struct RegisterGuard<'a> {
    state: MutexGuard<'a, ControlState>,
}

impl fmt::Debug for RegisterGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegisterGuard").field(&*self.state).finish()
    }
}

impl Deref for RegisterGuard<'_> {
    type Target = ControlState;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl DerefMut for RegisterGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}
