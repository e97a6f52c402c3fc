//! Cross-thread handles into the control thread.
//!
//! The control thread never takes a blocking lock. Other threads talk to it
//! through:
//! - `StopHandle` - an atomic flag observed at the next tick boundary
//! - `ModeSwitchHandle` - validates on the caller's thread, then parks the
//!   target in a single-slot mailbox the control thread drains with `try_lock`
//!
//! A parked target carries the mode it was validated against. The control
//! thread commits it only if that mode is still active.

use crate::arbiter::{ModeSwitchRequest, validate_switch};
use manip_common::hal::error::RejectReason;
use manip_common::hal::interfaces::InterfaceTable;
use manip_common::hal::types::ControlMode;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tracing::debug;

/// Requests a deactivate from outside the control thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// New handle, not requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the control thread to deactivate at the next tick boundary.
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// True once a stop was requested and not yet cleared.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Reset after the request has been honoured or on reconfigure.
    pub fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// A validated transition waiting for the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSwitch {
    /// Active mode the request was validated against.
    pub from: ControlMode,
    /// Mode to commit.
    pub target: ControlMode,
}

/// Single-slot mailbox for a validated transition.
///
/// Latest post wins; there is never more than one pending transition.
#[derive(Debug, Clone, Default)]
pub struct ModeMailbox {
    slot: Arc<Mutex<Option<PendingSwitch>>>,
}

impl ModeMailbox {
    /// Empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a transition, replacing any pending one. Non-RT side; may block briefly.
    pub fn post(&self, from: ControlMode, target: ControlMode) {
        *self.slot.lock() = Some(PendingSwitch { from, target });
    }

    /// Take the pending transition without blocking.
    ///
    /// Returns `None` when the slot is empty or momentarily held by a poster;
    /// in the latter case the transition is picked up on the next tick.
    #[inline]
    pub fn try_take(&self) -> Option<PendingSwitch> {
        self.slot.try_lock().and_then(|mut slot| slot.take())
    }

    /// Drop any pending target.
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

/// Submits mode switches from a non-RT thread.
#[derive(Debug, Clone)]
pub struct ModeSwitchHandle {
    table: Arc<InterfaceTable>,
    active: Arc<AtomicU8>,
    mailbox: ModeMailbox,
}

impl ModeSwitchHandle {
    /// Build from the arbiter's table, its published mode and the cycle mailbox.
    pub fn new(table: Arc<InterfaceTable>, active: Arc<AtomicU8>, mailbox: ModeMailbox) -> Self {
        Self {
            table,
            active,
            mailbox,
        }
    }

    /// Mode most recently committed by the control thread.
    pub fn active_mode(&self) -> ControlMode {
        ControlMode::from_u8(self.active.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Validate synchronously and, if accepted, hand the target to the
    /// control thread for commit before its next tick.
    pub fn request(&self, request: &ModeSwitchRequest) -> Result<ControlMode, RejectReason> {
        let current = self.active_mode();
        let target = validate_switch(&self.table, request, current)?;
        if target != current {
            self.mailbox.post(current, target);
            debug!("Mode switch {} -> {} posted", current, target);
        }
        Ok(target)
    }
}
