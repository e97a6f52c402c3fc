//! Control-mode arbitration.
//!
//! The manipulator accepts exactly one class of command at a time. A mode
//! switch is requested as a pair of interface-name sets (`start`, `stop`)
//! and must map onto exactly one target mode:
//!
//! | start | stop | result |
//! |-------|------|--------|
//! | empty | empty | no-op, current mode |
//! | empty | = active set | `None` (pure stop) |
//! | mode M (all joints) | empty, active ∈ {None, M} | M |
//! | mode M (all joints) | = active set | M |
//! | mode M | empty, active ∉ {None, M} | `ConflictingModes` |
//! | spans > 1 mode | any | `ConflictingModes` |
//! | any | ≠ active set | `StopMismatch` |
//!
//! `validate` never mutates anything; `commit` is the only place the active
//! mode and the command buffer change, and must run between ticks.

use crate::buffers::JointCommandBuffer;
use manip_common::hal::config::CommandInitPolicy;
use manip_common::hal::error::RejectReason;
use manip_common::hal::interfaces::InterfaceTable;
use manip_common::hal::types::{ControlMode, InterfaceKind, JointMask, StateSnapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, info};

/// Requested start/stop interface sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeSwitchRequest {
    /// Command interfaces to claim.
    pub start: Vec<String>,
    /// Command interfaces to release.
    pub stop: Vec<String>,
}

impl ModeSwitchRequest {
    /// Request from explicit name lists.
    pub fn new<S: Into<String>>(
        start: impl IntoIterator<Item = S>,
        stop: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            start: start.into_iter().map(Into::into).collect(),
            stop: stop.into_iter().map(Into::into).collect(),
        }
    }

    /// Claim every joint interface of `kind`, releasing nothing.
    pub fn start(table: &InterfaceTable, kind: InterfaceKind) -> Self {
        Self {
            start: table.mode_channel_names(kind),
            stop: Vec::new(),
        }
    }

    /// Switch from `from` to `to`. `None` on either side means an empty set.
    pub fn switch(table: &InterfaceTable, from: ControlMode, to: ControlMode) -> Self {
        let names = |mode: ControlMode| {
            mode.interface_kind()
                .map(|k| table.mode_channel_names(k))
                .unwrap_or_default()
        };
        Self {
            start: names(to),
            stop: names(from),
        }
    }

    /// True if both sets are empty.
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.stop.is_empty()
    }
}

/// Joints named per interface kind.
type KindMasks = [JointMask; 3];

fn classify(table: &InterfaceTable, names: &[String]) -> Result<KindMasks, RejectReason> {
    let mut masks = [JointMask::empty(); 3];
    for name in names {
        let channel = table
            .command_channel(name)
            .ok_or_else(|| RejectReason::UnknownInterface(name.clone()))?;
        masks[channel.kind.index()] |= JointMask::joint(channel.joint);
    }
    Ok(masks)
}

/// The single kind named in `masks`, if any.
fn single_kind(masks: &KindMasks) -> Result<Option<(InterfaceKind, JointMask)>, RejectReason> {
    let mut found = None;
    for kind in InterfaceKind::ALL {
        let mask = masks[kind.index()];
        if mask.is_empty() {
            continue;
        }
        if found.is_some() {
            return Err(RejectReason::ConflictingModes);
        }
        found = Some((kind, mask));
    }
    Ok(found)
}

/// Decide whether `request` is a legal transition out of `current`.
///
/// Pure function: shared by the arbiter and by cross-thread handles.
pub fn validate_switch(
    table: &InterfaceTable,
    request: &ModeSwitchRequest,
    current: ControlMode,
) -> Result<ControlMode, RejectReason> {
    let start = single_kind(&classify(table, &request.start)?)?;
    let stop_masks = classify(table, &request.stop)?;

    let releases_current = if request.stop.is_empty() {
        false
    } else {
        let stop = single_kind(&stop_masks).map_err(|_| RejectReason::StopMismatch)?;
        match (stop, current.interface_kind()) {
            (Some((kind, mask)), Some(active)) if kind == active && mask == JointMask::all() => true,
            _ => return Err(RejectReason::StopMismatch),
        }
    };

    let Some((kind, mask)) = start else {
        return Ok(if releases_current {
            ControlMode::None
        } else {
            current
        });
    };

    if mask != JointMask::all() {
        return Err(RejectReason::IncompleteModeSet(kind));
    }

    let target = ControlMode::from(kind);
    if target == current || current == ControlMode::None || releases_current {
        Ok(target)
    } else {
        Err(RejectReason::ConflictingModes)
    }
}

/// Holds the active control mode and applies validated transitions.
#[derive(Debug)]
pub struct ControlModeArbiter {
    table: Arc<InterfaceTable>,
    active: ControlMode,
    policy: CommandInitPolicy,
    /// Mirror of `active` readable from other threads.
    published: Arc<AtomicU8>,
}

impl ControlModeArbiter {
    /// New arbiter with no active mode.
    pub fn new(table: Arc<InterfaceTable>, policy: CommandInitPolicy) -> Self {
        Self {
            table,
            active: ControlMode::None,
            policy,
            published: Arc::new(AtomicU8::new(ControlMode::None as u8)),
        }
    }

    /// Currently active mode.
    #[inline]
    pub fn active(&self) -> ControlMode {
        self.active
    }

    /// Interface table the arbiter resolves names against.
    pub fn table(&self) -> &Arc<InterfaceTable> {
        &self.table
    }

    /// Shared view of the active mode for cross-thread validation.
    pub fn published_mode(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.published)
    }

    /// Validate `request` against the active mode. Never mutates.
    pub fn validate(&self, request: &ModeSwitchRequest) -> Result<ControlMode, RejectReason> {
        let result = validate_switch(&self.table, request, self.active);
        match &result {
            Ok(target) => debug!("Mode switch {} -> {} validated", self.active, target),
            Err(reason) => info!("Mode switch rejected in mode {}: {}", self.active, reason),
        }
        result
    }

    /// Make `target` the active mode.
    ///
    /// Re-committing the active mode is a no-op. Otherwise the command slots
    /// of the new mode are initialised per policy; other modes' slots are
    /// left as they are. Must not run concurrently with `write`.
    pub fn commit(&mut self, target: ControlMode, commands: &mut JointCommandBuffer, state: &StateSnapshot) {
        if target == self.active {
            return;
        }
        if let Some(kind) = target.interface_kind() {
            commands.reset_for(kind, self.policy, state);
        }
        info!("Control mode {} -> {}", self.active, target);
        self.set_active(target);
    }

    /// Drop to `ControlMode::None` without touching any buffer (fault/stop).
    pub fn release(&mut self) {
        if self.active != ControlMode::None {
            info!("Control mode {} released", self.active);
        }
        self.set_active(ControlMode::None);
    }

    fn set_active(&mut self, mode: ControlMode) {
        self.active = mode;
        self.published.store(mode as u8, Ordering::Release);
    }
}
