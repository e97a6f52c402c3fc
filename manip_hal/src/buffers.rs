//! Joint state and command buffers.
//!
//! Both buffers are fixed-size and allocated once; every hot-path operation
//! is a copy into pre-existing storage.

use manip_common::hal::config::CommandInitPolicy;
use manip_common::hal::interfaces::CommandChannel;
use manip_common::hal::types::{
    CommandSet, ControlMode, InterfaceKind, JointArray, StateSnapshot,
};
use manip_common::consts::N_JOINTS;
use std::time::Instant;

/// Last successfully read state.
///
/// A failed read never touches this buffer (last-known-good).
#[derive(Debug, Clone, Default)]
pub struct JointStateBuffer {
    snapshot: StateSnapshot,
    updated_at: Option<Instant>,
    sequence: u64,
}

impl JointStateBuffer {
    /// Empty buffer; the snapshot is all zeros until the first store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite with a freshly read snapshot.
    #[inline]
    pub fn store(&mut self, snapshot: StateSnapshot, at: Instant) {
        self.snapshot = snapshot;
        self.updated_at = Some(at);
        self.sequence = self.sequence.wrapping_add(1);
    }

    /// Current snapshot.
    #[inline]
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    /// Number of successful stores since construction or `clear`.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time of the last successful store.
    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    /// True once at least one snapshot has been stored.
    pub fn is_valid(&self) -> bool {
        self.updated_at.is_some()
    }

    /// Forget everything (used on reconfigure).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Pending command values, one array per interface kind.
///
/// Only the array of the active mode is ever read by `write`; the others
/// keep whatever stale values they held.
#[derive(Debug, Clone, Default)]
pub struct JointCommandBuffer {
    values: [JointArray; 3],
}

impl JointCommandBuffer {
    /// All slots zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values of one interface kind.
    #[inline]
    pub fn values(&self, kind: InterfaceKind) -> &JointArray {
        &self.values[kind.index()]
    }

    /// Mutable values of one interface kind.
    #[inline]
    pub fn values_mut(&mut self, kind: InterfaceKind) -> &mut JointArray {
        &mut self.values[kind.index()]
    }

    /// Read one command channel. Out-of-range joints read as `0.0`.
    #[inline]
    pub fn get(&self, channel: CommandChannel) -> f64 {
        self.values[channel.kind.index()]
            .get(channel.joint)
            .copied()
            .unwrap_or(0.0)
    }

    /// Write one command channel.
    #[inline]
    pub fn set(&mut self, channel: CommandChannel, value: f64) {
        if channel.joint < N_JOINTS {
            self.values[channel.kind.index()][channel.joint] = value;
        }
    }

    /// Initialise the slots of `kind` for a freshly committed mode.
    pub fn reset_for(&mut self, kind: InterfaceKind, policy: CommandInitPolicy, state: &StateSnapshot) {
        let seed = match policy {
            CommandInitPolicy::HoldState => *state.joint_values(kind),
            CommandInitPolicy::Zero => [0.0; N_JOINTS],
        };
        self.values[kind.index()] = seed;
    }

    /// Command to send for `mode`, or `None` when no mode is active.
    #[inline]
    pub fn command_for(&self, mode: ControlMode) -> Option<CommandSet> {
        mode.interface_kind().map(|kind| CommandSet {
            mode,
            values: self.values[kind.index()],
        })
    }

    /// Zero every slot of every kind.
    pub fn clear(&mut self) {
        self.values = [[0.0; N_JOINTS]; 3];
    }
}
