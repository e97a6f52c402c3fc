//! Prelude module for common re-exports.
//!
//! `use manip_common::prelude::*;` brings in the data model, the link trait
//! and the configuration types without listing individual paths.

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::{
    AppConfig, BroadcasterConfig, CommandInitPolicy, HardwareConfig, ResolvedBroadcasterConfig,
    WrenchSource,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_CYCLE_TIME_US, N_JOINTS};

// ─── Data Model ─────────────────────────────────────────────────────
pub use crate::hal::interfaces::{CommandChannel, InterfaceTable, StateChannel};
pub use crate::hal::types::{
    CommandSet, ControlMode, InterfaceKind, JointArray, JointMask, Pose, StateSnapshot, Wrench,
};

// ─── Link & Errors ──────────────────────────────────────────────────
pub use crate::hal::error::{HalError, LinkError, RejectReason};
pub use crate::hal::link::{LinkFactory, RobotLink};
