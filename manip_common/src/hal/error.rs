//! HAL error taxonomy.
//!
//! - `HalError` - everything the hardware cycle can surface to its caller
//! - `LinkError` - transport/protocol failures reported by a `RobotLink`
//! - `RejectReason` - why a mode-switch request was refused

use crate::hal::types::InterfaceKind;
use thiserror::Error;

/// Failure reported by a robot link session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Session could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Transport lost or timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// Robot answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation attempted without an established session.
    #[error("link not connected")]
    NotConnected,
}

/// Reason a mode-switch request was rejected.
///
/// A rejected request leaves the active mode untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// Start set spans more than one mode, or would leave two modes active.
    #[error("requested interfaces span more than one control mode")]
    ConflictingModes,

    /// Stop set is not exactly the channel set owned by the active mode.
    #[error("stop interfaces do not match the active control mode")]
    StopMismatch,

    /// Interface name not exported by this hardware.
    #[error("unknown command interface '{0}'")]
    UnknownInterface(String),

    /// Start set claims only some of the joints of a mode.
    #[error("{0} interfaces must be claimed for every joint")]
    IncompleteModeSet(InterfaceKind),
}

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Bad or missing parameter, joint-count mismatch, conflicting sensor source.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// `activate` called out of order or initial state fetch failed.
    #[error("Activation error: {0}")]
    ActivationError(String),

    /// Robot link transport/protocol failure during `read`/`write`.
    #[error("Link fault: {0}")]
    LinkFault(#[from] LinkError),

    /// Operation not permitted in the current lifecycle state.
    #[error("{operation} not allowed in state {state}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// Lifecycle state at the time.
        state: &'static str,
    },

    /// Mode-switch request refused by the arbiter.
    #[error("Mode switch rejected: {0}")]
    ModeSwitchRejected(#[from] RejectReason),

    /// A command value was not finite; nothing was sent.
    #[error("Refusing to send non-finite command for joint {joint}")]
    InvalidCommand {
        /// Joint index of the first offending value.
        joint: usize,
    },

    /// Control loop missed too many deadlines in a row.
    #[error("Deadline overrun: {consecutive} consecutive cycles exceeded the period")]
    DeadlineOverrun {
        /// Consecutive overruns observed.
        consecutive: u32,
    },

    /// No link factory registered under that name.
    #[error("Robot link not found: {0}")]
    LinkNotFound(String),
}

impl HalError {
    /// True for faults originating in the robot link.
    pub const fn is_link_fault(&self) -> bool {
        matches!(self, HalError::LinkFault(_))
    }
}
