//! # Manipulator HAL Library
//!
//! Real-time hardware abstraction layer for a 7-joint manipulator, plus a
//! broadcaster that republishes the estimated external TCP wrench without
//! disturbing the control tick.
//!
//! # Module Structure
//!
//! - [`buffers`] - Joint state and command storage
//! - [`arbiter`] - Exclusive control-mode validation and commit
//! - [`cycle`] - `HardwareCycle` lifecycle and read/write tick
//! - [`handoff`] - Cross-thread stop and mode-switch handles
//! - [`runner`] - Fixed-period control loop with timing statistics
//! - [`broadcaster`] - Non-blocking realtime publisher and wrench broadcaster
//! - [`link_registry`] - Robot link factory registration
//! - [`links`] - Robot link implementations
//! - [`rt`] - Real-time process setup helpers
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         manip_hal                                 │
//! │  ┌──────────────┐   ┌───────────────────┐   ┌──────────────────┐  │
//! │  │ ControlLoop  │──►│  HardwareCycle    │──►│  RobotLink       │  │
//! │  │ (RT thread)  │   │  arbiter/buffers  │   │  (trait object)  │  │
//! │  └──────┬───────┘   └───────────────────┘   └──────────────────┘  │
//! │         │ try_lock                                                │
//! │         ▼                                                         │
//! │  ┌──────────────────┐   lock    ┌───────────────┐                 │
//! │  │ RealtimePublisher│◄──────────│ consumer thr. │──► MessageSink  │
//! │  └──────────────────┘           └───────────────┘                 │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod arbiter;
pub mod broadcaster;
pub mod buffers;
pub mod cycle;
pub mod handoff;
pub mod link_registry;
pub mod links;
pub mod rt;
pub mod runner;

// Re-export key types for convenience
pub use crate::arbiter::{ControlModeArbiter, ModeSwitchRequest};
pub use crate::broadcaster::{ExternalTcpWrenchBroadcaster, RealtimePublisher, WrenchStamped};
pub use crate::cycle::{CycleOptions, HardwareCycle, LifecycleState};
pub use crate::handoff::{ModeSwitchHandle, PendingSwitch, StopHandle};
pub use crate::link_registry::LinkRegistry;
pub use crate::runner::{CommandHook, ControlLoop, TickOutcome, TimingStats};
