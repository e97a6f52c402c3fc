//! System-wide constants for the manipulator HAL workspace.
//!
//! Single source of truth for joint counts, channel counts and defaults.

use static_assertions::const_assert_eq;

/// Number of joints on the manipulator. Fixed at construction, never resized.
pub const N_JOINTS: usize = 7;

/// Components of a wrench (force xyz + torque xyz).
pub const WRENCH_COMPONENTS: usize = 6;

/// Components of a pose (position xyz + quaternion xyzw).
pub const POSE_COMPONENTS: usize = 7;

/// Exported state channels: 7×{position, velocity, effort}, three wrenches, TCP pose.
pub const STATE_CHANNEL_COUNT: usize = N_JOINTS * 3 + WRENCH_COMPONENTS * 3 + POSE_COMPONENTS;

/// Exported command channels: 7×{position, velocity, effort}.
pub const COMMAND_CHANNEL_COUNT: usize = N_JOINTS * 3;

const_assert_eq!(STATE_CHANNEL_COUNT, 46);
const_assert_eq!(COMMAND_CHANNEL_COUNT, 21);

/// Default control cycle time in microseconds (1 kHz).
pub const DEFAULT_CYCLE_TIME_US: u32 = 1000;

/// Consecutive link faults on `read`/`write` before the cycle escalates to `Faulted`.
pub const DEFAULT_FAULT_THRESHOLD: u32 = 3;

/// Consecutive deadline overruns tolerated by the control loop.
pub const DEFAULT_OVERRUN_LIMIT: u32 = 10;

/// Maximum length of a published frame identifier.
pub const MAX_FRAME_ID_LEN: usize = 64;

/// Canonical HAL service name (used for logging).
pub const HAL_SERVICE_NAME: &str = "manip_hal";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/manip/hal.toml";

/// Name of the built-in simulated robot link.
pub const SIMULATION_LINK: &str = "simulation";
