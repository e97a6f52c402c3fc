//! Exported state and command channel names.
//!
//! Channel names follow `<prefix>/<component>`:
//!
//! | Group | Prefix | Components |
//! |-------|--------|------------|
//! | joint state | `<joint>` | `position`, `velocity`, `effort` |
//! | flange F/T sensor | `force_torque_sensor` | `force.{x,y,z}`, `torque.{x,y,z}` |
//! | external wrench (base) | `external_wrench_in_base` | as above |
//! | external wrench (TCP) | `external_wrench_in_tcp` | as above |
//! | TCP pose | `tcp_pose` | `position.{x,y,z}`, `orientation.{x,y,z,w}` |
//!
//! Names are resolved once into `StateChannel` / `CommandChannel` handles
//! when the table is built; the hot path only ever indexes.

use crate::consts::{COMMAND_CHANNEL_COUNT, N_JOINTS, STATE_CHANNEL_COUNT};
use crate::hal::error::HalError;
use crate::hal::types::{InterfaceKind, StateSnapshot};
use std::collections::{HashMap, HashSet};

/// Wrench component suffixes, in `[fx, fy, fz, tx, ty, tz]` order.
pub const WRENCH_COMPONENT_NAMES: [&str; 6] = [
    "force.x", "force.y", "force.z", "torque.x", "torque.y", "torque.z",
];

/// Pose component suffixes, in `[x, y, z, qx, qy, qz, qw]` order.
pub const POSE_COMPONENT_NAMES: [&str; 7] = [
    "position.x",
    "position.y",
    "position.z",
    "orientation.x",
    "orientation.y",
    "orientation.z",
    "orientation.w",
];

/// Prefix of the raw flange force-torque sensor channels.
pub const FT_SENSOR_PREFIX: &str = "force_torque_sensor";
/// Prefix of the external wrench (base frame) channels.
pub const EXT_WRENCH_IN_BASE_PREFIX: &str = "external_wrench_in_base";
/// Prefix of the external wrench (TCP frame) channels.
pub const EXT_WRENCH_IN_TCP_PREFIX: &str = "external_wrench_in_tcp";
/// Prefix of the TCP pose channels.
pub const TCP_POSE_PREFIX: &str = "tcp_pose";

/// Build a channel name from its prefix and component.
pub fn channel_name(prefix: &str, component: &str) -> String {
    format!("{prefix}/{component}")
}

/// The six channel names of a named force-torque sensor component.
pub fn sensor_channel_names(sensor_name: &str) -> [String; 6] {
    WRENCH_COMPONENT_NAMES.map(|c| channel_name(sensor_name, c))
}

/// Resolved handle to one read-only state channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChannel {
    /// Per-joint measurement.
    Joint {
        /// Joint index (0..7).
        joint: usize,
        /// Measured quantity.
        kind: InterfaceKind,
    },
    /// Raw flange F/T component (0..6).
    FtSensorRaw(usize),
    /// External wrench in base frame component (0..6).
    ExtWrenchInBase(usize),
    /// External wrench in TCP frame component (0..6).
    ExtWrenchInTcp(usize),
    /// TCP pose component (0..7).
    TcpPose(usize),
}

impl StateChannel {
    /// Read this channel from a snapshot.
    #[inline]
    pub fn read(self, snapshot: &StateSnapshot) -> f64 {
        match self {
            StateChannel::Joint { joint, kind } => snapshot.joint_values(kind)[joint],
            StateChannel::FtSensorRaw(i) => snapshot.ft_sensor_raw.component(i),
            StateChannel::ExtWrenchInBase(i) => snapshot.ext_wrench_in_base.component(i),
            StateChannel::ExtWrenchInTcp(i) => snapshot.ext_wrench_in_tcp.component(i),
            StateChannel::TcpPose(i) => snapshot.tcp_pose.component(i),
        }
    }
}

/// Resolved handle to one writable command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandChannel {
    /// Joint index (0..7).
    pub joint: usize,
    /// Commanded quantity.
    pub kind: InterfaceKind,
}

/// Ordered channel names plus name → handle lookup, built once at configure.
#[derive(Debug, Clone)]
pub struct InterfaceTable {
    joints: Vec<String>,
    state_names: Vec<String>,
    state_index: HashMap<String, StateChannel>,
    command_names: Vec<String>,
    command_index: HashMap<String, CommandChannel>,
}

impl InterfaceTable {
    /// Build the table for the given joint names.
    ///
    /// # Errors
    /// `HalError::ConfigurationError` if the joint count is not `N_JOINTS`,
    /// or a joint name is empty, contains `/`, or is duplicated.
    pub fn new(joints: &[String]) -> Result<Self, HalError> {
        if joints.len() != N_JOINTS {
            return Err(HalError::ConfigurationError(format!(
                "expected {} joints, got {}",
                N_JOINTS,
                joints.len()
            )));
        }

        let mut seen = HashSet::with_capacity(N_JOINTS);
        for name in joints {
            if name.trim().is_empty() {
                return Err(HalError::ConfigurationError(
                    "joint name cannot be empty".to_string(),
                ));
            }
            if name.contains('/') {
                return Err(HalError::ConfigurationError(format!(
                    "joint name '{name}' must not contain '/'"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(HalError::ConfigurationError(format!(
                    "duplicate joint name: {name}"
                )));
            }
        }

        let mut state_names = Vec::with_capacity(STATE_CHANNEL_COUNT);
        let mut state_index = HashMap::with_capacity(STATE_CHANNEL_COUNT);
        let mut command_names = Vec::with_capacity(COMMAND_CHANNEL_COUNT);
        let mut command_index = HashMap::with_capacity(COMMAND_CHANNEL_COUNT);

        for (joint, joint_name) in joints.iter().enumerate() {
            for kind in InterfaceKind::ALL {
                let name = channel_name(joint_name, kind.as_str());
                state_index.insert(name.clone(), StateChannel::Joint { joint, kind });
                command_index.insert(name.clone(), CommandChannel { joint, kind });
                state_names.push(name.clone());
                command_names.push(name);
            }
        }

        let wrench_groups: [(&str, fn(usize) -> StateChannel); 3] = [
            (FT_SENSOR_PREFIX, StateChannel::FtSensorRaw),
            (EXT_WRENCH_IN_BASE_PREFIX, StateChannel::ExtWrenchInBase),
            (EXT_WRENCH_IN_TCP_PREFIX, StateChannel::ExtWrenchInTcp),
        ];
        for (prefix, make) in wrench_groups {
            for (i, component) in WRENCH_COMPONENT_NAMES.iter().enumerate() {
                let name = channel_name(prefix, component);
                state_index.insert(name.clone(), make(i));
                state_names.push(name);
            }
        }
        for (i, component) in POSE_COMPONENT_NAMES.iter().enumerate() {
            let name = channel_name(TCP_POSE_PREFIX, component);
            state_index.insert(name.clone(), StateChannel::TcpPose(i));
            state_names.push(name);
        }

        debug_assert_eq!(state_names.len(), STATE_CHANNEL_COUNT);
        debug_assert_eq!(command_names.len(), COMMAND_CHANNEL_COUNT);

        Ok(Self {
            joints: joints.to_vec(),
            state_names,
            state_index,
            command_names,
            command_index,
        })
    }

    /// Configured joint names, in joint-index order.
    pub fn joint_names(&self) -> &[String] {
        &self.joints
    }

    /// All read-only state channel names, in export order.
    pub fn state_names(&self) -> &[String] {
        &self.state_names
    }

    /// All writable command channel names, in export order.
    pub fn command_names(&self) -> &[String] {
        &self.command_names
    }

    /// Resolve a state channel by name.
    pub fn state_channel(&self, name: &str) -> Option<StateChannel> {
        self.state_index.get(name).copied()
    }

    /// Resolve a command channel by name.
    pub fn command_channel(&self, name: &str) -> Option<CommandChannel> {
        self.command_index.get(name).copied()
    }

    /// Command channel names owned by one mode (one per joint).
    pub fn mode_channel_names(&self, kind: InterfaceKind) -> Vec<String> {
        self.joints
            .iter()
            .map(|j| channel_name(j, kind.as_str()))
            .collect()
    }
}
