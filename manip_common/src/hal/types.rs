//! Joint state and command types.
//!
//! This module defines the data passed between the HAL and the robot link:
//! - `StateSnapshot` - per-cycle record of joint and derived sensor state
//! - `CommandSet` - per-joint command values tagged with a control mode
//! - `ControlMode` / `InterfaceKind` - exclusive command classes
//! - `Wrench` / `Pose` - derived Cartesian quantities
//! - `JointMask` - one bit per joint, used for interface-set bookkeeping

use crate::consts::{N_JOINTS, POSE_COMPONENTS, WRENCH_COMPONENTS};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-size per-joint value array.
pub type JointArray = [f64; N_JOINTS];

/// Class of command a joint interface accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// Joint position [rad].
    Position,
    /// Joint velocity [rad/s].
    Velocity,
    /// Joint torque [Nm].
    Effort,
}

impl InterfaceKind {
    /// All kinds, in export order.
    pub const ALL: [InterfaceKind; 3] = [
        InterfaceKind::Position,
        InterfaceKind::Velocity,
        InterfaceKind::Effort,
    ];

    /// Interface type suffix used in channel names.
    pub const fn as_str(self) -> &'static str {
        match self {
            InterfaceKind::Position => "position",
            InterfaceKind::Velocity => "velocity",
            InterfaceKind::Effort => "effort",
        }
    }

    /// Parse an interface type suffix.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "position" => Some(InterfaceKind::Position),
            "velocity" => Some(InterfaceKind::Velocity),
            "effort" => Some(InterfaceKind::Effort),
            _ => None,
        }
    }

    /// Dense index (0..3) for per-kind tables.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            InterfaceKind::Position => 0,
            InterfaceKind::Velocity => 1,
            InterfaceKind::Effort => 2,
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Active control mode of the manipulator.
///
/// Exactly one mode is active at any time; `None` during startup or fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ControlMode {
    /// No command interface claimed. `write` sends nothing.
    #[default]
    None = 0,
    /// Joint position streaming.
    Position = 1,
    /// Joint velocity streaming.
    Velocity = 2,
    /// Joint torque streaming.
    Effort = 3,
}

impl ControlMode {
    /// Convert from raw `u8` value. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ControlMode::None),
            1 => Some(ControlMode::Position),
            2 => Some(ControlMode::Velocity),
            3 => Some(ControlMode::Effort),
            _ => None,
        }
    }

    /// Command interface kind owned by this mode.
    #[inline]
    pub const fn interface_kind(self) -> Option<InterfaceKind> {
        match self {
            ControlMode::None => None,
            ControlMode::Position => Some(InterfaceKind::Position),
            ControlMode::Velocity => Some(InterfaceKind::Velocity),
            ControlMode::Effort => Some(InterfaceKind::Effort),
        }
    }
}

impl From<InterfaceKind> for ControlMode {
    fn from(kind: InterfaceKind) -> Self {
        match kind {
            InterfaceKind::Position => ControlMode::Position,
            InterfaceKind::Velocity => ControlMode::Velocity,
            InterfaceKind::Effort => ControlMode::Effort,
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interface_kind() {
            Some(kind) => f.write_str(kind.as_str()),
            None => f.write_str("none"),
        }
    }
}

bitflags! {
    /// Set of joints, one bit per joint index.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JointMask: u8 {
        /// Joint index 0.
        const J1 = 1 << 0;
        /// Joint index 1.
        const J2 = 1 << 1;
        /// Joint index 2.
        const J3 = 1 << 2;
        /// Joint index 3.
        const J4 = 1 << 3;
        /// Joint index 4.
        const J5 = 1 << 4;
        /// Joint index 5.
        const J6 = 1 << 5;
        /// Joint index 6.
        const J7 = 1 << 6;
    }
}

impl JointMask {
    /// Mask with only joint `index` set. Out-of-range indices yield an empty mask.
    #[inline]
    pub const fn joint(index: usize) -> Self {
        if index < N_JOINTS {
            Self::from_bits_truncate(1u8 << index)
        } else {
            Self::empty()
        }
    }
}

/// Force/torque pair, force xyz [N] + torque xyz [Nm].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Wrench {
    /// Force [N].
    pub force: [f64; 3],
    /// Torque [Nm].
    pub torque: [f64; 3],
}

impl Wrench {
    /// All components zero.
    pub const ZERO: Wrench = Wrench {
        force: [0.0; 3],
        torque: [0.0; 3],
    };

    /// Build from `[fx, fy, fz, tx, ty, tz]`.
    pub const fn from_array(v: [f64; WRENCH_COMPONENTS]) -> Self {
        Self {
            force: [v[0], v[1], v[2]],
            torque: [v[3], v[4], v[5]],
        }
    }

    /// Flatten to `[fx, fy, fz, tx, ty, tz]`.
    pub const fn to_array(&self) -> [f64; WRENCH_COMPONENTS] {
        [
            self.force[0],
            self.force[1],
            self.force[2],
            self.torque[0],
            self.torque[1],
            self.torque[2],
        ]
    }

    /// Component by flat index (0..6). Out-of-range reads 0.0.
    #[inline]
    pub fn component(&self, index: usize) -> f64 {
        match index {
            0..=2 => self.force[index],
            3..=5 => self.torque[index - 3],
            _ => 0.0,
        }
    }
}

/// Cartesian pose, position xyz [m] + unit quaternion xyzw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position [m].
    pub position: [f64; 3],
    /// Orientation quaternion `[qx, qy, qz, qw]`.
    pub orientation: [f64; 4],
}

impl Pose {
    /// Origin with identity orientation.
    pub const IDENTITY: Pose = Pose {
        position: [0.0; 3],
        orientation: [0.0, 0.0, 0.0, 1.0],
    };

    /// Component by flat index (0..7): `x, y, z, qx, qy, qz, qw`.
    #[inline]
    pub fn component(&self, index: usize) -> f64 {
        match index {
            0..=2 => self.position[index],
            3..=6 => self.orientation[index - 3],
            _ => 0.0,
        }
    }

    /// Flatten to `[x, y, z, qx, qy, qz, qw]`.
    pub const fn to_array(&self) -> [f64; POSE_COMPONENTS] {
        [
            self.position[0],
            self.position[1],
            self.position[2],
            self.orientation[0],
            self.orientation[1],
            self.orientation[2],
            self.orientation[3],
        ]
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Per-cycle state record produced by the robot link.
///
/// `Copy` on purpose: the cycle stores it by value, no heap involved.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateSnapshot {
    /// Measured joint positions [rad].
    pub positions: JointArray,
    /// Measured joint velocities [rad/s].
    pub velocities: JointArray,
    /// Measured joint torques [Nm].
    pub efforts: JointArray,
    /// Raw flange force-torque sensor reading. Zero if no sensor is installed.
    pub ft_sensor_raw: Wrench,
    /// Estimated external wrench at TCP, expressed in base frame.
    pub ext_wrench_in_base: Wrench,
    /// Estimated external wrench at TCP, expressed in TCP frame.
    pub ext_wrench_in_tcp: Wrench,
    /// Measured TCP pose in base frame.
    pub tcp_pose: Pose,
}

impl StateSnapshot {
    /// Per-joint values of one interface kind.
    #[inline]
    pub fn joint_values(&self, kind: InterfaceKind) -> &JointArray {
        match kind {
            InterfaceKind::Position => &self.positions,
            InterfaceKind::Velocity => &self.velocities,
            InterfaceKind::Effort => &self.efforts,
        }
    }

    /// True if every value in the snapshot is finite.
    pub fn is_finite(&self) -> bool {
        self.positions
            .iter()
            .chain(&self.velocities)
            .chain(&self.efforts)
            .chain(&self.ft_sensor_raw.to_array())
            .chain(&self.ext_wrench_in_base.to_array())
            .chain(&self.ext_wrench_in_tcp.to_array())
            .chain(&self.tcp_pose.to_array())
            .all(|v| v.is_finite())
    }
}

/// Commands for all joints, tagged with the mode they belong to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSet {
    /// Mode the values are meant for. Never `ControlMode::None` when sent.
    pub mode: ControlMode,
    /// Per-joint values in the unit of `mode`.
    pub values: JointArray,
}

impl CommandSet {
    /// Hold-position command at the given joint positions.
    pub const fn hold_position(positions: JointArray) -> Self {
        Self {
            mode: ControlMode::Position,
            values: positions,
        }
    }

    /// Zero-velocity command.
    pub const fn zero_velocity() -> Self {
        Self {
            mode: ControlMode::Velocity,
            values: [0.0; N_JOINTS],
        }
    }

    /// Index of the first non-finite value, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.values.iter().position(|v| !v.is_finite())
    }
}
