//! Simulated robot link.

use super::joint::{JointParams, JointSimulator};
use manip_common::consts::{N_JOINTS, SIMULATION_LINK, WRENCH_COMPONENTS};
use manip_common::hal::error::{HalError, LinkError};
use manip_common::hal::link::RobotLink;
use manip_common::hal::types::{CommandSet, ControlMode, JointArray, Pose, StateSnapshot, Wrench};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// `[hardware.link_config.simulation]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Integration step per `send_command` [s].
    pub time_step_s: f64,
    /// Position loop gain [1/s].
    pub position_gain: f64,
    /// Velocity time constant [s].
    pub velocity_time_constant: f64,
    /// Velocity clamp [rad/s].
    pub max_velocity: f64,
    /// Link inertia [kg m²].
    pub inertia: f64,
    /// Viscous damping [Nm s/rad].
    pub damping: f64,
    /// Segment length used for the planar TCP estimate [m].
    pub link_length: f64,
    /// TCP height above base [m].
    pub tcp_height: f64,
    /// Joint positions at connect [rad].
    pub initial_positions: JointArray,
    /// Constant external wrench acting on the TCP, TCP frame.
    pub external_wrench: [f64; WRENCH_COMPONENTS],
    /// Report the external wrench on the flange sensor channels too.
    pub has_ft_sensor: bool,
    /// Fail every Nth `get_state`/`send_command` (0 = never).
    pub fault_every: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step_s: 0.001,
            position_gain: 20.0,
            velocity_time_constant: 0.02,
            max_velocity: 2.0,
            inertia: 0.5,
            damping: 2.0,
            link_length: 0.1,
            tcp_height: 0.3,
            initial_positions: [0.0; N_JOINTS],
            external_wrench: [0.0; WRENCH_COMPONENTS],
            has_ft_sensor: true,
            fault_every: 0,
        }
    }
}

impl SimulationConfig {
    /// Check the parameters the dynamics divide by or clamp with.
    pub fn validate(&self) -> Result<(), HalError> {
        let positive = [
            ("time_step_s", self.time_step_s),
            ("velocity_time_constant", self.velocity_time_constant),
            ("max_velocity", self.max_velocity),
            ("inertia", self.inertia),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(HalError::ConfigurationError(format!(
                    "simulation '{name}' must be a positive number, got {value}"
                )));
            }
        }
        if self.initial_positions.iter().any(|p| !p.is_finite()) {
            return Err(HalError::ConfigurationError(
                "simulation 'initial_positions' must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn joint_params(&self) -> JointParams {
        JointParams {
            position_gain: self.position_gain,
            velocity_time_constant: self.velocity_time_constant,
            max_velocity: self.max_velocity,
            inertia: self.inertia,
            damping: self.damping,
        }
    }
}

/// Software 7-joint arm implementing `RobotLink`.
pub struct SimulatedLink {
    config: SimulationConfig,
    params: JointParams,
    joints: [JointSimulator; N_JOINTS],
    connected: bool,
    calls: u64,
}

impl SimulatedLink {
    /// Build from a validated configuration.
    pub fn new(config: SimulationConfig) -> Result<Self, HalError> {
        config.validate()?;
        Ok(Self {
            params: config.joint_params(),
            joints: config.initial_positions.map(JointSimulator::new),
            config,
            connected: false,
            calls: 0,
        })
    }

    /// Joint positions right now.
    pub fn positions(&self) -> JointArray {
        self.joints.map(|j| j.position())
    }

    fn inject_fault(&mut self, operation: &str) -> Result<(), LinkError> {
        self.calls += 1;
        let every = u64::from(self.config.fault_every);
        if every > 0 && self.calls % every == 0 {
            debug!("Injected {} fault on call {}", operation, self.calls);
            return Err(LinkError::Transport(format!("injected {operation} fault")));
        }
        Ok(())
    }

    /// Planar chain about base z: yaw is the joint-angle sum.
    fn tcp_pose(&self) -> (Pose, f64) {
        let mut yaw = 0.0;
        let mut x = 0.0;
        let mut y = 0.0;
        for joint in &self.joints {
            yaw += joint.position();
            x += self.config.link_length * yaw.cos();
            y += self.config.link_length * yaw.sin();
        }
        let half = yaw / 2.0;
        let pose = Pose {
            position: [x, y, self.config.tcp_height],
            orientation: [0.0, 0.0, half.sin(), half.cos()],
        };
        (pose, yaw)
    }
}

fn rotate_z(v: [f64; 3], angle: f64) -> [f64; 3] {
    let (s, c) = angle.sin_cos();
    [c * v[0] - s * v[1], s * v[0] + c * v[1], v[2]]
}

impl RobotLink for SimulatedLink {
    fn name(&self) -> &'static str {
        SIMULATION_LINK
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        self.joints = self.config.initial_positions.map(JointSimulator::new);
        self.calls = 0;
        self.connected = true;
        info!("Simulated arm connected");
        Ok(())
    }

    fn get_state(&mut self) -> Result<StateSnapshot, LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        self.inject_fault("read")?;

        let (tcp_pose, yaw) = self.tcp_pose();
        let in_tcp = Wrench::from_array(self.config.external_wrench);
        let in_base = Wrench {
            force: rotate_z(in_tcp.force, yaw),
            torque: rotate_z(in_tcp.torque, yaw),
        };

        Ok(StateSnapshot {
            positions: self.joints.map(|j| j.position()),
            velocities: self.joints.map(|j| j.velocity()),
            efforts: self.joints.map(|j| j.effort()),
            ft_sensor_raw: if self.config.has_ft_sensor {
                in_tcp
            } else {
                Wrench::ZERO
            },
            ext_wrench_in_base: in_base,
            ext_wrench_in_tcp: in_tcp,
            tcp_pose,
        })
    }

    fn send_command(&mut self, command: &CommandSet) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        if command.mode == ControlMode::None {
            return Err(LinkError::Protocol("command without control mode".to_string()));
        }
        self.inject_fault("write")?;

        let dt = self.config.time_step_s;
        for (joint, value) in self.joints.iter_mut().zip(command.values) {
            joint.step(command.mode, value, dt, &self.params);
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        if !self.connected {
            warn!("Simulated arm disconnect without session");
        }
        for joint in &mut self.joints {
            joint.halt();
        }
        self.connected = false;
        info!("Simulated arm disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
