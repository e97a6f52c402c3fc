//! Single-joint physics.
//!
//! - Position: velocity proportional to position error, clamped
//! - Velocity: first-order lag towards the commanded velocity
//! - Effort: commanded torque against viscous damping

use manip_common::hal::types::ControlMode;

/// Per-joint simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointParams {
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
}

/// One simulated joint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointSimulator {
    position: f64,
    velocity: f64,
    effort: f64,
}

impl JointSimulator {
    /// Joint at rest at `position`.
    pub fn new(position: f64) -> Self {
        Self {
            position,
            velocity: 0.0,
            effort: 0.0,
        }
    }

    /// Advance one step of `dt` seconds under `command` in `mode`.
    pub fn step(&mut self, mode: ControlMode, command: f64, dt: f64, p: &JointParams) {
        let velocity = match mode {
            ControlMode::None => self.velocity,
            ControlMode::Position => p.position_gain * (command - self.position),
            ControlMode::Velocity => {
                let alpha = (dt / (p.velocity_time_constant + dt)).clamp(0.0, 1.0);
                self.velocity + alpha * (command - self.velocity)
            }
            ControlMode::Effort => {
                let accel = (command - p.damping * self.velocity) / p.inertia;
                self.velocity + accel * dt
            }
        };
        let velocity = velocity.clamp(-p.max_velocity, p.max_velocity);

        self.effort = match mode {
            ControlMode::Effort => command,
            _ => p.inertia * (velocity - self.velocity) / dt + p.damping * velocity,
        };
        self.velocity = velocity;
        self.position += velocity * dt;
    }

    /// Stop the joint where it is.
    pub fn halt(&mut self) {
        self.velocity = 0.0;
        self.effort = 0.0;
    }

    /// Position [rad].
    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Velocity [rad/s].
    #[inline]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Effort [Nm].
    #[inline]
    pub fn effort(&self) -> f64 {
        self.effort
    }
}
