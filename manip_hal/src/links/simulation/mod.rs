//! Simulation link.
//!
//! A software 7-joint arm with first-order joint dynamics, a synthetic
//! external wrench and optional injected transport faults.

mod joint;
mod link;

pub use joint::JointSimulator;
pub use link::{SimulatedLink, SimulationConfig};

use manip_common::hal::error::HalError;
use manip_common::hal::link::RobotLink;

/// Factory function to create a simulation link from its config table.
pub fn create_link(config: &toml::Value) -> Result<Box<dyn RobotLink>, HalError> {
    let config: SimulationConfig = config
        .clone()
        .try_into()
        .map_err(|e| HalError::ConfigurationError(format!("simulation link config: {e}")))?;
    Ok(Box::new(SimulatedLink::new(config)?))
}
