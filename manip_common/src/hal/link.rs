//! Robot link trait.
//!
//! A `RobotLink` is the vendor SDK session the HAL talks to. The HAL only
//! needs three capabilities (connect, fetch state, send commands); everything
//! else about the robot stays behind this trait.
//!
//! # Timing Contracts
//!
//! | Operation | Called from | RT Constraint |
//! |-----------|-------------|---------------|
//! | `connect()` | `configure` | None (setup) |
//! | `get_state()` | `read` | **HARD**, bounded latency |
//! | `send_command()` | `write` | **HARD**, bounded latency |
//! | `disconnect()` | `deactivate`/reconfigure | None |

use crate::hal::error::{HalError, LinkError};
use crate::hal::types::{CommandSet, StateSnapshot};

/// Factory function type for creating link instances from a link-specific
/// configuration table.
pub type LinkFactory = fn(&toml::Value) -> Result<Box<dyn RobotLink>, HalError>;

/// Session with one robot.
pub trait RobotLink: Send {
    /// Link implementation identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Establish the session. May block; only called during configuration.
    fn connect(&mut self) -> Result<(), LinkError>;

    /// Fetch the latest robot state.
    ///
    /// Must not allocate. Fails with a transport/protocol error on link loss.
    fn get_state(&mut self) -> Result<StateSnapshot, LinkError>;

    /// Send one command for all joints.
    ///
    /// The command is applied atomically: either all joints receive it or
    /// the call fails.
    fn send_command(&mut self, command: &CommandSet) -> Result<(), LinkError>;

    /// Release the session.
    fn disconnect(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    /// True while a session is established.
    fn is_connected(&self) -> bool;
}
