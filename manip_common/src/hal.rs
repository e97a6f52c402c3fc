//! Hardware abstraction layer types shared between the HAL and its callers.
//!
//! - [`types`] - joint state/command data model and control modes
//! - [`interfaces`] - exported channel names and name resolution
//! - [`link`] - the `RobotLink` vendor-session abstraction
//! - [`error`] - HAL, link and mode-switch error taxonomy
//! - [`config`] - hardware and broadcaster configuration

pub mod config;
pub mod error;
pub mod interfaces;
pub mod link;
pub mod types;
