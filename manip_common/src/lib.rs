//! Manipulator HAL Common Library
//!
//! This crate provides the shared data model, robot link abstraction and
//! configuration loading utilities for all workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Joint count, cycle defaults, channel counts
//! - [`hal`] - Joint state/command types, interface naming, link trait, errors
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use manip_common::prelude::*;
//!
//! let snapshot = StateSnapshot::default();
//! assert_eq!(snapshot.positions.len(), N_JOINTS);
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
