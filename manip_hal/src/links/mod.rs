//! Robot link implementations.
//!
//! - [`simulation`] - software arm for development and testing
//!
//! # Adding New Links
//!
//! 1. Create a new submodule under `links/`
//! 2. Implement `RobotLink` from `manip_common::hal::link`
//! 3. Expose a `create_link(&toml::Value)` factory
//! 4. Register it in `LinkRegistry::with_builtin_links`

pub mod simulation;
