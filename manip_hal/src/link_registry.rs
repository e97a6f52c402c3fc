//! Robot link registry.
//!
//! Maps link names to `LinkFactory` functions. Built at startup and handed
//! to whoever creates the `HardwareCycle`; no global state.

use crate::links;
use manip_common::consts::SIMULATION_LINK;
use manip_common::hal::error::HalError;
use manip_common::hal::link::{LinkFactory, RobotLink};
use std::collections::HashMap;

/// Registry of available robot links.
pub struct LinkRegistry {
    factories: HashMap<&'static str, LinkFactory>,
}

impl LinkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with every link shipped in this crate.
    pub fn with_builtin_links() -> Self {
        let mut registry = Self::new();
        registry.register(SIMULATION_LINK, links::simulation::create_link);
        registry
    }

    /// Register a link factory.
    ///
    /// # Panics
    /// Panics if a link with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: LinkFactory) {
        if self.factories.contains_key(name) {
            panic!("Link '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a link factory by name.
    pub fn get_factory(&self, name: &str) -> Option<LinkFactory> {
        self.factories.get(name).copied()
    }

    /// Create a link instance by name from its configuration table.
    ///
    /// # Errors
    /// `LinkNotFound` if nothing is registered under `name`, or whatever
    /// the factory reports for a bad table.
    pub fn create(&self, name: &str, config: &toml::Value) -> Result<Box<dyn RobotLink>, HalError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HalError::LinkNotFound(name.to_string()))?;
        factory(config)
    }

    /// List all registered link names, sorted.
    pub fn list_links(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
