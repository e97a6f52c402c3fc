//! HAL configuration types.
//!
//! - `AppConfig` - whole `hal.toml` (`[shared]`, `[hardware]`, `[broadcaster]`)
//! - `HardwareConfig` - joints, link selection, cycle timing, fault policy
//! - `BroadcasterConfig` - wrench source, frame id, output topic
//! - `WrenchSource` - normalised sensor-source selection
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "manip-hal"
//!
//! [hardware]
//! cycle_time_us = 1000
//! link = "simulation"
//! joints = ["joint1", "joint2", "joint3", "joint4", "joint5", "joint6", "joint7"]
//!
//! [broadcaster]
//! sensor_name = "external_wrench_in_tcp"
//! frame_id = "flange"
//! topic_name = "external_wrench_in_tcp"
//! ```

use crate::config::SharedConfig;
use crate::consts::{
    DEFAULT_CYCLE_TIME_US, DEFAULT_FAULT_THRESHOLD, DEFAULT_OVERRUN_LIMIT, MAX_FRAME_ID_LEN,
    N_JOINTS, SIMULATION_LINK,
};
use crate::hal::error::HalError;
use crate::hal::interfaces::sensor_channel_names;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

fn default_cycle_time_us() -> u32 {
    DEFAULT_CYCLE_TIME_US
}

fn default_fault_threshold() -> u32 {
    DEFAULT_FAULT_THRESHOLD
}

fn default_overrun_limit() -> u32 {
    DEFAULT_OVERRUN_LIMIT
}

fn default_link() -> String {
    SIMULATION_LINK.to_string()
}

fn default_joints() -> Vec<String> {
    (1..=N_JOINTS).map(|i| format!("joint{i}")).collect()
}

/// How the command buffer of a newly committed mode is initialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandInitPolicy {
    /// Seed from the last-read state (position ← measured position, etc.).
    #[default]
    HoldState,
    /// Zero every slot of the new mode.
    Zero,
}

/// `[hardware]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Control cycle time in microseconds.
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Name of the robot link implementation to load.
    #[serde(default = "default_link")]
    pub link: String,

    /// Joint names, in joint-index order. Exactly `N_JOINTS`.
    #[serde(default = "default_joints")]
    pub joints: Vec<String>,

    /// Initialisation of the command buffer on mode commit.
    #[serde(default)]
    pub command_init: CommandInitPolicy,

    /// Consecutive link faults before escalating to `Faulted`.
    #[serde(default = "default_fault_threshold")]
    pub fault_threshold: u32,

    /// Consecutive deadline overruns before the control loop gives up.
    #[serde(default = "default_overrun_limit")]
    pub overrun_limit: u32,

    /// Lock process memory (`mlockall`) before entering the loop.
    #[serde(default)]
    pub lock_memory: bool,

    /// SCHED_FIFO priority for the control thread (1..=99); unset keeps the
    /// inherited policy.
    #[serde(default)]
    pub rt_priority: Option<i32>,

    /// CPU core the control thread is pinned to.
    #[serde(default)]
    pub cpu_affinity: Option<usize>,

    /// Per-link configuration tables. Key = link name.
    #[serde(default)]
    pub link_config: HashMap<String, toml::Value>,
}

impl HardwareConfig {
    /// Validate the hardware configuration.
    ///
    /// # Validation Rules
    /// 1. `cycle_time_us` > 0
    /// 2. `joints.len()` == `N_JOINTS`, names non-empty
    /// 3. `link` non-empty
    /// 4. `fault_threshold` > 0
    /// 5. `rt_priority`, if set, in 1..=99
    pub fn validate(&self) -> Result<(), HalError> {
        if self.cycle_time_us == 0 {
            return Err(HalError::ConfigurationError(
                "cycle_time_us must be greater than 0".to_string(),
            ));
        }

        if self.joints.len() != N_JOINTS {
            return Err(HalError::ConfigurationError(format!(
                "expected {} joints, got {}",
                N_JOINTS,
                self.joints.len()
            )));
        }

        if self.joints.iter().any(|j| j.trim().is_empty()) {
            return Err(HalError::ConfigurationError(
                "joint name cannot be empty".to_string(),
            ));
        }

        if self.link.trim().is_empty() {
            return Err(HalError::ConfigurationError(
                "link cannot be empty".to_string(),
            ));
        }

        if self.fault_threshold == 0 {
            return Err(HalError::ConfigurationError(
                "fault_threshold must be greater than 0".to_string(),
            ));
        }

        if let Some(priority) = self.rt_priority {
            if !(1..=99).contains(&priority) {
                return Err(HalError::ConfigurationError(format!(
                    "rt_priority must be in 1..=99, got {priority}"
                )));
            }
        }

        Ok(())
    }

    /// Cycle time as `Duration`.
    pub fn cycle_time(&self) -> Duration {
        Duration::from_micros(u64::from(self.cycle_time_us))
    }

    /// Link-specific table for `link`; an empty table if none was given.
    pub fn link_config_for(&self, link: &str) -> toml::Value {
        self.link_config
            .get(link)
            .cloned()
            .unwrap_or_else(|| toml::Value::Table(toml::Table::new()))
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: DEFAULT_CYCLE_TIME_US,
            link: default_link(),
            joints: default_joints(),
            command_init: CommandInitPolicy::default(),
            fault_threshold: DEFAULT_FAULT_THRESHOLD,
            overrun_limit: DEFAULT_OVERRUN_LIMIT,
            lock_memory: false,
            rt_priority: None,
            cpu_affinity: None,
            link_config: HashMap::new(),
        }
    }
}

/// Per-axis interface names (`x`, `y`, `z`). Empty string = not used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisNames {
    /// X component channel.
    #[serde(default)]
    pub x: String,
    /// Y component channel.
    #[serde(default)]
    pub y: String,
    /// Z component channel.
    #[serde(default)]
    pub z: String,
}

/// `interface_names.{force,torque}.{x,y,z}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceNames {
    /// Force channels.
    #[serde(default)]
    pub force: AxisNames,
    /// Torque channels.
    #[serde(default)]
    pub torque: AxisNames,
}

impl InterfaceNames {
    /// Names in `[fx, fy, fz, tx, ty, tz]` order.
    pub fn as_array(&self) -> [&str; 6] {
        [
            self.force.x.as_str(),
            self.force.y.as_str(),
            self.force.z.as_str(),
            self.torque.x.as_str(),
            self.torque.y.as_str(),
            self.torque.z.as_str(),
        ]
    }

    /// True if no channel is named.
    pub fn is_empty(&self) -> bool {
        self.as_array().iter().all(|n| n.trim().is_empty())
    }
}

/// `[broadcaster]` section, as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcasterConfig {
    /// Name of a force-torque sensor component (`<name>/force.x` ...).
    #[serde(default)]
    pub sensor_name: String,

    /// Individually named channels. Mutually exclusive with `sensor_name`.
    #[serde(default)]
    pub interface_names: InterfaceNames,

    /// Frame identifier stamped on every message.
    #[serde(default)]
    pub frame_id: String,

    /// Output sink name.
    #[serde(default)]
    pub topic_name: String,
}

/// Where the broadcaster reads its six wrench components from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrenchSource {
    /// A sensor component; channels are `<name>/{force,torque}.{x,y,z}`.
    NamedComponent(String),
    /// Explicit per-component channels; `None` components read as 0.0.
    ExplicitChannels([Option<String>; 6]),
}

impl WrenchSource {
    /// Channel names in `[fx, fy, fz, tx, ty, tz]` order.
    pub fn channel_names(&self) -> [Option<String>; 6] {
        match self {
            WrenchSource::NamedComponent(name) => sensor_channel_names(name).map(Some),
            WrenchSource::ExplicitChannels(names) => names.clone(),
        }
    }
}

/// Broadcaster configuration after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBroadcasterConfig {
    /// Normalised wrench source.
    pub source: WrenchSource,
    /// Frame identifier (non-empty, at most `MAX_FRAME_ID_LEN` bytes).
    pub frame_id: String,
    /// Output sink name (non-empty).
    pub topic_name: String,
}

impl BroadcasterConfig {
    /// Validate and normalise.
    ///
    /// # Errors
    /// `HalError::ConfigurationError` if both or neither of `sensor_name` and
    /// `interface_names` are given, or `frame_id` / `topic_name` are missing.
    pub fn resolve(&self) -> Result<ResolvedBroadcasterConfig, HalError> {
        let sensor_name = self.sensor_name.trim();
        let no_interface_names = self.interface_names.is_empty();

        if sensor_name.is_empty() && no_interface_names {
            return Err(HalError::ConfigurationError(
                "'sensor_name' or at least one 'interface_names.[force|torque].[x|y|z]' \
                 parameter has to be specified"
                    .to_string(),
            ));
        }
        if !sensor_name.is_empty() && !no_interface_names {
            return Err(HalError::ConfigurationError(
                "'sensor_name' and 'interface_names.[force|torque].[x|y|z]' \
                 cannot be specified together"
                    .to_string(),
            ));
        }

        let frame_id = self.frame_id.trim();
        if frame_id.is_empty() {
            return Err(HalError::ConfigurationError(
                "'frame_id' parameter has to be provided".to_string(),
            ));
        }
        if frame_id.len() > MAX_FRAME_ID_LEN {
            return Err(HalError::ConfigurationError(format!(
                "'frame_id' longer than {MAX_FRAME_ID_LEN} bytes"
            )));
        }

        let topic_name = self.topic_name.trim();
        if topic_name.is_empty() {
            return Err(HalError::ConfigurationError(
                "'topic_name' parameter has to be provided".to_string(),
            ));
        }

        let source = if sensor_name.is_empty() {
            let names = self.interface_names.as_array().map(|n| {
                let n = n.trim();
                (!n.is_empty()).then(|| n.to_string())
            });
            WrenchSource::ExplicitChannels(names)
        } else {
            WrenchSource::NamedComponent(sensor_name.to_string())
        };

        Ok(ResolvedBroadcasterConfig {
            source,
            frame_id: frame_id.to_string(),
            topic_name: topic_name.to_string(),
        })
    }
}

/// Complete `hal.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging and instance name.
    #[serde(default)]
    pub shared: SharedConfig,
    /// Hardware cycle configuration.
    #[serde(default)]
    pub hardware: HardwareConfig,
    /// Wrench broadcaster; absent = no broadcaster.
    #[serde(default)]
    pub broadcaster: Option<BroadcasterConfig>,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), HalError> {
        self.shared
            .validate()
            .map_err(|e| HalError::ConfigurationError(e.to_string()))?;
        self.hardware.validate()?;
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.resolve()?;
        }
        Ok(())
    }
}
