//! Hardware cycle: lifecycle and the per-tick read/write against the link.
//!
//! ```text
//! Unconfigured ──configure──► Configured ──activate──► Active
//!       ▲                        ▲   ▲                  │  │
//!       │                        │   └───configure──────┤  │ deactivate
//!       └────────────────────────┴──── Faulted ◄────────┘  ▼
//!                               configure            Stopped
//! ```
//!
//! `Faulted` is entered only after `fault_threshold` consecutive link faults
//! on `read`/`write`; leaving it requires `configure` (no auto-recovery).

use crate::arbiter::{ControlModeArbiter, ModeSwitchRequest};
use crate::buffers::{JointCommandBuffer, JointStateBuffer};
use crate::handoff::{ModeMailbox, ModeSwitchHandle, StopHandle};
use manip_common::consts::DEFAULT_FAULT_THRESHOLD;
use manip_common::hal::config::{CommandInitPolicy, HardwareConfig};
use manip_common::hal::error::{HalError, LinkError};
use manip_common::hal::interfaces::InterfaceTable;
use manip_common::hal::link::RobotLink;
use manip_common::hal::types::{CommandSet, ControlMode, StateSnapshot};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle state of the hardware cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No joints, no link session.
    Unconfigured,
    /// Link connected, buffers allocated, not cycling.
    Configured,
    /// Accepting `read`/`write`.
    Active,
    /// Too many consecutive link faults; reconfigure to recover.
    Faulted,
    /// Deactivated after a safe hold; link released.
    Stopped,
}

impl LifecycleState {
    /// State name for logs and errors.
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Unconfigured => "Unconfigured",
            LifecycleState::Configured => "Configured",
            LifecycleState::Active => "Active",
            LifecycleState::Faulted => "Faulted",
            LifecycleState::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options consumed at `configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOptions {
    /// Command buffer initialisation on mode commit.
    pub command_init: CommandInitPolicy,
    /// Consecutive link faults before `Faulted`.
    pub fault_threshold: u32,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            command_init: CommandInitPolicy::default(),
            fault_threshold: DEFAULT_FAULT_THRESHOLD,
        }
    }
}

impl From<&HardwareConfig> for CycleOptions {
    fn from(config: &HardwareConfig) -> Self {
        Self {
            command_init: config.command_init,
            fault_threshold: config.fault_threshold,
        }
    }
}

/// Owns the robot link and the joint buffers; runs one read/write per tick.
pub struct HardwareCycle {
    link: Box<dyn RobotLink>,
    state: LifecycleState,
    options: CycleOptions,
    arbiter: Option<ControlModeArbiter>,
    state_buffer: JointStateBuffer,
    commands: JointCommandBuffer,
    consecutive_faults: u32,
    total_faults: u64,
    stop: StopHandle,
    mailbox: ModeMailbox,
}

impl HardwareCycle {
    /// Wrap a link. Nothing is connected until `configure`.
    pub fn new(link: Box<dyn RobotLink>) -> Self {
        Self {
            link,
            state: LifecycleState::Unconfigured,
            options: CycleOptions::default(),
            arbiter: None,
            state_buffer: JointStateBuffer::new(),
            commands: JointCommandBuffer::new(),
            consecutive_faults: 0,
            total_faults: 0,
            stop: StopHandle::new(),
            mailbox: ModeMailbox::new(),
        }
    }

    /// Validate joints, build the interface table and connect the link.
    ///
    /// The only phase allowed to allocate or block on slow setup. Also the
    /// recovery path out of `Faulted` and `Stopped`.
    ///
    /// # Errors
    /// `ConfigurationError` on joint-count/name problems or connection failure;
    /// `InvalidState` while `Active`.
    pub fn configure(&mut self, joint_names: &[String], options: CycleOptions) -> Result<(), HalError> {
        if self.state == LifecycleState::Active {
            return Err(self.invalid_state("configure"));
        }
        if options.fault_threshold == 0 {
            return Err(HalError::ConfigurationError(
                "fault_threshold must be greater than 0".to_string(),
            ));
        }

        let table = Arc::new(InterfaceTable::new(joint_names)?);

        if self.link.is_connected() {
            if let Err(e) = self.link.disconnect() {
                warn!("Disconnecting stale {} session failed: {}", self.link.name(), e);
            }
        }
        self.link.connect().map_err(|e| {
            HalError::ConfigurationError(format!("{} link connection failed: {}", self.link.name(), e))
        })?;

        self.options = options;
        self.arbiter = Some(ControlModeArbiter::new(table, options.command_init));
        self.state_buffer.clear();
        self.commands.clear();
        self.consecutive_faults = 0;
        self.stop.clear();
        self.mailbox.clear();
        self.state = LifecycleState::Configured;

        info!(
            "Hardware configured: link={}, joints={:?}, fault_threshold={}",
            self.link.name(),
            joint_names,
            options.fault_threshold
        );
        Ok(())
    }

    /// Start accepting `read`/`write`.
    ///
    /// Fetches one initial snapshot so that hold-state initialisation and
    /// the safe hold have real joint positions to work from.
    pub fn activate(&mut self) -> Result<(), HalError> {
        if self.state != LifecycleState::Configured {
            return Err(HalError::ActivationError(format!(
                "cannot activate from state {}",
                self.state
            )));
        }

        let snapshot = self
            .link
            .get_state()
            .map_err(|e| HalError::ActivationError(format!("initial state read failed: {e}")))?;
        self.state_buffer.store(snapshot, Instant::now());
        self.stop.clear();
        self.state = LifecycleState::Active;

        info!("Hardware active");
        Ok(())
    }

    /// Fetch the latest state into the state buffer.
    ///
    /// On a link fault the previous snapshot is kept untouched and the fault
    /// is returned; `fault_threshold` consecutive faults escalate to `Faulted`.
    pub fn read(&mut self) -> Result<StateSnapshot, HalError> {
        if self.state != LifecycleState::Active {
            return Err(self.invalid_state("read"));
        }
        match self.link.get_state() {
            Ok(snapshot) => {
                self.state_buffer.store(snapshot, Instant::now());
                self.consecutive_faults = 0;
                Ok(snapshot)
            }
            Err(e) => Err(self.record_fault("read", e)),
        }
    }

    /// Send the active mode's command values.
    ///
    /// No-op when no mode is active. The whole command is validated before
    /// anything is sent; a non-finite value aborts the tick's write.
    pub fn write(&mut self) -> Result<(), HalError> {
        if self.state != LifecycleState::Active {
            return Err(self.invalid_state("write"));
        }
        let Some(command) = self.commands.command_for(self.active_mode()) else {
            trace!("No active mode, nothing to write");
            return Ok(());
        };
        if let Some(joint) = command.first_non_finite() {
            warn!("Non-finite {} command on joint {}, write skipped", command.mode, joint);
            return Err(HalError::InvalidCommand { joint });
        }
        match self.link.send_command(&command) {
            Ok(()) => {
                self.consecutive_faults = 0;
                Ok(())
            }
            Err(e) => Err(self.record_fault("write", e)),
        }
    }

    /// Command a safe hold, then release the link and enter `Stopped`.
    ///
    /// The hold is zero velocity when velocity mode was active and a
    /// hold-position at the last-known-good joint positions otherwise.
    pub fn deactivate(&mut self) -> Result<(), HalError> {
        if self.state != LifecycleState::Active {
            return Err(self.invalid_state("deactivate"));
        }

        let hold = self.safe_hold_command();
        if let Err(e) = self.link.send_command(&hold) {
            error!("Safe hold failed during deactivate: {}", e);
            self.enter_faulted();
            return Err(HalError::LinkFault(e));
        }
        info!("Safe hold sent ({})", hold.mode);

        if let Some(arbiter) = self.arbiter.as_mut() {
            arbiter.release();
        }
        self.release_link();
        self.stop.clear();
        self.state = LifecycleState::Stopped;
        info!("Hardware stopped");
        Ok(())
    }

    /// Stop from any state: deactivate when active, release the link when
    /// merely configured, otherwise nothing.
    pub fn stop(&mut self) -> Result<(), HalError> {
        match self.state {
            LifecycleState::Active => self.deactivate(),
            LifecycleState::Configured => {
                self.release_link();
                self.state = LifecycleState::Stopped;
                info!("Hardware stopped before activation");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Honour a pending cross-thread stop request. Returns true if stopped.
    pub fn poll_stop_request(&mut self) -> Result<bool, HalError> {
        if !self.stop.is_requested() {
            return Ok(false);
        }
        self.stop.clear();
        if self.state != LifecycleState::Active {
            return Ok(false);
        }
        info!("Stop requested, deactivating at tick boundary");
        self.deactivate().map(|()| true)
    }

    /// Validate a mode switch without applying it.
    pub fn prepare_mode_switch(&self, request: &ModeSwitchRequest) -> Result<ControlMode, HalError> {
        let arbiter = self.arbiter_ref("prepare_mode_switch")?;
        Ok(arbiter.validate(request)?)
    }

    /// Apply a validated target. Call between ticks only.
    pub fn commit_mode(&mut self, target: ControlMode) -> Result<(), HalError> {
        if !matches!(self.state, LifecycleState::Configured | LifecycleState::Active) {
            return Err(self.invalid_state("commit_mode"));
        }
        let snapshot = *self.state_buffer.snapshot();
        let Some(arbiter) = self.arbiter.as_mut() else {
            return Err(self.invalid_state("commit_mode"));
        };
        arbiter.commit(target, &mut self.commands, &snapshot);
        Ok(())
    }

    /// Validate and commit in one step (same-thread callers).
    pub fn switch_mode(&mut self, request: &ModeSwitchRequest) -> Result<ControlMode, HalError> {
        let target = self.prepare_mode_switch(request)?;
        self.commit_mode(target)?;
        Ok(target)
    }

    /// Commit a transition posted through a `ModeSwitchHandle`, if any.
    ///
    /// The transition is dropped when the active mode is no longer the one
    /// it was validated against. Never blocks: a mailbox momentarily held by
    /// a poster is retried next tick.
    pub fn apply_pending_mode_switch(&mut self) -> Result<Option<ControlMode>, HalError> {
        let Some(pending) = self.mailbox.try_take() else {
            return Ok(None);
        };
        let active = self.active_mode();
        if pending.from != active {
            warn!(
                "Dropping stale mode switch {} -> {}: active mode is now {}",
                pending.from, pending.target, active
            );
            return Ok(None);
        }
        self.commit_mode(pending.target)?;
        Ok(Some(pending.target))
    }

    /// Handle for requesting a stop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Handle for requesting mode switches from another thread.
    pub fn mode_switch_handle(&self) -> Result<ModeSwitchHandle, HalError> {
        let arbiter = self.arbiter_ref("mode_switch_handle")?;
        Ok(ModeSwitchHandle::new(
            Arc::clone(arbiter.table()),
            arbiter.published_mode(),
            self.mailbox.clone(),
        ))
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Active control mode (`None` before configure).
    #[inline]
    pub fn active_mode(&self) -> ControlMode {
        self.arbiter
            .as_ref()
            .map(ControlModeArbiter::active)
            .unwrap_or_default()
    }

    /// Last-known-good snapshot.
    #[inline]
    pub fn snapshot(&self) -> &StateSnapshot {
        self.state_buffer.snapshot()
    }

    /// State buffer (snapshot + bookkeeping).
    pub fn state_buffer(&self) -> &JointStateBuffer {
        &self.state_buffer
    }

    /// Pending commands.
    pub fn commands(&self) -> &JointCommandBuffer {
        &self.commands
    }

    /// Pending commands, for the external controller to fill in.
    #[inline]
    pub fn commands_mut(&mut self) -> &mut JointCommandBuffer {
        &mut self.commands
    }

    /// Interface table built at configure.
    pub fn interfaces(&self) -> Result<&InterfaceTable, HalError> {
        Ok(self.arbiter_ref("interfaces")?.table())
    }

    /// Ordered read-only channel names.
    pub fn export_state_interfaces(&self) -> Result<Vec<String>, HalError> {
        Ok(self.interfaces()?.state_names().to_vec())
    }

    /// Ordered writable channel names.
    pub fn export_command_interfaces(&self) -> Result<Vec<String>, HalError> {
        Ok(self.interfaces()?.command_names().to_vec())
    }

    /// Read a state channel by name from the last-known-good snapshot.
    pub fn state_value(&self, name: &str) -> Option<f64> {
        let table = self.arbiter.as_ref()?.table();
        table
            .state_channel(name)
            .map(|ch| ch.read(self.state_buffer.snapshot()))
    }

    /// Read a command channel by name.
    pub fn command_value(&self, name: &str) -> Option<f64> {
        let table = self.arbiter.as_ref()?.table();
        table.command_channel(name).map(|ch| self.commands.get(ch))
    }

    /// Write a command channel by name. Values of inactive modes are stored
    /// but ignored by `write`.
    pub fn set_command(&mut self, name: &str, value: f64) -> Result<(), HalError> {
        let channel = self
            .arbiter_ref("set_command")?
            .table()
            .command_channel(name)
            .ok_or_else(|| HalError::ConfigurationError(format!("unknown command interface '{name}'")))?;
        self.commands.set(channel, value);
        Ok(())
    }

    /// Consecutive link faults since the last successful call.
    pub fn consecutive_faults(&self) -> u32 {
        self.consecutive_faults
    }

    /// Link faults since construction.
    pub fn total_faults(&self) -> u64 {
        self.total_faults
    }

    /// Name of the wrapped link.
    pub fn link_name(&self) -> &'static str {
        self.link.name()
    }

    fn safe_hold_command(&self) -> CommandSet {
        match self.active_mode() {
            ControlMode::Velocity => CommandSet::zero_velocity(),
            _ => CommandSet::hold_position(self.state_buffer.snapshot().positions),
        }
    }

    fn record_fault(&mut self, operation: &str, e: LinkError) -> HalError {
        self.consecutive_faults += 1;
        self.total_faults += 1;
        warn!(
            "Link fault on {} ({}/{}): {}",
            operation, self.consecutive_faults, self.options.fault_threshold, e
        );
        if self.consecutive_faults >= self.options.fault_threshold {
            error!(
                "{} consecutive link faults, hardware faulted",
                self.consecutive_faults
            );
            self.enter_faulted();
        }
        HalError::LinkFault(e)
    }

    fn enter_faulted(&mut self) {
        if let Some(arbiter) = self.arbiter.as_mut() {
            arbiter.release();
        }
        self.mailbox.clear();
        self.state = LifecycleState::Faulted;
    }

    fn release_link(&mut self) {
        if let Err(e) = self.link.disconnect() {
            warn!("Releasing {} link failed: {}", self.link.name(), e);
        } else {
            debug!("{} link released", self.link.name());
        }
    }

    fn arbiter_ref(&self, operation: &'static str) -> Result<&ControlModeArbiter, HalError> {
        self.arbiter
            .as_ref()
            .ok_or_else(|| self.invalid_state(operation))
    }

    fn invalid_state(&self, operation: &'static str) -> HalError {
        HalError::InvalidState {
            operation,
            state: self.state.as_str(),
        }
    }
}

impl Drop for HardwareCycle {
    /// An active cycle commands its safe hold before the link goes away.
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Stopping hardware on drop failed: {}", e);
        }
        if self.state == LifecycleState::Faulted && self.link.is_connected() {
            self.release_link();
        }
    }
}
