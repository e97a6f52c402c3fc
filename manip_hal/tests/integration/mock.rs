//! Scripted robot link shared by the integration tests.
//!
//! The test keeps a `MockHandle` to the same script the link runs on, so it
//! can change the reported state, inject faults and inspect every command
//! the HAL sent.

use manip_common::consts::N_JOINTS;
use manip_common::hal::error::LinkError;
use manip_common::hal::link::RobotLink;
use manip_common::hal::types::{CommandSet, StateSnapshot};
use manip_hal::{CycleOptions, HardwareCycle};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Script {
    pub connected: bool,
    pub state: StateSnapshot,
    pub fail_connect: bool,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub reads: u64,
    pub sent: Vec<CommandSet>,
    pub disconnects: u32,
}

pub struct MockLink {
    script: Arc<Mutex<Script>>,
}

#[derive(Clone)]
pub struct MockHandle {
    script: Arc<Mutex<Script>>,
}

impl MockHandle {
    pub fn set_state(&self, state: StateSnapshot) {
        self.script.lock().state = state;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.script.lock().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.script.lock().fail_writes = fail;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.script.lock().fail_connect = fail;
    }

    pub fn sent(&self) -> Vec<CommandSet> {
        self.script.lock().sent.clone()
    }

    pub fn last_sent(&self) -> Option<CommandSet> {
        self.script.lock().sent.last().copied()
    }

    pub fn clear_sent(&self) {
        self.script.lock().sent.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.script.lock().connected
    }

    pub fn disconnects(&self) -> u32 {
        self.script.lock().disconnects
    }
}

pub fn mock_link() -> (MockLink, MockHandle) {
    let script = Arc::new(Mutex::new(Script::default()));
    (
        MockLink {
            script: Arc::clone(&script),
        },
        MockHandle { script },
    )
}

impl RobotLink for MockLink {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn connect(&mut self) -> Result<(), LinkError> {
        let mut s = self.script.lock();
        if s.fail_connect {
            return Err(LinkError::ConnectionFailed("robot unreachable".to_string()));
        }
        s.connected = true;
        Ok(())
    }

    fn get_state(&mut self) -> Result<StateSnapshot, LinkError> {
        let mut s = self.script.lock();
        if !s.connected {
            return Err(LinkError::NotConnected);
        }
        if s.fail_reads {
            return Err(LinkError::Transport("read timeout".to_string()));
        }
        s.reads += 1;
        Ok(s.state)
    }

    fn send_command(&mut self, command: &CommandSet) -> Result<(), LinkError> {
        let mut s = self.script.lock();
        if !s.connected {
            return Err(LinkError::NotConnected);
        }
        if s.fail_writes {
            return Err(LinkError::Transport("write timeout".to_string()));
        }
        s.sent.push(*command);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        let mut s = self.script.lock();
        s.connected = false;
        s.disconnects += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.script.lock().connected
    }
}

pub fn joint_names() -> Vec<String> {
    (1..=N_JOINTS).map(|i| format!("joint{i}")).collect()
}

/// Snapshot with distinct, recognisable values on every channel.
pub fn sample_state() -> StateSnapshot {
    let mut state = StateSnapshot::default();
    for j in 0..N_JOINTS {
        let j_f = j as f64;
        state.positions[j] = 0.1 * (j_f + 1.0);
        state.velocities[j] = -0.01 * (j_f + 1.0);
        state.efforts[j] = 2.0 + j_f;
    }
    state
}

/// Configured and active cycle over a mock link reporting `sample_state`.
pub fn active_cycle() -> (HardwareCycle, MockHandle) {
    let (link, handle) = mock_link();
    handle.set_state(sample_state());
    let mut cycle = HardwareCycle::new(Box::new(link));
    cycle
        .configure(&joint_names(), CycleOptions::default())
        .expect("configure");
    cycle.activate().expect("activate");
    (cycle, handle)
}
