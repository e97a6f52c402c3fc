//! Integration test: control loop on its own thread, driven from outside
//! through the stop and mode-switch handles.

use super::mock::{active_cycle, sample_state};
use manip_common::hal::config::HardwareConfig;
use manip_common::hal::error::HalError;
use manip_common::hal::types::{CommandSet, ControlMode, InterfaceKind, StateSnapshot};
use manip_hal::buffers::JointCommandBuffer;
use manip_hal::{ControlLoop, LifecycleState, ModeSwitchRequest, TickOutcome};
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

fn relaxed_config() -> HardwareConfig {
    HardwareConfig {
        overrun_limit: 0,
        ..HardwareConfig::default()
    }
}

#[test]
fn external_stop_is_observed_at_tick_boundary() {
    let (cycle, link) = active_cycle();
    let stop = cycle.stop_handle();
    let switcher = cycle.mode_switch_handle().unwrap();
    let table = cycle.interfaces().unwrap().clone();
    let mut control = ControlLoop::new(cycle, None, &relaxed_config());

    let worker = thread::spawn(move || {
        let mut ramp = |_: &StateSnapshot, mode: ControlMode, cmd: &mut JointCommandBuffer| {
            if let Some(kind) = mode.interface_kind() {
                cmd.values_mut(kind)[0] += 0.001;
            }
        };
        let result = control.run(&mut ramp, None);
        (result, control)
    });

    let request = ModeSwitchRequest::start(&table, InterfaceKind::Position);
    assert_eq!(switcher.request(&request), Ok(ControlMode::Position));
    assert!(wait_until(Duration::from_secs(5), || {
        link.sent().len() >= 20
    }));
    assert_eq!(switcher.active_mode(), ControlMode::Position);

    stop.request_stop();
    let (result, control) = worker.join().unwrap();
    let stats = result.unwrap();
    assert!(stats.cycle_count >= 20);
    assert_eq!(control.cycle().state(), LifecycleState::Stopped);

    // Ramped commands went out, the final one is the hold.
    let sent = link.sent();
    assert!(sent.iter().all(|c| c.mode == ControlMode::Position));
    assert!(sent[sent.len() - 2].values[0] > sample_state().positions[0]);
    assert_eq!(
        sent.last().copied(),
        Some(CommandSet::hold_position(sample_state().positions))
    );
}

#[test]
fn read_faults_skip_write_then_fault_the_loop() {
    let (mut cycle, link) = active_cycle();
    let request = ModeSwitchRequest::start(cycle.interfaces().unwrap(), InterfaceKind::Position);
    cycle.switch_mode(&request).unwrap();
    let mut control = ControlLoop::new(cycle, None, &relaxed_config());
    let mut hold = |_: &StateSnapshot, _: ControlMode, _: &mut JointCommandBuffer| {};

    assert_eq!(control.tick(&mut hold).unwrap(), TickOutcome::Continue);
    assert_eq!(link.sent().len(), 1);

    link.fail_reads(true);
    assert_eq!(control.tick(&mut hold).unwrap(), TickOutcome::Continue);
    assert_eq!(control.tick(&mut hold).unwrap(), TickOutcome::Continue);
    assert_eq!(control.stats().link_faults, 2);
    assert_eq!(link.sent().len(), 1);

    let err = control.tick(&mut hold).unwrap_err();
    assert!(matches!(err, HalError::LinkFault(_)));
    assert_eq!(control.cycle().state(), LifecycleState::Faulted);
    assert!(control.run(&mut hold, None).is_err());
}

#[test]
fn non_finite_hook_output_is_refused_not_fatal() {
    let (mut cycle, link) = active_cycle();
    let request = ModeSwitchRequest::start(cycle.interfaces().unwrap(), InterfaceKind::Effort);
    cycle.switch_mode(&request).unwrap();
    let mut control = ControlLoop::new(cycle, None, &relaxed_config());

    let mut broken = |_: &StateSnapshot, _: ControlMode, cmd: &mut JointCommandBuffer| {
        cmd.values_mut(InterfaceKind::Effort)[2] = f64::NAN;
    };
    for _ in 0..5 {
        assert_eq!(control.tick(&mut broken).unwrap(), TickOutcome::Continue);
    }
    assert!(link.sent().is_empty());
    assert_eq!(control.stats().rejected_writes, 5);
    assert_eq!(control.cycle().state(), LifecycleState::Active);
}
