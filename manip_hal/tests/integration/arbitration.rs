//! Integration test: mode-switch arbitration through `HardwareCycle`.

use super::mock::active_cycle;
use manip_common::hal::error::{HalError, RejectReason};
use manip_common::hal::types::{ControlMode, InterfaceKind};
use manip_hal::{HardwareCycle, ModeSwitchRequest};
use std::thread;

fn names(cycle: &HardwareCycle, kind: InterfaceKind) -> Vec<String> {
    cycle.interfaces().unwrap().mode_channel_names(kind)
}

fn rejected(result: Result<ControlMode, HalError>) -> RejectReason {
    match result {
        Err(HalError::ModeSwitchRejected(reason)) => reason,
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn every_accepted_switch_leaves_one_mode_on_the_wire() {
    let (mut cycle, handle) = active_cycle();
    let sequence = [
        ControlMode::Position,
        ControlMode::Velocity,
        ControlMode::Effort,
        ControlMode::Position,
    ];

    let mut previous = ControlMode::None;
    for target in sequence {
        let request = ModeSwitchRequest::switch(cycle.interfaces().unwrap(), previous, target);
        assert_eq!(cycle.switch_mode(&request).unwrap(), target);
        assert_eq!(cycle.active_mode(), target);

        handle.clear_sent();
        cycle.read().unwrap();
        cycle.write().unwrap();
        let sent = handle.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].mode, target);
        previous = target;
    }
}

#[test]
fn start_spanning_two_modes_is_conflicting() {
    let (mut cycle, _handle) = active_cycle();
    for current in [ControlMode::None, ControlMode::Effort] {
        if let Some(kind) = current.interface_kind() {
            let request = ModeSwitchRequest::start(cycle.interfaces().unwrap(), kind);
            cycle.switch_mode(&request).unwrap();
        }

        let mut start = names(&cycle, InterfaceKind::Position);
        start.extend(names(&cycle, InterfaceKind::Velocity));
        let request = ModeSwitchRequest::new(start, Vec::<String>::new());

        assert_eq!(
            rejected(cycle.switch_mode(&request)),
            RejectReason::ConflictingModes
        );
        assert_eq!(cycle.active_mode(), current);
    }
}

#[test]
fn stop_not_matching_active_set_is_stop_mismatch() {
    let (mut cycle, _handle) = active_cycle();
    let request = ModeSwitchRequest::start(cycle.interfaces().unwrap(), InterfaceKind::Velocity);
    cycle.switch_mode(&request).unwrap();

    let cases = [
        // Wrong mode.
        (
            names(&cycle, InterfaceKind::Position),
            names(&cycle, InterfaceKind::Effort),
        ),
        // Active mode, one joint short.
        (Vec::new(), {
            let mut stop = names(&cycle, InterfaceKind::Velocity);
            stop.remove(3);
            stop
        }),
    ];
    for (start, stop) in cases {
        let request = ModeSwitchRequest::new(start, stop);
        assert_eq!(
            rejected(cycle.switch_mode(&request)),
            RejectReason::StopMismatch
        );
        assert_eq!(cycle.active_mode(), ControlMode::Velocity);
    }
}

#[test]
fn velocity_start_while_position_active_without_stop_is_rejected() {
    let (mut cycle, handle) = active_cycle();
    let request = ModeSwitchRequest::start(cycle.interfaces().unwrap(), InterfaceKind::Position);
    cycle.switch_mode(&request).unwrap();

    let request = ModeSwitchRequest::new(names(&cycle, InterfaceKind::Velocity), Vec::<String>::new());
    assert_eq!(
        rejected(cycle.switch_mode(&request)),
        RejectReason::ConflictingModes
    );
    assert_eq!(cycle.active_mode(), ControlMode::Position);

    cycle.read().unwrap();
    cycle.write().unwrap();
    assert_eq!(handle.last_sent().unwrap().mode, ControlMode::Position);
}

#[test]
fn pure_stop_then_idle_writes() {
    let (mut cycle, handle) = active_cycle();
    let table = cycle.interfaces().unwrap();
    let start = ModeSwitchRequest::start(table, InterfaceKind::Effort);
    let stop = ModeSwitchRequest::switch(table, ControlMode::Effort, ControlMode::None);
    cycle.switch_mode(&start).unwrap();

    assert_eq!(cycle.switch_mode(&stop).unwrap(), ControlMode::None);
    handle.clear_sent();
    cycle.write().unwrap();
    assert!(handle.sent().is_empty());
}

#[test]
fn repeated_request_keeps_controller_values() {
    let (mut cycle, handle) = active_cycle();
    let request = ModeSwitchRequest::start(cycle.interfaces().unwrap(), InterfaceKind::Velocity);
    cycle.switch_mode(&request).unwrap();
    cycle.set_command("joint3/velocity", 0.3).unwrap();

    // Idempotent: success, no re-initialisation.
    assert_eq!(cycle.switch_mode(&request).unwrap(), ControlMode::Velocity);
    assert_eq!(
        cycle.switch_mode(&ModeSwitchRequest::default()).unwrap(),
        ControlMode::Velocity
    );
    cycle.write().unwrap();
    assert_eq!(handle.last_sent().unwrap().values[2], 0.3);
}

#[test]
fn handle_validates_on_caller_thread_and_commits_between_ticks() {
    let (mut cycle, handle) = active_cycle();
    let switcher = cycle.mode_switch_handle().unwrap();
    let table = cycle.interfaces().unwrap().clone();

    let result = thread::spawn(move || {
        let bad = ModeSwitchRequest::new(
            ["joint1/position", "joint1/velocity"],
            Vec::<&str>::new(),
        );
        assert_eq!(switcher.request(&bad), Err(RejectReason::ConflictingModes));
        switcher.request(&ModeSwitchRequest::start(&table, InterfaceKind::Effort))
    })
    .join()
    .unwrap();
    assert_eq!(result, Ok(ControlMode::Effort));

    // Nothing changes until the control side drains the mailbox.
    assert_eq!(cycle.active_mode(), ControlMode::None);
    cycle.write().unwrap();
    assert!(handle.sent().is_empty());

    assert_eq!(
        cycle.apply_pending_mode_switch().unwrap(),
        Some(ControlMode::Effort)
    );
    cycle.write().unwrap();
    assert_eq!(handle.last_sent().unwrap().mode, ControlMode::Effort);
}

#[test]
fn queued_switch_is_dropped_when_active_mode_moved_on() {
    let (mut cycle, handle) = active_cycle();
    let switcher = cycle.mode_switch_handle().unwrap();
    let table = cycle.interfaces().unwrap().clone();

    // Validated while idle: a bare velocity start is legal from None.
    let queued = switcher.request(&ModeSwitchRequest::start(&table, InterfaceKind::Velocity));
    assert_eq!(queued, Ok(ControlMode::Velocity));

    // Position is committed directly before the control side drains.
    let direct = ModeSwitchRequest::start(&table, InterfaceKind::Position);
    cycle.switch_mode(&direct).unwrap();

    // Velocity without stopping position would be rejected now; the queued
    // transition must not slip through.
    assert_eq!(cycle.apply_pending_mode_switch().unwrap(), None);
    assert_eq!(cycle.active_mode(), ControlMode::Position);

    handle.clear_sent();
    cycle.read().unwrap();
    cycle.write().unwrap();
    assert_eq!(handle.last_sent().unwrap().mode, ControlMode::Position);

    // Mailbox is empty afterwards.
    assert_eq!(cycle.apply_pending_mode_switch().unwrap(), None);
}
