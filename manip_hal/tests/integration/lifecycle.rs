//! Integration test: hardware cycle lifecycle against a scripted link.
//!
//! Covers configure/activate ordering, mode-gated writes, last-known-good
//! reads, fault escalation and the safe hold on deactivate.

use super::mock::{active_cycle, joint_names, mock_link, sample_state};
use manip_common::config::ConfigLoader;
use manip_common::consts::N_JOINTS;
use manip_common::hal::config::{AppConfig, CommandInitPolicy};
use manip_common::hal::error::HalError;
use manip_common::hal::types::{CommandSet, ControlMode, InterfaceKind};
use manip_hal::{CycleOptions, HardwareCycle, LifecycleState, ModeSwitchRequest};

fn claim(cycle: &mut HardwareCycle, kind: InterfaceKind) {
    let request = ModeSwitchRequest::start(cycle.interfaces().unwrap(), kind);
    cycle.switch_mode(&request).expect("mode switch");
}

// ── Configure / activate ────────────────────────────────────────────

#[test]
fn configure_rejects_wrong_joint_count() {
    let (link, handle) = mock_link();
    let mut cycle = HardwareCycle::new(Box::new(link));

    let mut joints = joint_names();
    joints.push("joint8".to_string());
    let err = cycle.configure(&joints, CycleOptions::default()).unwrap_err();
    assert!(matches!(err, HalError::ConfigurationError(_)));
    assert!(!handle.is_connected());
    assert_eq!(cycle.state(), LifecycleState::Unconfigured);
}

#[test]
fn configure_surfaces_connection_failure() {
    let (link, handle) = mock_link();
    handle.fail_connect(true);
    let mut cycle = HardwareCycle::new(Box::new(link));

    let err = cycle
        .configure(&joint_names(), CycleOptions::default())
        .unwrap_err();
    assert!(matches!(err, HalError::ConfigurationError(_)));
    assert!(err.to_string().contains("robot unreachable"));
    assert_eq!(cycle.state(), LifecycleState::Unconfigured);
}

#[test]
fn activate_requires_configure() {
    let (link, _handle) = mock_link();
    let mut cycle = HardwareCycle::new(Box::new(link));
    assert!(matches!(cycle.activate(), Err(HalError::ActivationError(_))));
}

#[test]
fn options_follow_config_file() {
    let config = AppConfig::from_toml_str(
        r#"
[hardware]
command_init = "zero"
fault_threshold = 7
"#,
    )
    .unwrap();
    let options = CycleOptions::from(&config.hardware);
    assert_eq!(options.command_init, CommandInitPolicy::Zero);
    assert_eq!(options.fault_threshold, 7);
}

// ── Writes follow the active mode ───────────────────────────────────

#[test]
fn write_without_mode_sends_nothing() {
    let (mut cycle, handle) = active_cycle();
    for _ in 0..5 {
        cycle.read().unwrap();
        cycle.write().unwrap();
    }
    assert!(handle.sent().is_empty());
}

#[test]
fn write_transmits_only_active_mode_values() {
    let (mut cycle, handle) = active_cycle();
    cycle.read().unwrap();
    claim(&mut cycle, InterfaceKind::Position);
    assert_eq!(cycle.active_mode(), ControlMode::Position);

    // Stale values in inactive modes must never reach the robot.
    cycle.set_command("joint1/velocity", 9.0).unwrap();
    cycle.set_command("joint1/effort", -9.0).unwrap();
    cycle.set_command("joint5/position", 1.25).unwrap();
    cycle.write().unwrap();

    let sent = handle.last_sent().unwrap();
    assert_eq!(sent.mode, ControlMode::Position);
    let mut expected = sample_state().positions;
    expected[4] = 1.25;
    assert_eq!(sent.values, expected);
    assert!(handle.sent().iter().all(|c| c.mode == ControlMode::Position));
}

#[test]
fn zero_policy_seeds_commands_with_zero() {
    let (link, handle) = mock_link();
    handle.set_state(sample_state());
    let mut cycle = HardwareCycle::new(Box::new(link));
    let options = CycleOptions {
        command_init: CommandInitPolicy::Zero,
        ..CycleOptions::default()
    };
    cycle.configure(&joint_names(), options).unwrap();
    cycle.activate().unwrap();

    claim(&mut cycle, InterfaceKind::Effort);
    cycle.write().unwrap();
    assert_eq!(
        handle.last_sent(),
        Some(CommandSet {
            mode: ControlMode::Effort,
            values: [0.0; N_JOINTS],
        })
    );
}

#[test]
fn non_finite_command_is_never_sent() {
    let (mut cycle, handle) = active_cycle();
    claim(&mut cycle, InterfaceKind::Velocity);
    cycle.set_command("joint7/velocity", f64::INFINITY).unwrap();

    assert!(matches!(cycle.write(), Err(HalError::InvalidCommand { joint: 6 })));
    assert!(handle.sent().is_empty());
    assert_eq!(cycle.state(), LifecycleState::Active);
}

// ── Last-known-good and fault escalation ────────────────────────────

#[test]
fn read_fault_keeps_last_known_good_snapshot() {
    let (mut cycle, handle) = active_cycle();
    let good = cycle.read().unwrap();
    let sequence = cycle.state_buffer().sequence();

    let mut changed = sample_state();
    changed.positions = [7.0; N_JOINTS];
    handle.set_state(changed);
    handle.fail_reads(true);

    let err = cycle.read().unwrap_err();
    assert!(err.is_link_fault());
    assert_eq!(cycle.snapshot(), &good);
    assert_eq!(cycle.state_buffer().sequence(), sequence);
    assert_eq!(cycle.state_value("joint1/position"), Some(good.positions[0]));
}

#[test]
fn repeated_faults_escalate_to_faulted() {
    let (mut cycle, handle) = active_cycle();
    claim(&mut cycle, InterfaceKind::Position);
    handle.fail_reads(true);

    assert!(cycle.read().is_err());
    assert!(cycle.read().is_err());
    assert_eq!(cycle.state(), LifecycleState::Active);
    assert_eq!(cycle.consecutive_faults(), 2);

    assert!(cycle.read().is_err());
    assert_eq!(cycle.state(), LifecycleState::Faulted);
    assert_eq!(cycle.active_mode(), ControlMode::None);

    // No silent recovery.
    handle.fail_reads(false);
    assert!(matches!(cycle.read(), Err(HalError::InvalidState { .. })));
    assert!(cycle.activate().is_err());

    cycle
        .configure(&joint_names(), CycleOptions::default())
        .unwrap();
    assert_eq!(cycle.state(), LifecycleState::Configured);
    cycle.activate().unwrap();
    assert!(cycle.read().is_ok());
}

#[test]
fn mixed_read_and_write_faults_count_together() {
    let (mut cycle, handle) = active_cycle();
    claim(&mut cycle, InterfaceKind::Position);

    handle.fail_reads(true);
    assert!(cycle.read().is_err());
    handle.fail_reads(false);
    handle.fail_writes(true);
    cycle.read().unwrap();
    assert_eq!(cycle.consecutive_faults(), 0);

    assert!(cycle.write().is_err());
    assert!(cycle.write().is_err());
    assert!(cycle.write().is_err());
    assert_eq!(cycle.state(), LifecycleState::Faulted);
    assert_eq!(cycle.total_faults(), 4);
}

// ── Safe hold on deactivate ─────────────────────────────────────────

#[test]
fn deactivate_in_position_mode_holds_measured_position() {
    let (mut cycle, handle) = active_cycle();
    cycle.read().unwrap();
    claim(&mut cycle, InterfaceKind::Position);

    // Arbitrary in-flight target.
    for j in 0..N_JOINTS {
        cycle.set_command(&format!("joint{}/position", j + 1), 3.0).unwrap();
    }
    cycle.write().unwrap();
    assert_eq!(handle.last_sent().unwrap().values, [3.0; N_JOINTS]);

    cycle.deactivate().unwrap();
    assert_eq!(
        handle.last_sent(),
        Some(CommandSet::hold_position(sample_state().positions))
    );
    assert_eq!(cycle.state(), LifecycleState::Stopped);
    assert_eq!(cycle.active_mode(), ControlMode::None);
    assert!(!handle.is_connected());
}

#[test]
fn deactivate_in_velocity_mode_sends_zero_velocity() {
    let (mut cycle, handle) = active_cycle();
    claim(&mut cycle, InterfaceKind::Velocity);
    cycle.set_command("joint2/velocity", 0.8).unwrap();
    cycle.write().unwrap();

    cycle.deactivate().unwrap();
    assert_eq!(handle.last_sent(), Some(CommandSet::zero_velocity()));
}

#[test]
fn deactivate_without_mode_still_holds() {
    let (mut cycle, handle) = active_cycle();
    cycle.deactivate().unwrap();
    assert_eq!(handle.sent().len(), 1);
    assert_eq!(handle.last_sent().unwrap().mode, ControlMode::Position);
    assert_eq!(handle.disconnects(), 1);
}

#[test]
fn failed_safe_hold_faults_the_cycle() {
    let (mut cycle, handle) = active_cycle();
    claim(&mut cycle, InterfaceKind::Effort);
    handle.fail_writes(true);

    assert!(cycle.deactivate().unwrap_err().is_link_fault());
    assert_eq!(cycle.state(), LifecycleState::Faulted);
}

#[test]
fn stopped_cycle_can_be_reconfigured() {
    let (mut cycle, handle) = active_cycle();
    cycle.stop().unwrap();
    assert_eq!(cycle.state(), LifecycleState::Stopped);
    // Stop is idempotent.
    cycle.stop().unwrap();

    cycle
        .configure(&joint_names(), CycleOptions::default())
        .unwrap();
    cycle.activate().unwrap();
    assert!(handle.is_connected());
    assert_eq!(cycle.read().unwrap(), sample_state());
}

#[test]
fn dropping_an_active_cycle_holds_and_releases() {
    let (mut cycle, handle) = active_cycle();
    claim(&mut cycle, InterfaceKind::Velocity);
    cycle.set_command("joint2/velocity", 0.8).unwrap();
    cycle.write().unwrap();

    drop(cycle);
    assert_eq!(handle.last_sent(), Some(CommandSet::zero_velocity()));
    assert!(!handle.is_connected());
    assert_eq!(handle.disconnects(), 1);
}

#[test]
fn dropping_a_stopped_cycle_sends_nothing_more() {
    let (mut cycle, handle) = active_cycle();
    cycle.stop().unwrap();
    let sent = handle.sent().len();

    drop(cycle);
    assert_eq!(handle.sent().len(), sent);
    assert_eq!(handle.disconnects(), 1);
}
