//! Integration test: external TCP wrench broadcaster.
//!
//! Publication must never stall the producer, and values read through the
//! hardware cycle must arrive unchanged at the sink.

use super::mock::active_cycle;
use manip_common::hal::config::{AxisNames, BroadcasterConfig, HardwareConfig, InterfaceNames};
use manip_common::hal::error::HalError;
use manip_common::hal::types::{ControlMode, StateSnapshot, Wrench};
use manip_hal::broadcaster::ChannelSink;
use manip_hal::buffers::JointCommandBuffer;
use manip_hal::{ControlLoop, ExternalTcpWrenchBroadcaster, WrenchStamped};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

fn explicit_config() -> BroadcasterConfig {
    let axes = |prefix: &str, quantity: &str| AxisNames {
        x: format!("{prefix}/{quantity}.x"),
        y: format!("{prefix}/{quantity}.y"),
        z: format!("{prefix}/{quantity}.z"),
    };
    BroadcasterConfig {
        sensor_name: String::new(),
        interface_names: InterfaceNames {
            force: axes("external_wrench_in_base", "force"),
            torque: axes("external_wrench_in_base", "torque"),
        },
        frame_id: "base_link".to_string(),
        topic_name: "external_wrench".to_string(),
    }
}

fn configured(config: &BroadcasterConfig) -> (ExternalTcpWrenchBroadcaster, Receiver<WrenchStamped>) {
    let (tx, rx) = mpsc::channel();
    let mut broadcaster = ExternalTcpWrenchBroadcaster::new();
    broadcaster
        .configure(config, ChannelSink::new(tx))
        .expect("configure broadcaster");
    (broadcaster, rx)
}

#[test]
fn publish_never_blocks_on_held_buffer() {
    let (broadcaster, rx) = configured(&explicit_config());
    let publisher = broadcaster.publisher().unwrap();
    let held = publisher.lock();

    const CALLS: u64 = 10_000;
    let start = Instant::now();
    for i in 0..CALLS {
        assert!(!broadcaster.publish_if_ready(i, Wrench::from_array([1.0; 6])));
    }
    let elapsed = start.elapsed();
    drop(held);

    assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");
    assert_eq!(broadcaster.stats().skipped, CALLS);
    assert_eq!(broadcaster.stats().published, 0);
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn explicit_channels_round_trip_through_read() {
    let (mut cycle, link) = active_cycle();
    let (mut broadcaster, rx) = configured(&explicit_config());
    broadcaster.activate(cycle.interfaces().unwrap()).unwrap();

    let mut last_stamp = 0;
    for tick in 1..=50u64 {
        let t = tick as f64;
        let input = [t, 2.0 * t, -t, 0.5 * t, 0.0, -0.25 * t];
        let mut state = StateSnapshot::default();
        state.ext_wrench_in_base = Wrench::from_array(input);
        // Decoys on the other wrench channels.
        state.ext_wrench_in_tcp = Wrench::from_array([99.0; 6]);
        state.ft_sensor_raw = Wrench::from_array([-99.0; 6]);
        link.set_state(state);

        let snapshot = cycle.read().unwrap();
        let stamp = tick * 1_000_000;
        assert!(broadcaster.update(stamp, &snapshot));

        let msg = rx.recv_timeout(Duration::from_secs(2)).expect("message");
        assert_eq!(msg.wrench.to_array(), input);
        assert_eq!(msg.header.frame_id.as_str(), "base_link");
        assert!(msg.header.stamp_ns > last_stamp);
        last_stamp = msg.header.stamp_ns;
    }
}

#[test]
fn partial_explicit_channels_read_zero_elsewhere() {
    let (mut cycle, link) = active_cycle();
    let config = BroadcasterConfig {
        interface_names: InterfaceNames {
            force: AxisNames {
                z: "force_torque_sensor/force.z".to_string(),
                ..AxisNames::default()
            },
            ..InterfaceNames::default()
        },
        ..explicit_config()
    };
    let (mut broadcaster, rx) = configured(&config);
    broadcaster.activate(cycle.interfaces().unwrap()).unwrap();

    let mut state = StateSnapshot::default();
    state.ft_sensor_raw = Wrench::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    link.set_state(state);
    let snapshot = cycle.read().unwrap();
    assert!(broadcaster.update(1, &snapshot));

    let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(msg.wrench.to_array(), [0.0, 0.0, 3.0, 0.0, 0.0, 0.0]);
}

#[test]
fn conflicting_sources_fail_at_configure() {
    let config = BroadcasterConfig {
        sensor_name: "force_torque_sensor".to_string(),
        ..explicit_config()
    };
    let (tx, _rx) = mpsc::channel();
    let mut broadcaster = ExternalTcpWrenchBroadcaster::new();
    assert!(matches!(
        broadcaster.configure(&config, ChannelSink::new(tx)),
        Err(HalError::ConfigurationError(_))
    ));
}

#[test]
fn unknown_channel_fails_at_activate() {
    let (cycle, _link) = active_cycle();
    let mut config = explicit_config();
    config.interface_names.torque.y = "wrist/torque.y".to_string();
    let (mut broadcaster, _rx) = configured(&config);
    assert!(broadcaster.activate(cycle.interfaces().unwrap()).is_err());
}

#[test]
fn control_loop_stamps_increase_per_tick() {
    let (cycle, link) = active_cycle();
    let mut state = StateSnapshot::default();
    state.ext_wrench_in_base = Wrench::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    link.set_state(state);

    let (mut broadcaster, rx) = configured(&explicit_config());
    broadcaster.activate(cycle.interfaces().unwrap()).unwrap();
    let config = HardwareConfig {
        overrun_limit: 0,
        ..HardwareConfig::default()
    };
    let mut control = ControlLoop::new(cycle, Some(broadcaster), &config);

    let mut hook = |_: &StateSnapshot, _: ControlMode, _: &mut JointCommandBuffer| {};
    let stats = control.run(&mut hook, Some(30)).unwrap();
    assert_eq!(stats.cycle_count, 30);
    // The loop deactivated the broadcaster on the way out; dropping it
    // joins the consumer, which closes the channel.
    drop(control);

    let stamps: Vec<u64> = rx.iter().map(|m| m.header.stamp_ns).collect();
    assert!(!stamps.is_empty());
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}
