//! External TCP wrench broadcaster.
//!
//! Reads six force/torque components from the hardware's state channels each
//! tick and hands them to a [`RealtimePublisher`] without blocking.
//!
//! Lifecycle: `configure` → `activate` → `update`* → `deactivate`.

use super::realtime::{PublisherStats, RealtimePublisher};
use super::sink::MessageSink;
use manip_common::consts::{MAX_FRAME_ID_LEN, WRENCH_COMPONENTS};
use manip_common::hal::config::{BroadcasterConfig, ResolvedBroadcasterConfig};
use manip_common::hal::error::HalError;
use manip_common::hal::interfaces::{InterfaceTable, StateChannel};
use manip_common::hal::types::{StateSnapshot, Wrench};
use serde::Serialize;
use tracing::{debug, info};

/// Message header: stamp and frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Header {
    /// Monotonic stamp [ns].
    pub stamp_ns: u64,
    /// Frame the wrench is expressed in.
    pub frame_id: heapless::String<MAX_FRAME_ID_LEN>,
}

/// Timestamped, frame-tagged wrench.
///
/// Allocated once at configure; only `stamp_ns` and `wrench` change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WrenchStamped {
    /// Stamp and frame.
    pub header: Header,
    /// Force [N] and torque [Nm].
    pub wrench: Wrench,
}

/// Republishes the estimated external wrench at the TCP.
#[derive(Default)]
pub struct ExternalTcpWrenchBroadcaster {
    config: Option<ResolvedBroadcasterConfig>,
    publisher: Option<RealtimePublisher<WrenchStamped>>,
    channels: Option<[Option<StateChannel>; WRENCH_COMPONENTS]>,
}

impl ExternalTcpWrenchBroadcaster {
    /// Unconfigured broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate parameters, allocate the message and start the consumer.
    ///
    /// Any previous configuration is dropped first, so a failed call leaves
    /// the broadcaster unconfigured.
    ///
    /// # Errors
    /// `ConfigurationError` on an invalid source selection, a missing
    /// `frame_id`/`topic_name`, or if the publisher cannot start.
    pub fn configure<S>(&mut self, config: &BroadcasterConfig, sink: S) -> Result<(), HalError>
    where
        S: MessageSink<WrenchStamped> + 'static,
    {
        // Dropping the publisher joins the previous consumer.
        self.channels = None;
        self.publisher = None;
        self.config = None;

        let resolved = config.resolve()?;
        let frame_id: heapless::String<MAX_FRAME_ID_LEN> =
            heapless::String::try_from(resolved.frame_id.as_str()).map_err(|_| {
                HalError::ConfigurationError(format!(
                    "'frame_id' longer than {MAX_FRAME_ID_LEN} bytes"
                ))
            })?;

        let publisher = RealtimePublisher::new(&resolved.topic_name, WrenchStamped::default(), sink)?;
        publisher.lock().header.frame_id = frame_id;

        info!(
            "Wrench broadcaster configured: source={:?}, frame_id={}, topic={}",
            resolved.source, resolved.frame_id, resolved.topic_name
        );
        self.publisher = Some(publisher);
        self.config = Some(resolved);
        Ok(())
    }

    /// Resolve the configured channel names against `table`.
    ///
    /// # Errors
    /// `ConfigurationError` if not configured or a name is not exported.
    pub fn activate(&mut self, table: &InterfaceTable) -> Result<(), HalError> {
        let config = self.config.as_ref().ok_or_else(|| {
            HalError::ConfigurationError("broadcaster activated before configure".to_string())
        })?;

        let names = config.source.channel_names();
        let mut channels = [None; WRENCH_COMPONENTS];
        for (slot, name) in channels.iter_mut().zip(&names) {
            if let Some(name) = name {
                let channel = table.state_channel(name).ok_or_else(|| {
                    HalError::ConfigurationError(format!("unknown state interface '{name}'"))
                })?;
                *slot = Some(channel);
            }
        }

        self.channels = Some(channels);
        info!("Wrench broadcaster active");
        Ok(())
    }

    /// Release resolved channels. Further `update` calls publish nothing.
    pub fn deactivate(&mut self) {
        if self.channels.take().is_some() {
            info!("Wrench broadcaster inactive");
        }
    }

    /// Read the six components from `snapshot` and try to publish them.
    ///
    /// Returns true if the message was handed over this tick.
    #[inline]
    pub fn update(&self, stamp_ns: u64, snapshot: &StateSnapshot) -> bool {
        let Some(channels) = &self.channels else {
            return false;
        };
        let mut values = [0.0; WRENCH_COMPONENTS];
        for (value, channel) in values.iter_mut().zip(channels) {
            if let Some(channel) = channel {
                *value = channel.read(snapshot);
            }
        }
        self.publish_if_ready(stamp_ns, Wrench::from_array(values))
    }

    /// Overwrite the message in place if the buffer is free; skip otherwise.
    #[inline]
    pub fn publish_if_ready(&self, stamp_ns: u64, wrench: Wrench) -> bool {
        let Some(publisher) = &self.publisher else {
            return false;
        };
        match publisher.try_lock() {
            Some(mut msg) => {
                msg.header.stamp_ns = stamp_ns;
                msg.wrench = wrench;
                msg.unlock_and_publish();
                true
            }
            None => {
                debug!("Wrench buffer busy, publication skipped");
                false
            }
        }
    }

    /// True between `activate` and `deactivate`.
    pub fn is_active(&self) -> bool {
        self.channels.is_some()
    }

    /// Configured output sink name.
    pub fn topic_name(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.topic_name.as_str())
    }

    /// Configured frame identifier.
    pub fn frame_id(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.frame_id.as_str())
    }

    /// Publisher counters (zero before configure).
    pub fn stats(&self) -> PublisherStats {
        self.publisher
            .as_ref()
            .map(RealtimePublisher::stats)
            .unwrap_or_default()
    }

    /// Underlying publisher, for callers that need the raw lock.
    pub fn publisher(&self) -> Option<&RealtimePublisher<WrenchStamped>> {
        self.publisher.as_ref()
    }
}
