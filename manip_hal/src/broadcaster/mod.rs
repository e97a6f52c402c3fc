//! Sensor broadcasting off the control thread.
//!
//! - [`realtime`] - single-buffer publisher whose producer side never blocks
//! - [`sink`] - where drained messages go
//! - [`wrench`] - external TCP wrench broadcaster built on the two

pub mod realtime;
pub mod sink;
pub mod wrench;

pub use realtime::{PublishGuard, PublisherStats, RealtimePublisher};
pub use sink::{ChannelSink, JsonLinesSink, LogSink, MessageSink};
pub use wrench::{ExternalTcpWrenchBroadcaster, Header, WrenchStamped};
