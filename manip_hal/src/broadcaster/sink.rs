//! Publication sinks drained by the publisher's consumer thread.

use serde::Serialize;
use std::fmt::Debug;
use std::io::{self, Write};
use std::sync::mpsc::Sender;
use tracing::{debug, warn};

/// Destination for messages drained from a `RealtimePublisher`.
///
/// Runs on the consumer thread only; may block or allocate.
pub trait MessageSink<T>: Send {
    /// Deliver one message.
    fn publish(&mut self, msg: &T);
}

impl<T> MessageSink<T> for Box<dyn MessageSink<T>> {
    fn publish(&mut self, msg: &T) {
        (**self).publish(msg);
    }
}

/// Emits each message as a `tracing` debug event.
#[derive(Debug, Clone)]
pub struct LogSink {
    topic: String,
}

impl LogSink {
    /// Sink tagging every event with `topic`.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

impl<T: Debug> MessageSink<T> for LogSink {
    fn publish(&mut self, msg: &T) {
        debug!(topic = %self.topic, "{:?}", msg);
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    failed: bool,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<io::Stdout> {
    /// Sink writing to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<T: Serialize, W: Write + Send> MessageSink<T> for JsonLinesSink<W> {
    fn publish(&mut self, msg: &T) {
        let result = serde_json::to_writer(&mut self.writer, msg)
            .map_err(io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush());
        match result {
            Ok(()) => self.failed = false,
            Err(e) => {
                // Warn once per failure streak.
                if !self.failed {
                    warn!("JSON sink write failed: {}", e);
                }
                self.failed = true;
            }
        }
    }
}

/// Forwards clones into an mpsc channel. A closed receiver drops silently.
#[derive(Debug, Clone)]
pub struct ChannelSink<T> {
    tx: Sender<T>,
}

impl<T> ChannelSink<T> {
    /// Sink feeding `tx`.
    pub fn new(tx: Sender<T>) -> Self {
        Self { tx }
    }
}

impl<T: Clone + Send> MessageSink<T> for ChannelSink<T> {
    fn publish(&mut self, msg: &T) {
        let _ = self.tx.send(msg.clone());
    }
}
