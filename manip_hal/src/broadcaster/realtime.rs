//! Non-blocking single-buffer publisher.
//!
//! One message buffer sits behind a `parking_lot::Mutex`. The producer
//! (control thread) only ever calls [`RealtimePublisher::try_lock`]; when
//! the consumer thread holds the buffer the tick skips publication. The
//! consumer copies the message out under the lock and hands the copy to a
//! [`MessageSink`] after releasing it, so the lock is held for a clone only.
//!
//! At most one message is in flight. A fresh value that the consumer has not
//! yet drained is overwritten by the next one (freshest wins).

use super::sink::MessageSink;
use manip_common::hal::error::HalError;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Consumer wake-up interval when no message arrives.
const CONSUMER_POLL: Duration = Duration::from_millis(100);

struct Slot<T> {
    msg: T,
    fresh: bool,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    running: AtomicBool,
    published: AtomicU64,
    skipped: AtomicU64,
    overwritten: AtomicU64,
}

/// Publication counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Messages handed to the sink.
    pub published: u64,
    /// Producer attempts that found the buffer locked.
    pub skipped: u64,
    /// Fresh messages replaced before the consumer drained them.
    pub overwritten: u64,
}

/// Producer-side handle to the locked message buffer.
///
/// Dropping the guard without [`PublishGuard::unlock_and_publish`] releases
/// the buffer without marking it for publication.
pub struct PublishGuard<'a, T> {
    slot: MutexGuard<'a, Slot<T>>,
    shared: &'a Shared<T>,
}

impl<T> PublishGuard<'_, T> {
    /// Release the buffer and wake the consumer.
    pub fn unlock_and_publish(mut self) {
        if self.slot.fresh {
            self.shared.overwritten.fetch_add(1, Ordering::Relaxed);
        }
        self.slot.fresh = true;
        let shared = self.shared;
        drop(self);
        shared.ready.notify_one();
    }
}

impl<T> Deref for PublishGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.msg
    }
}

impl<T> DerefMut for PublishGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.slot.msg
    }
}

/// Single-buffer publisher with a dedicated consumer thread.
pub struct RealtimePublisher<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
    consumer: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + 'static> RealtimePublisher<T> {
    /// Allocate the buffer with `initial` and start the consumer thread.
    ///
    /// # Errors
    /// `ConfigurationError` if the thread cannot be spawned.
    pub fn new<S>(name: &str, initial: T, sink: S) -> Result<Self, HalError>
    where
        S: MessageSink<T> + 'static,
    {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                msg: initial,
                fresh: false,
            }),
            ready: Condvar::new(),
            running: AtomicBool::new(true),
            published: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            overwritten: AtomicU64::new(0),
        });

        let consumer_shared = Arc::clone(&shared);
        let consumer = thread::Builder::new()
            .name(format!("pub-{name}"))
            .spawn(move || consumer_loop(&consumer_shared, sink))
            .map_err(|e| {
                HalError::ConfigurationError(format!("Failed to spawn publisher thread: {e}"))
            })?;

        debug!("Publisher '{}' started", name);
        Ok(Self {
            shared,
            consumer: Some(consumer),
        })
    }

    /// Try to take the buffer without blocking.
    ///
    /// Returns `None` when the consumer holds it; the caller skips this tick.
    #[inline]
    pub fn try_lock(&self) -> Option<PublishGuard<'_, T>> {
        match self.shared.slot.try_lock() {
            Some(slot) => Some(PublishGuard {
                slot,
                shared: &self.shared,
            }),
            None => {
                self.shared.skipped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Take the buffer, blocking. Setup and tests only, never the control tick.
    pub fn lock(&self) -> PublishGuard<'_, T> {
        PublishGuard {
            slot: self.shared.slot.lock(),
            shared: &self.shared,
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            published: self.shared.published.load(Ordering::Relaxed),
            skipped: self.shared.skipped.load(Ordering::Relaxed),
            overwritten: self.shared.overwritten.load(Ordering::Relaxed),
        }
    }
}

impl<T: Clone + Send + 'static> Drop for RealtimePublisher<T> {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.ready.notify_all();
        if let Some(handle) = self.consumer.take() {
            if handle.join().is_err() {
                warn!("Publisher consumer thread panicked");
            }
        }
    }
}

fn consumer_loop<T: Clone, S: MessageSink<T>>(shared: &Shared<T>, mut sink: S) {
    loop {
        let msg = {
            let mut slot = shared.slot.lock();
            while !slot.fresh && shared.running.load(Ordering::Acquire) {
                shared.ready.wait_for(&mut slot, CONSUMER_POLL);
            }
            if !slot.fresh {
                break;
            }
            slot.fresh = false;
            slot.msg.clone()
        };
        sink.publish(&msg);
        shared.published.fetch_add(1, Ordering::Relaxed);
    }
}
