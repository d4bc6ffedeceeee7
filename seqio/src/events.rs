//! Device events
//!
//! A device announces what happens to it through an [`EventHub`]. Observers
//! subscribe and get a `tokio::sync::broadcast` receiver; every subscriber
//! sees every event emitted after it subscribed.
//!
//! The hub is cheap to clone and can be handed to other threads or tasks,
//! while the device itself stays confined to its owner:
//!
//! ```
//! use seqio::{Device, DeviceEvent, MemoryBackend, OpenMode};
//!
//! let mut device = Device::new(MemoryBackend::new());
//! let mut events = device.events().subscribe();
//!
//! device.open(OpenMode::WRITE_ONLY);
//! device.write(b"abc");
//! device.close();
//!
//! assert_eq!(events.try_recv().unwrap(), DeviceEvent::BytesWritten(3));
//! ```
//!
//! Emitting never blocks. A subscriber that falls more than `capacity`
//! events behind observes `RecvError::Lagged` and continues from the oldest
//! retained event.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// What happened to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// New data is available on the current read channel
    ReadyRead,
    /// New data is available on the given read channel
    ChannelReadyRead(usize),
    /// Bytes were written on the current write channel
    BytesWritten(i64),
    /// Bytes were written on the given write channel
    ChannelBytesWritten { channel: usize, bytes: i64 },
    /// The device is about to close; buffers are still intact
    AboutToClose,
    /// No more data will arrive on the read side
    ReadChannelFinished,
}

struct InnerState {
    sender: Option<broadcast::Sender<DeviceEvent>>,
    capacity: usize,
    debug_hint: String,
}

/// Shared emitter for [`DeviceEvent`]s
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<Mutex<InnerState>>,
}

impl EventHub {
    /// Create a hub whose subscribers buffer at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize, debug_hint: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InnerState {
                sender: None,
                capacity: capacity.max(1),
                debug_hint: debug_hint.to_string(),
            })),
        }
    }

    /// Subscribe to all events emitted from now on.
    ///
    /// Drop the receiver to unsubscribe.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        let mut state = self.inner.lock();
        let capacity = state.capacity;
        state
            .sender
            .get_or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .sender
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    pub fn emit(&self, event: DeviceEvent) {
        let state = self.inner.lock();
        let Some(sender) = state.sender.as_ref() else {
            return;
        };
        if let Err(e) = sender.send(event) {
            log::debug!(
                "events.emit: no subscribers left (hint: {}): {}",
                state.debug_hint,
                e
            );
        }
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("EventHub")
            .field("debug_hint", &state.debug_hint)
            .field("capacity", &state.capacity)
            .field(
                "subscribers",
                &state.sender.as_ref().map_or(0, broadcast::Sender::receiver_count),
            )
            .finish()
    }
}
