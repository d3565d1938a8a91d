//! Event hub
//!
//! Named publish/subscribe channels shared by the session, the storage
//! manager and the presentation layer. Subscribers are delivered in
//! insertion order. The registry is an immutable snapshot behind an `Arc`:
//! subscribing clones it, publishing iterates a snapshot with no lock held,
//! and [`EventHub::reset`] swaps in a fresh default registry so callbacks
//! still running from the old one never observe it being torn down.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Event channels exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The emulation core finished loading
    WasmReady,
    /// A frame was produced and pushed to the screen sinks
    FrameUpdate,
    /// The session was shut down
    Shutdown,
    /// A durable save sync was scheduled
    SaveInitiate,
    /// A durable save sync finished
    SaveComplete,
    /// The virtual filesystem is mounted and synced
    Prepared,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::WasmReady,
        Channel::FrameUpdate,
        Channel::Shutdown,
        Channel::SaveInitiate,
        Channel::SaveComplete,
        Channel::Prepared,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::WasmReady => "wasmReady",
            Channel::FrameUpdate => "frameUpdate",
            Channel::Shutdown => "shutdown",
            Channel::SaveInitiate => "saveInitiate",
            Channel::SaveComplete => "saveComplete",
            Channel::Prepared => "prepared",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback handle stored in the registry
pub type Subscriber = Arc<dyn Fn() + Send + Sync>;

/// Channel -> ordered subscriber list
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    channels: HashMap<Channel, Vec<Subscriber>>,
}

impl SubscriberRegistry {
    /// Subscribers of a channel, in delivery order
    pub fn subscribers(&self, channel: Channel) -> &[Subscriber] {
        self.channels
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self, channel: Channel) -> usize {
        self.subscribers(channel).len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.values().all(Vec::is_empty)
    }

    /// Invoke every subscriber of `channel`, returning how many ran
    pub fn notify(&self, channel: Channel) -> usize {
        let subscribers = self.subscribers(channel);
        for subscriber in subscribers {
            subscriber();
        }
        subscribers.len()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for channel in Channel::ALL {
            map.entry(&channel.name(), &self.len(channel));
        }
        map.finish()
    }
}

/// Publish/subscribe hub
#[derive(Default)]
pub struct EventHub {
    registry: RwLock<Arc<SubscriberRegistry>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback to a channel
    pub fn subscribe<F>(&self, channel: Channel, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_arc(channel, Arc::new(callback));
    }

    /// Append an already shared callback to a channel
    pub fn subscribe_arc(&self, channel: Channel, callback: Subscriber) {
        let mut registry = self.registry.write();
        Arc::make_mut(&mut *registry)
            .channels
            .entry(channel)
            .or_default()
            .push(callback);
        tracing::trace!("Subscribed to {}", channel);
    }

    /// Deliver an event to the current subscribers of `channel`
    ///
    /// Returns the number of subscribers invoked.
    pub fn publish(&self, channel: Channel) -> usize {
        let snapshot = self.snapshot();
        let delivered = snapshot.notify(channel);
        tracing::trace!("Published {} to {} subscribers", channel, delivered);
        delivered
    }

    /// Current registry snapshot
    pub fn snapshot(&self) -> Arc<SubscriberRegistry> {
        Arc::clone(&*self.registry.read())
    }

    /// Replace the registry with a fresh default one, returning the old one
    pub fn reset(&self) -> Arc<SubscriberRegistry> {
        let old = std::mem::replace(
            &mut *self.registry.write(),
            Arc::new(SubscriberRegistry::default()),
        );
        tracing::debug!("Event hub reset: {:?}", old);
        old
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.registry.read().len(channel)
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("registry", &*self.registry.read())
            .finish()
    }
}
