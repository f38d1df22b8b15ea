use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const ADMIN_CHANNEL: &str = "admin";

pub const EVENT_ATTEMPT_STARTED: &str = "attempt-started";
pub const EVENT_ANSWER_SUBMITTED: &str = "answer-submitted";
pub const EVENT_ATTEMPT_COMPLETED: &str = "attempt-completed";

pub fn attempt_channel(attempt_id: Uuid) -> String {
    format!("attempt-{}", attempt_id)
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundEvent {
    pub event: String,
    pub payload: JsonValue,
}

/// In-process fan-out over named channels. Delivery is at-most-once and
/// best-effort: bounded buffers, lagging subscribers skip ahead, no replay.
/// Observers that reconnect re-fetch current state through the read
/// endpoints.
#[derive(Clone)]
pub struct Broadcaster {
    capacity: usize,
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<OutboundEvent>>>>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribing creates the channel when it does not exist yet.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<OutboundEvent> {
        let mut channels = self.channels.write().expect("broadcaster lock poisoned");
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Never blocks and never fails the caller. An event published to a
    /// channel nobody listens on is dropped, and the dead channel is pruned.
    pub fn publish(&self, channel: &str, event: &str, payload: JsonValue) {
        let sender = {
            let channels = self.channels.read().expect("broadcaster lock poisoned");
            channels.get(channel).cloned()
        };
        let Some(sender) = sender else {
            return;
        };

        let outbound = OutboundEvent {
            event: event.to_string(),
            payload,
        };
        if sender.send(outbound).is_err() {
            let mut channels = self.channels.write().expect("broadcaster lock poisoned");
            if channels
                .get(channel)
                .map_or(false, |s| s.receiver_count() == 0)
            {
                channels.remove(channel);
            }
            tracing::debug!("Dropped event {} on channel {}: no subscribers", event, channel);
        }
    }

    /// Drops every channel with no remaining receivers, returning how many
    /// were reclaimed. A terminal attempt never publishes again, so its
    /// channel cannot be pruned by a failed send; the sweeper calls this on
    /// every tick to reclaim channels whose watchers have hung up.
    pub fn prune_idle(&self) -> usize {
        let mut channels = self.channels.write().expect("broadcaster lock poisoned");
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().expect("broadcaster lock poisoned");
        channels.get(channel).map_or(0, |s| s.receiver_count())
    }

    pub fn channel_count(&self) -> usize {
        let channels = self.channels.read().expect("broadcaster lock poisoned");
        channels.len()
    }
}
