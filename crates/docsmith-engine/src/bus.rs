//! In-process fan-out of progress events.
//!
//! Subscribers receive events in publish order. When nobody is subscribed,
//! events land in a bounded ring buffer and are flushed to the next
//! subscriber if they are still fresh, so a client that connects moments
//! after a run starts does not miss its beginning. All state sits behind a
//! single mutex; publishing never blocks on a slow subscriber — a full or
//! closed channel drops that subscriber instead.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use docsmith_core::ProgressEvent;

/// How long undelivered events are kept for late subscribers.
pub const BUFFER_TTL: Duration = Duration::from_secs(30);

/// Queued events per subscriber before it is considered stuck.
const SUBSCRIBER_CAPACITY: usize = 256;

/// Upper bound on buffered events while nobody is connected.
const BUFFER_CAPACITY: usize = 512;

struct BufferedEvent {
    inserted: Instant,
    event: ProgressEvent,
}

struct SubscriberHandle {
    id: u64,
    sender: mpsc::Sender<ProgressEvent>,
}

#[derive(Default)]
struct BusState {
    subscribers: Vec<SubscriberHandle>,
    buffer: VecDeque<BufferedEvent>,
    next_id: u64,
}

/// One subscriber's end of the bus.
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<ProgressEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }

    /// Hand out the raw receiver, for bridging into an SSE stream.
    pub fn into_receiver(self) -> mpsc::Receiver<ProgressEvent> {
        self.receiver
    }
}

pub struct ProgressBus {
    state: Mutex<BusState>,
    ttl: Duration,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::with_ttl(BUFFER_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(BusState::default()),
            ttl,
        }
    }

    /// Register a subscriber. It immediately receives a `connected` event
    /// followed by any buffered events that are still within the TTL.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let mut state = self.state.lock().expect("progress bus lock poisoned");

        let _ = sender.try_send(ProgressEvent::connected());

        let now = Instant::now();
        while let Some(buffered) = state.buffer.pop_front() {
            if now.duration_since(buffered.inserted) <= self.ttl {
                let _ = sender.try_send(buffered.event);
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push(SubscriberHandle { id, sender });
        debug!(subscriber = id, "progress subscriber connected");

        Subscription { id, receiver }
    }

    /// Remove a subscriber by id. Safe to call for an id that is already
    /// gone.
    pub fn unsubscribe(&self, id: u64) {
        let mut state = self.state.lock().expect("progress bus lock poisoned");
        state.subscribers.retain(|s| s.id != id);
    }

    /// Deliver `event` to every live subscriber, or buffer it when nobody
    /// is connected. Expired buffer entries are evicted on every publish.
    pub fn publish(&self, event: ProgressEvent) {
        let mut state = self.state.lock().expect("progress bus lock poisoned");

        let now = Instant::now();
        let ttl = self.ttl;
        while state
            .buffer
            .front()
            .is_some_and(|b| now.duration_since(b.inserted) > ttl)
        {
            state.buffer.pop_front();
        }

        if state.subscribers.is_empty() {
            if state.buffer.len() == BUFFER_CAPACITY {
                state.buffer.pop_front();
            }
            state.buffer.push_back(BufferedEvent {
                inserted: now,
                event,
            });
            return;
        }

        // A full or closed channel means the transport stalled or went
        // away; that subscriber is dropped rather than blocking the run.
        state.subscribers.retain(|s| match s.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!(subscriber = s.id, "dropping unresponsive progress subscriber");
                false
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .expect("progress bus lock poisoned")
            .subscribers
            .len()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsmith_core::ProgressEventKind;

    #[tokio::test]
    async fn subscriber_receives_connected_then_published_events() {
        let bus = ProgressBus::new();
        let mut sub = bus.subscribe();

        bus.publish(ProgressEvent::stored("demo", "a.md", 45, "stored a.md"));

        let first = sub.recv().await.unwrap();
        assert_eq!(first.kind, ProgressEventKind::Connected);

        let second = sub.recv().await.unwrap();
        assert_eq!(second.kind, ProgressEventKind::DocumentationStored);
        assert_eq!(second.repo_name.as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn events_for_one_repo_arrive_in_publish_order() {
        let bus = ProgressBus::new();
        let mut sub = bus.subscribe();
        assert_eq!(sub.recv().await.unwrap().kind, ProgressEventKind::Connected);

        for i in 0..5u8 {
            bus.publish(ProgressEvent::stored("demo", format!("f{i}.md"), 20 + i, "stored"));
        }
        for i in 0..5u8 {
            let event = sub.recv().await.unwrap();
            assert_eq!(event.file.as_deref(), Some(format!("f{i}.md").as_str()));
        }
    }

    #[tokio::test]
    async fn buffered_events_flush_to_a_late_subscriber() {
        let bus = ProgressBus::new();

        bus.publish(ProgressEvent::stored("demo", "a.md", 30, "stored"));
        bus.publish(ProgressEvent::complete("demo", Vec::new()));

        let mut sub = bus.subscribe();
        assert_eq!(sub.recv().await.unwrap().kind, ProgressEventKind::Connected);
        assert_eq!(
            sub.recv().await.unwrap().kind,
            ProgressEventKind::DocumentationStored
        );
        assert_eq!(
            sub.recv().await.unwrap().kind,
            ProgressEventKind::DocumentationComplete
        );
    }

    #[tokio::test]
    async fn expired_events_are_not_flushed() {
        let bus = ProgressBus::with_ttl(Duration::from_millis(0));
        bus.publish(ProgressEvent::stored("demo", "a.md", 30, "stored"));

        // TTL of zero: everything buffered is already stale.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut sub = bus.subscribe();
        assert_eq!(sub.recv().await.unwrap().kind, ProgressEventKind::Connected);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_stops_delivery() {
        let bus = ProgressBus::new();
        let sub = bus.subscribe();
        let id = sub.id();
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(id);
        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_publish() {
        let bus = ProgressBus::new();
        let sub = bus.subscribe();
        drop(sub);
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(ProgressEvent::stored("demo", "a.md", 30, "stored"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publishing_with_subscribers_does_not_buffer() {
        let bus = ProgressBus::new();
        let _live = bus.subscribe();
        bus.publish(ProgressEvent::stored("demo", "a.md", 30, "stored"));

        // A later subscriber only sees its own connected handshake.
        let mut late = bus.subscribe();
        assert_eq!(late.recv().await.unwrap().kind, ProgressEventKind::Connected);
        assert!(late.try_recv().is_none());
    }
}
