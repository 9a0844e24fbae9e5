use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use mercury_types::{Event, Topic};

use crate::error::BusError;

/// One registered handler and its delivery queue
struct Subscriber {
    id: u64,

    /// Cleared on unsubscribe; the worker drops anything still queued
    active: Arc<AtomicBool>,

    /// Queue drained by the subscriber's worker thread
    tx: mpsc::UnboundedSender<Arc<Event>>,
}

/// Subscriber list for one topic
///
/// Copy-on-write: publishers clone the `Arc` and iterate a snapshot, writers
/// replace the whole list.
#[derive(Default)]
struct Subject {
    subscribers: RwLock<Arc<Vec<Arc<Subscriber>>>>,
}

impl Subject {
    fn snapshot(&self) -> Arc<Vec<Arc<Subscriber>>> {
        Arc::clone(&self.subscribers.read())
    }

    fn insert(&self, subscriber: Arc<Subscriber>) {
        let mut guard = self.subscribers.write();
        let mut next: Vec<_> = guard.iter().cloned().collect();
        next.push(subscriber);
        *guard = Arc::new(next);
    }

    fn remove(&self, id: u64) -> Option<Arc<Subscriber>> {
        let mut guard = self.subscribers.write();
        let pos = guard.iter().position(|s| s.id == id)?;
        let mut next: Vec<_> = guard.iter().cloned().collect();
        let removed = next.remove(pos);
        *guard = Arc::new(next);
        Some(removed)
    }
}

struct BusInner {
    /// All topics, created once at construction
    subjects: HashMap<Topic, Subject>,

    /// Next subscription ID
    next_id: AtomicU64,

    /// Total events accepted by `publish`
    published: AtomicU64,
}

impl BusInner {
    fn subject(&self, topic: Topic) -> &Subject {
        // Every topic is registered in `EventBus::new`
        &self.subjects[&topic]
    }

    fn unsubscribe(&self, topic: Topic, id: u64) -> bool {
        match self.subject(topic).remove(id) {
            Some(subscriber) => {
                subscriber.active.store(false, Ordering::SeqCst);
                tracing::debug!(topic = %topic, id, "subscriber removed");
                true
            }
            None => false,
        }
    }
}

/// Process-wide publish/subscribe registry keyed by [`Topic`]
///
/// Every subscriber gets its own queue and worker thread, so `publish` never
/// runs handler code and never waits on a slow or failing handler. Events
/// reach each handler in publish order, exactly once.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus with every topic registered and no subscribers
    pub fn new() -> Self {
        let subjects = Topic::ALL
            .iter()
            .map(|topic| (*topic, Subject::default()))
            .collect();

        Self {
            inner: Arc::new(BusInner {
                subjects,
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Publish `event` on `topic`
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, topic: Topic, event: Event) -> Result<usize, BusError> {
        let actual = event.topic();
        if actual != topic {
            return Err(BusError::TopicMismatch { topic, actual });
        }

        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let event = Arc::new(event);
        let subscribers = self.inner.subject(topic).snapshot();
        let mut queued = 0;
        for subscriber in subscribers.iter() {
            if !subscriber.active.load(Ordering::SeqCst) {
                continue;
            }
            if subscriber.tx.send(Arc::clone(&event)).is_ok() {
                queued += 1;
            }
        }

        tracing::trace!(topic = %topic, subscribers = queued, "event published");
        Ok(queued)
    }

    /// Publish `event` on the topic its payload belongs to
    pub fn emit(&self, event: Event) -> usize {
        let topic = event.topic();
        // The topic is derived from the payload, so it always matches
        self.publish(topic, event).unwrap_or(0)
    }

    /// Register `handler` for every event published on `topic` from now on
    ///
    /// The handler runs on a dedicated thread. A panic inside the handler is
    /// logged and the handler keeps receiving later events.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Result<Subscription, BusError>
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));

        std::thread::Builder::new()
            .name(format!("bus-{}-{}", topic, id))
            .spawn({
                let active = Arc::clone(&active);
                move || run_subscriber(topic, id, rx, active, handler)
            })?;

        self.inner
            .subject(topic)
            .insert(Arc::new(Subscriber { id, active, tx }));

        tracing::debug!(topic = %topic, id, "subscriber added");

        Ok(Subscription {
            id,
            topic,
            bus: Arc::downgrade(&self.inner),
        })
    }

    /// Register one cloned handler on every topic
    ///
    /// All or nothing: when one topic fails, the ones already registered are
    /// removed again.
    pub fn subscribe_all<F>(&self, handler: F) -> Result<Vec<Subscription>, BusError>
    where
        F: FnMut(&Event) + Clone + Send + 'static,
    {
        subscribe_each(&Topic::ALL, |topic| self.subscribe(topic, handler.clone()))
    }

    /// Remove a subscription. Returns false if it was already removed.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inner.unsubscribe(subscription.topic, subscription.id)
    }

    /// Number of live subscribers on `topic`
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner.subject(topic).snapshot().len()
    }

    /// Total events accepted since the bus was created
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers: usize = Topic::ALL
            .iter()
            .map(|topic| self.subscriber_count(*topic))
            .sum();
        f.debug_struct("EventBus")
            .field("topics", &self.inner.subjects.len())
            .field("subscribers", &subscribers)
            .field("published", &self.published_count())
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Dropping the handle does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    topic: Topic,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Remove this subscription from its bus
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.unsubscribe(self.topic, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner").finish_non_exhaustive()
    }
}

/// Subscribe every topic in `topics`, rolling back on the first failure
fn subscribe_each<S>(topics: &[Topic], mut subscribe: S) -> Result<Vec<Subscription>, BusError>
where
    S: FnMut(Topic) -> Result<Subscription, BusError>,
{
    let mut subscriptions = Vec::with_capacity(topics.len());
    for topic in topics {
        match subscribe(*topic) {
            Ok(subscription) => subscriptions.push(subscription),
            Err(err) => {
                for subscription in &subscriptions {
                    subscription.unsubscribe();
                }
                tracing::warn!(
                    topic = %topic,
                    rolled_back = subscriptions.len(),
                    error = %err,
                    "subscribe to every topic failed"
                );
                return Err(err);
            }
        }
    }
    Ok(subscriptions)
}

/// Worker loop: deliver queued events until the queue closes or the
/// subscription is removed
fn run_subscriber<F>(
    topic: Topic,
    id: u64,
    mut rx: mpsc::UnboundedReceiver<Arc<Event>>,
    active: Arc<AtomicBool>,
    mut handler: F,
) where
    F: FnMut(&Event),
{
    while let Some(event) = rx.blocking_recv() {
        if !active.load(Ordering::SeqCst) {
            break;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
        if let Err(payload) = result {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(topic = %topic, id, %reason, "subscriber handler panicked");
        }
    }
    tracing::trace!(topic = %topic, id, "subscriber worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercury_types::Payload;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn joined(nickname: &str) -> Event {
        Event::new(Payload::PlayerJoined {
            nickname: nickname.to_string(),
        })
    }

    fn nickname(event: &Event) -> String {
        event.payload.nickname().unwrap_or_default().to_string()
    }

    #[test]
    fn test_fan_out_to_every_subscriber() {
        let bus = EventBus::new();
        let (tx_a, rx_a) = std_mpsc::channel();
        let (tx_b, rx_b) = std_mpsc::channel();
        bus.subscribe(Topic::PlayerJoined, move |e| tx_a.send(nickname(e)).unwrap())
            .unwrap();
        bus.subscribe(Topic::PlayerJoined, move |e| tx_b.send(nickname(e)).unwrap())
            .unwrap();

        let queued = bus.publish(Topic::PlayerJoined, joined("PlayerOne")).unwrap();
        assert_eq!(queued, 2);
        assert_eq!(rx_a.recv_timeout(WAIT).unwrap(), "PlayerOne");
        assert_eq!(rx_b.recv_timeout(WAIT).unwrap(), "PlayerOne");
    }

    #[test]
    fn test_delivery_in_publish_order() {
        let bus = EventBus::new();
        let (tx, rx) = std_mpsc::channel();
        bus.subscribe(Topic::PlayerJoined, move |e| tx.send(nickname(e)).unwrap())
            .unwrap();

        for i in 0..50 {
            bus.emit(joined(&format!("p{}", i)));
        }
        for i in 0..50 {
            assert_eq!(rx.recv_timeout(WAIT).unwrap(), format!("p{}", i));
        }
    }

    #[test]
    fn test_topic_mismatch_rejected() {
        let bus = EventBus::new();
        let err = bus.publish(Topic::PlayerLeft, joined("x")).unwrap_err();
        assert!(matches!(err, BusError::TopicMismatch { .. }));
        assert_eq!(bus.published_count(), 0);
    }

    #[test]
    fn test_other_topics_not_delivered() {
        let bus = EventBus::new();
        let (tx, rx) = std_mpsc::channel();
        bus.subscribe(Topic::PlayerLeft, move |e| tx.send(nickname(e)).unwrap())
            .unwrap();

        assert_eq!(bus.emit(joined("PlayerOne")), 0);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_late_subscriber_gets_no_history() {
        let bus = EventBus::new();
        for i in 0..5 {
            bus.emit(joined(&format!("old{}", i)));
        }

        let (tx, rx) = std_mpsc::channel();
        bus.subscribe(Topic::PlayerJoined, move |e| tx.send(nickname(e)).unwrap())
            .unwrap();
        bus.emit(joined("new"));

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "new");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus = EventBus::new();
        let (tx_bad, rx_bad) = std_mpsc::channel();
        let (tx_good, rx_good) = std_mpsc::channel();

        bus.subscribe(Topic::PlayerJoined, move |e| {
            let name = nickname(e);
            if name == "boom" {
                panic!("handler failure");
            }
            tx_bad.send(name).unwrap();
        })
        .unwrap();
        bus.subscribe(Topic::PlayerJoined, move |e| tx_good.send(nickname(e)).unwrap())
            .unwrap();

        bus.emit(joined("boom"));
        bus.emit(joined("after"));

        assert_eq!(rx_good.recv_timeout(WAIT).unwrap(), "boom");
        assert_eq!(rx_good.recv_timeout(WAIT).unwrap(), "after");
        // The failing handler keeps receiving later events
        assert_eq!(rx_bad.recv_timeout(WAIT).unwrap(), "after");
    }

    #[test]
    fn test_slow_handler_does_not_block_publisher() {
        let bus = EventBus::new();
        let (tx, rx) = std_mpsc::channel();
        bus.subscribe(Topic::PlayerJoined, |_| std::thread::sleep(Duration::from_millis(500)))
            .unwrap();
        bus.subscribe(Topic::PlayerJoined, move |e| tx.send(nickname(e)).unwrap())
            .unwrap();

        let started = std::time::Instant::now();
        for i in 0..10 {
            bus.emit(joined(&format!("p{}", i)));
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        for i in 0..10 {
            assert_eq!(rx.recv_timeout(WAIT).unwrap(), format!("p{}", i));
        }
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (tx, rx) = std_mpsc::channel();
        let sub = bus
            .subscribe(Topic::PlayerJoined, move |e| tx.send(nickname(e)).unwrap())
            .unwrap();

        bus.emit(joined("before"));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "before");

        assert!(bus.unsubscribe(&sub));
        assert!(!sub.unsubscribe());
        assert_eq!(bus.subscriber_count(Topic::PlayerJoined), 0);

        assert_eq!(bus.emit(joined("after")), 0);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_unsubscribe_during_fan_out() {
        let bus = EventBus::new();
        let (tx, rx) = std_mpsc::channel();

        // The first handler removes the second one while events are in flight
        let victim = Arc::new(parking_lot::Mutex::new(None::<Subscription>));
        let victim_slot = Arc::clone(&victim);
        bus.subscribe(Topic::PlayerJoined, move |_| {
            if let Some(sub) = victim_slot.lock().take() {
                sub.unsubscribe();
            }
        })
        .unwrap();
        let sub = bus
            .subscribe(Topic::PlayerJoined, move |e| {
                let _ = tx.send(nickname(e));
            })
            .unwrap();
        *victim.lock() = Some(sub);

        bus.emit(joined("first"));
        // Wait until the removal has happened
        let deadline = std::time::Instant::now() + WAIT;
        while bus.subscriber_count(Topic::PlayerJoined) != 1 {
            assert!(std::time::Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(bus.emit(joined("second")), 1);
        let received: Vec<String> = rx.try_iter().collect();
        assert!(!received.contains(&"second".to_string()));
        std::thread::sleep(Duration::from_millis(100));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscribe_all_registers_every_topic() {
        let bus = EventBus::new();
        let subs = bus.subscribe_all(|_| {}).unwrap();
        assert_eq!(subs.len(), Topic::ALL.len());
        for topic in Topic::ALL {
            assert_eq!(bus.subscriber_count(topic), 1);
        }
    }

    #[test]
    fn test_failed_subscribe_all_leaves_nothing_registered() {
        let bus = EventBus::new();
        let failing = Topic::ALL[3];

        let result = subscribe_each(&Topic::ALL, |topic| {
            if topic == failing {
                return Err(BusError::Spawn(std::io::Error::other("no more threads")));
            }
            bus.subscribe(topic, |_| {})
        });

        assert!(matches!(result, Err(BusError::Spawn(_))));
        for topic in Topic::ALL {
            assert_eq!(bus.subscriber_count(topic), 0);
        }
    }

    #[test]
    fn test_subscription_outlives_bus() {
        let bus = EventBus::new();
        let sub = bus.subscribe(Topic::AreaEntered, |_| {}).unwrap();
        drop(bus);
        assert!(!sub.unsubscribe());
    }
}
