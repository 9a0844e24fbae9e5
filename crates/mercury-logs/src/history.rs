use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use mercury_bus::{BusError, EventBus, Subscription};
use mercury_types::{Event, Topic};

/// One event as received by the history
#[derive(Clone, Debug)]
pub struct HistoryRecord {
    /// Sequential record ID (0-based, never reused)
    pub id: u64,

    pub topic: Topic,

    pub received_at: DateTime<Utc>,

    pub event: Arc<Event>,
}

/// Number of retained records per topic
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicCounts(BTreeMap<Topic, usize>);

impl TopicCounts {
    pub fn get(&self, topic: Topic) -> usize {
        self.0.get(&topic).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Topic, usize)> + '_ {
        self.0.iter().map(|(topic, count)| (*topic, *count))
    }
}

/// Thread-safe ring buffer of recent events
///
/// Clones share the same buffer. Once `capacity` is reached the oldest record
/// is evicted for every new one.
#[derive(Clone)]
pub struct EventHistory {
    records: Arc<RwLock<VecDeque<HistoryRecord>>>,

    capacity: usize,

    next_id: Arc<AtomicU64>,
}

impl EventHistory {
    /// Create an empty history holding at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record an event, evicting the oldest record when full
    pub fn push(&self, event: Arc<Event>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = HistoryRecord {
            id,
            topic: event.topic(),
            received_at: Utc::now(),
            event,
        };

        let mut records = self.records.write();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        id
    }

    /// All retained records, oldest first
    pub fn all(&self) -> Vec<HistoryRecord> {
        self.records.read().iter().cloned().collect()
    }

    /// The last `n` records, oldest first
    pub fn tail(&self, n: usize) -> Vec<HistoryRecord> {
        let records = self.records.read();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    /// Retained records on `topic`, oldest first
    pub fn by_topic(&self, topic: Topic) -> Vec<HistoryRecord> {
        self.records
            .read()
            .iter()
            .filter(|record| record.topic == topic)
            .cloned()
            .collect()
    }

    pub fn counts(&self) -> TopicCounts {
        let mut counts = BTreeMap::new();
        for record in self.records.read().iter() {
            *counts.entry(record.topic).or_insert(0) += 1;
        }
        TopicCounts(counts)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Subscribe this history to every topic on `bus`
    ///
    /// Records on one topic keep publish order. Records from different topics
    /// are delivered by separate workers and may interleave.
    pub fn attach(&self, bus: &EventBus) -> Result<Vec<Subscription>, BusError> {
        let history = self.clone();
        bus.subscribe_all(move |event| {
            history.push(Arc::new(event.clone()));
        })
    }
}

impl std::fmt::Debug for EventHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHistory")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
