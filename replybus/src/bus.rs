//! Message bus: the inbox/outbox responders poll and publish to.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │ InMemoryBus                            │
//! │                                        │
//! │  topics: RefCell<HashMap<TopicKey,     │
//! │                  VecDeque<Envelope>>>  │
//! │  closed: Cell<bool>                    │
//! └────────────────────────────────────────┘
//! ```
//!
//! Queues are FIFO per topic. `drain` removes every envelope that passes the
//! filters and leaves the rest queued in their original order. A drained
//! envelope is never delivered again.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use crate::config::BusConfig;
use crate::envelope::Envelope;
use crate::error::BusError;
use crate::identity::Filter;
use crate::topic::TopicKey;

/// Transport primitive consumed by responders and requesters.
///
/// Both methods take `&self`: several responders share one bus and nothing
/// above this layer serializes access to it.
pub trait MessageBus {
    /// Queue an envelope on its topic. Fire-and-forget: no acknowledgement.
    fn publish(&self, envelope: Envelope) -> Result<(), BusError>;

    /// Remove and return every pending envelope on `topic` matching both
    /// filters, in delivery order.
    fn drain(
        &self,
        topic: &TopicKey,
        sender: Filter,
        recipient: Filter,
    ) -> Result<Vec<Envelope>, BusError>;
}

/// Single-process bus backed by per-topic FIFO queues.
///
/// Uses `Cell` and `RefCell` for interior mutability; no borrow is held
/// across a call out of the bus.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    config: BusConfig,
    topics: RefCell<HashMap<TopicKey, VecDeque<Envelope>>>,
    closed: Cell<bool>,
    published: Cell<u64>,
}

impl InMemoryBus {
    /// Unbounded bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus with the given configuration.
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of envelopes waiting on `topic`.
    pub fn pending(&self, topic: &TopicKey) -> usize {
        self.topics.borrow().get(topic).map_or(0, VecDeque::len)
    }

    /// Total envelopes accepted since creation.
    pub fn published_count(&self) -> u64 {
        self.published.get()
    }

    /// Refuse every further publish.
    ///
    /// Pending envelopes stay drainable.
    pub fn close(&self) {
        self.closed.set(true);
    }

    /// Whether the bus has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl MessageBus for InMemoryBus {
    fn publish(&self, envelope: Envelope) -> Result<(), BusError> {
        if self.closed.get() {
            return Err(BusError::Closed);
        }

        let mut topics = self.topics.borrow_mut();
        let queue = topics.entry(envelope.topic.clone()).or_default();
        if let Some(capacity) = self.config.max_pending_per_topic {
            if queue.len() >= capacity {
                return Err(BusError::QueueFull {
                    topic: envelope.topic,
                    capacity,
                });
            }
        }

        tracing::trace!(
            topic = %envelope.topic,
            tag = envelope.tag,
            sender = %envelope.sender,
            encoding = %envelope.encoding,
            "publish"
        );
        queue.push_back(envelope);
        self.published.set(self.published.get() + 1);
        Ok(())
    }

    fn drain(
        &self,
        topic: &TopicKey,
        sender: Filter,
        recipient: Filter,
    ) -> Result<Vec<Envelope>, BusError> {
        let mut topics = self.topics.borrow_mut();
        let Some(queue) = topics.get_mut(topic) else {
            return Ok(Vec::new());
        };

        let mut drained = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());
        for envelope in queue.drain(..) {
            if sender.matches_sender(envelope.sender)
                && recipient.matches_recipient(envelope.recipient)
            {
                drained.push(envelope);
            } else {
                kept.push_back(envelope);
            }
        }
        *queue = kept;

        if !drained.is_empty() {
            tracing::trace!(topic = %topic, count = drained.len(), "drain");
        }
        Ok(drained)
    }
}
