//! Envelopes: the unit of bus traffic.

use std::any::Any;
use std::fmt;

use crate::codec::Encoding;
use crate::identity::Identity;
use crate::topic::TopicKey;

/// Payload carried by an envelope.
///
/// Plain encoding hands the typed value to the bus as-is; XML and JSON
/// produce text.
pub enum Payload {
    /// A typed value carried natively.
    Value(Box<dyn Any + Send>),
    /// An encoded string.
    Text(String),
}

impl Payload {
    /// Wrap a typed value.
    pub fn value<T: Any + Send>(value: T) -> Self {
        Payload::Value(Box::new(value))
    }

    /// Wrap encoded text.
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    /// Encoded text, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Value(_) => None,
        }
    }

    /// Borrow the carried value as `T`, if this is a value payload of that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Payload::Value(value) => value.downcast_ref::<T>(),
            Payload::Text(_) => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Value(_) => f.write_str("Value(..)"),
            Payload::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

/// One message in transit.
#[derive(Debug)]
pub struct Envelope {
    /// Channel the envelope travels on.
    pub topic: TopicKey,
    /// Opaque discriminator chosen by the requester and echoed on replies.
    pub tag: u32,
    /// Participant that produced the envelope.
    pub sender: Identity,
    /// Intended consumer; `None` is a broadcast.
    pub recipient: Option<Identity>,
    /// Value or encoded text.
    pub payload: Payload,
    /// Encoding that produced `payload`.
    pub encoding: Encoding,
}

impl Envelope {
    /// Assemble an envelope.
    pub fn new(
        topic: TopicKey,
        tag: u32,
        sender: Identity,
        recipient: Option<Identity>,
        payload: Payload,
        encoding: Encoding,
    ) -> Self {
        Self {
            topic,
            tag,
            sender,
            recipient,
            payload,
            encoding,
        }
    }

    /// Whether this envelope is addressed to nobody in particular.
    pub fn is_broadcast(&self) -> bool {
        self.recipient.is_none()
    }
}
