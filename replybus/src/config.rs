//! Configuration structures for responders and the in-memory bus.

use serde::{Deserialize, Serialize};

use crate::codec::Encoding;
use crate::error::ConfigError;

/// Configuration of a single responder.
///
/// Deserializes from a host config file with everything but `address`
/// optional:
///
/// ```json
/// { "address": "shop", "interval": 30, "response_encoding": "json" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Address the responder drains requests from.
    pub address: String,

    /// Ticks between two dispatch cycles. Must be at least 1.
    #[serde(default = "default_interval")]
    pub interval: u32,

    /// Encoding expected on inbound requests.
    #[serde(default)]
    pub request_encoding: Encoding,

    /// Encoding used for published responses.
    #[serde(default)]
    pub response_encoding: Encoding,
}

fn default_interval() -> u32 {
    1
}

impl ResponderConfig {
    /// Configuration polling `address` every tick with plain encodings.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            interval: default_interval(),
            request_encoding: Encoding::Plain,
            response_encoding: Encoding::Plain,
        }
    }

    /// Poll every `interval` ticks.
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    /// Use `encoding` for inbound requests.
    pub fn with_request_encoding(mut self, encoding: Encoding) -> Self {
        self.request_encoding = encoding;
        self
    }

    /// Use `encoding` for outbound responses.
    pub fn with_response_encoding(mut self, encoding: Encoding) -> Self {
        self.response_encoding = encoding;
        self
    }

    /// Check the configuration before a responder is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Configuration for [`InMemoryBus`](crate::bus::InMemoryBus).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Maximum pending envelopes per topic. `None` means unbounded.
    #[serde(default)]
    pub max_pending_per_topic: Option<usize>,
}

impl BusConfig {
    /// Bound every topic's queue to `capacity` envelopes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            max_pending_per_topic: Some(capacity),
        }
    }
}
