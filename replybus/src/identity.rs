//! Participant identities and delivery filters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a participant on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(u64);

impl Identity {
    /// Create an identity from its raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw identity value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Sender or recipient filter applied when draining a topic.
///
/// `Any` plays the role of the `-1` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Match every identity.
    #[default]
    Any,
    /// Match exactly this identity.
    Only(Identity),
}

impl Filter {
    /// Whether a sender passes this filter.
    pub fn matches_sender(&self, sender: Identity) -> bool {
        match self {
            Filter::Any => true,
            Filter::Only(id) => *id == sender,
        }
    }

    /// Whether a recipient passes this filter.
    ///
    /// Broadcast envelopes (no recipient) pass every recipient filter.
    pub fn matches_recipient(&self, recipient: Option<Identity>) -> bool {
        match (self, recipient) {
            (Filter::Any, _) | (_, None) => true,
            (Filter::Only(id), Some(recipient)) => *id == recipient,
        }
    }
}

/// Source of the locally active participant's identity.
///
/// The responder stamps this identity as the sender of every reply it
/// publishes. It is read on every reply, so implementations may change the
/// active participant between ticks.
pub trait IdentityContext {
    /// Identity of the participant currently active on this host.
    fn local_identity(&self) -> Identity;
}

/// Identity context that always reports the same participant.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdentity(Identity);

impl FixedIdentity {
    /// Create a context reporting `identity`.
    pub fn new(identity: Identity) -> Self {
        Self(identity)
    }
}

impl IdentityContext for FixedIdentity {
    fn local_identity(&self) -> Identity {
        self.0
    }
}
