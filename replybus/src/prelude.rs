//! Common imports for replybus.
//!
//! ```rust
//! use replybus::prelude::*;
//! ```

pub use crate::bus::{InMemoryBus, MessageBus};
pub use crate::codec::{Codec, Encoding, Transportable, XmlSchema};
pub use crate::config::{BusConfig, ResponderConfig};
pub use crate::envelope::{Envelope, Payload};
pub use crate::error::{
    BusError, CodecError, ConfigError, HandlerError, RequesterError, ResponderError, TickError,
    XmlError,
};
pub use crate::identity::{Filter, FixedIdentity, Identity, IdentityContext};
pub use crate::reply::{IntoReply, Reply};
pub use crate::requester::Requester;
pub use crate::responder::{CycleReport, Lifecycle, Responder, ResponderBuilder, ResponderSet};
pub use crate::tick::{CallbackId, ManualTicker, TickCallback, TickEvent, TickSource, drive};
pub use crate::topic::TopicKey;
