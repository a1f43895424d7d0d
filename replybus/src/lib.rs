//! # replybus
//!
//! Address-routed request/response responders over a polled message bus.
//!
//! A [`Responder`] binds one logical address to a typed handler. A host tick
//! source drives it; every `interval` ticks it drains the envelopes waiting
//! at its address, decodes each payload into the request type, runs the
//! handler and publishes every produced response on a reply lane addressed
//! back to the peer that asked.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  fire()   ┌──────────────────────────────────────────┐
//! │ TickSource   │ ────────► │ Responder<Req, Resp>                     │
//! └──────────────┘           │  tick counter ─► dispatch cycle          │
//!                            │   drain ─► decode ─► handler ─► encode   │
//!                            └──────┬──────────────────────────┬────────┘
//!                                   │ drain(address)           │ publish(address.tag)
//!                            ┌──────▼──────────────────────────▼────────┐
//!                            │ MessageBus                               │
//!                            └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//! use replybus::prelude::*;
//!
//! let bus = Rc::new(InMemoryBus::new());
//! let ticker = Rc::new(ManualTicker::new());
//! let me = Rc::new(FixedIdentity::new(Identity::new(1)));
//!
//! let echo = Responder::<String, String>::builder("chat")
//!     .build(bus.clone(), ticker.clone(), me, |request: String| Some(request))
//!     .expect("valid responder config");
//! echo.start();
//!
//! let asker = Identity::new(7);
//! bus.publish(Envelope::new(
//!     TopicKey::base("chat"),
//!     3,
//!     asker,
//!     None,
//!     Payload::value("hi".to_string()),
//!     Encoding::Plain,
//! ))
//! .expect("publish should succeed");
//!
//! ticker.fire().expect("tick should succeed");
//!
//! let replies = bus
//!     .drain(&TopicKey::lane("chat", 3), Filter::Any, Filter::Only(asker))
//!     .expect("drain should succeed");
//! assert_eq!(replies.len(), 1);
//! assert_eq!(replies[0].payload.downcast_ref::<String>().expect("string payload"), "hi");
//! ```
//!
//! ## Threading
//!
//! Everything here is single-threaded and cooperative. Collaborators are
//! shared through `Rc`, state lives in `Cell`/`RefCell`, and nothing in the
//! dispatch path suspends.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod bus;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod prelude;
pub mod reply;
pub mod requester;
pub mod responder;
pub mod tick;
pub mod topic;
mod xml;

pub use bus::{InMemoryBus, MessageBus};
pub use codec::{Codec, Encoding, Transportable, XmlSchema};
pub use config::{BusConfig, ResponderConfig};
pub use envelope::{Envelope, Payload};
pub use error::{
    BusError, CodecError, ConfigError, HandlerError, RequesterError, ResponderError, TickError,
    XmlError,
};
pub use identity::{Filter, FixedIdentity, Identity, IdentityContext};
pub use reply::{IntoReply, Reply};
pub use requester::Requester;
pub use responder::{CycleReport, Lifecycle, Responder, ResponderBuilder, ResponderSet};
pub use tick::{CallbackId, ManualTicker, TickCallback, TickEvent, TickSource, drive};
pub use topic::TopicKey;
