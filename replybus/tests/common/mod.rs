//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use replybus::prelude::*;
use tracing_subscriber::EnvFilter;

/// Identity of the local participant running responders.
pub const SELF_ID: Identity = Identity::new(1000);

/// Identity of a remote peer issuing requests.
pub const P1: Identity = Identity::new(1);

/// Second remote peer.
pub const P2: Identity = Identity::new(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Bus, ticker and identity shared by the responders of one test.
pub struct World {
    pub bus: Rc<InMemoryBus>,
    pub ticker: Rc<ManualTicker>,
    pub identity: Rc<FixedIdentity>,
}

impl World {
    pub fn new() -> Self {
        Self::with_bus(InMemoryBus::new())
    }

    pub fn with_bus(bus: InMemoryBus) -> Self {
        init_tracing();
        Self {
            bus: Rc::new(bus),
            ticker: Rc::new(ManualTicker::new()),
            identity: Rc::new(FixedIdentity::new(SELF_ID)),
        }
    }

    pub fn responder<Req, Resp, F, R>(
        &self,
        builder: ResponderBuilder<Req, Resp>,
        handler: F,
    ) -> Responder<Req, Resp>
    where
        Req: Transportable,
        Resp: Transportable,
        F: Fn(Req) -> R + 'static,
        R: IntoReply<Resp>,
    {
        builder
            .build(
                self.bus.clone(),
                self.ticker.clone(),
                self.identity.clone(),
                handler,
            )
            .expect("valid responder config")
    }

    pub fn requester<Req, Resp>(&self, address: &str, peer: Identity) -> Requester<Req, Resp>
    where
        Req: Transportable,
        Resp: Transportable,
    {
        Requester::new(address, self.bus.clone(), Rc::new(FixedIdentity::new(peer)))
    }

    /// Publish a plain-encoded request as `sender`.
    pub fn send_plain<T: Transportable>(
        &self,
        address: &str,
        tag: u32,
        sender: Identity,
        value: T,
    ) {
        self.bus
            .publish(Envelope::new(
                TopicKey::base(address),
                tag,
                sender,
                None,
                Payload::value(value),
                Encoding::Plain,
            ))
            .expect("publish request");
    }

    /// Drain every envelope on a reply lane.
    pub fn replies(&self, address: &str, tag: u32) -> Vec<Envelope> {
        self.bus
            .drain(&TopicKey::lane(address, tag), Filter::Any, Filter::Any)
            .expect("drain replies")
    }
}
