//! Responder: binds an address and a handler to a tick-driven poll loop.
//!
//! # Lifecycle
//!
//! ```text
//!            start()                     stop() / drop
//! Inactive ──────────► Active ──────────────────────► Inactive
//!                        │  every tick: counter += 1
//!                        │  counter == interval: counter = 0, dispatch cycle
//! ```
//!
//! # Dispatch cycle
//!
//! ```text
//! drain(address) ──► for each envelope, in drain order:
//!                      decode(request_encoding)   failure: recorded, next envelope
//!                      handler(request)           failure: cycle aborted
//!                      empty reply?               nothing published
//!                      for each value:
//!                        encode(response_encoding)
//!                        publish {address.tag, from: local identity, to: sender}
//! ```
//!
//! The tick source holds only a weak reference to the responder. Dropping the
//! responder unregisters it.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::bus::MessageBus;
use crate::codec::{Codec, Encoding, Transportable, XmlSchema};
use crate::config::ResponderConfig;
use crate::envelope::Envelope;
use crate::error::{ConfigError, HandlerError, ResponderError};
use crate::identity::{Filter, IdentityContext};
use crate::reply::{IntoReply, Reply};
use crate::tick::{CallbackId, TickCallback, TickEvent, TickSource};
use crate::topic::TopicKey;

/// Start/stop control shared by every responder regardless of its types.
pub trait Lifecycle {
    /// Begin polling. Re-starting an active responder only resets its counter.
    fn start(&self);

    /// Stop polling. Safe to call when already stopped.
    fn stop(&self);

    /// Whether the responder is between `start()` and `stop()`.
    fn is_active(&self) -> bool;
}

/// Counters for one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Envelopes drained from the address.
    pub drained: usize,
    /// Response envelopes published.
    pub published: usize,
    /// Requests whose handler returned no response.
    pub suppressed: usize,
    /// Envelopes that failed to decode, encode or publish.
    pub failed: usize,
}

type BoxedHandler<Req, Resp> = Box<dyn Fn(Req) -> Result<Reply<Resp>, HandlerError>>;

/// Request/response endpoint bound to one address.
///
/// `Req` is decoded from inbound payloads with the configured request
/// encoding; every `Resp` the handler produces is encoded with the response
/// encoding and published on the reply lane named by the request's tag.
pub struct Responder<Req, Resp> {
    inner: Rc<ResponderInner<Req, Resp>>,
}

struct ResponderInner<Req, Resp> {
    config: ResponderConfig,
    inbox: TopicKey,
    bus: Rc<dyn MessageBus>,
    ticks: Rc<dyn TickSource>,
    identity: Rc<dyn IdentityContext>,
    handler: BoxedHandler<Req, Resp>,
    requests: Codec<Req>,
    responses: Codec<Resp>,
    tick_counter: Cell<u32>,
    registration: Cell<Option<CallbackId>>,
    cycles: Cell<u64>,
}

impl<Req, Resp> Responder<Req, Resp>
where
    Req: Transportable,
    Resp: Transportable,
{
    /// Start building a responder for `address`.
    pub fn builder(address: impl Into<String>) -> ResponderBuilder<Req, Resp> {
        ResponderBuilder::new(address)
    }

    /// Build a responder straight from a configuration.
    pub fn new<F, R>(
        config: ResponderConfig,
        bus: Rc<dyn MessageBus>,
        ticks: Rc<dyn TickSource>,
        identity: Rc<dyn IdentityContext>,
        handler: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(Req) -> R + 'static,
        R: IntoReply<Resp>,
    {
        ResponderBuilder::from_config(config).build(bus, ticks, identity, handler)
    }

    /// Register with the tick source and reset the tick counter.
    ///
    /// Calling `start()` on an active responder resets the counter but keeps
    /// the existing registration.
    pub fn start(&self) {
        let inner = &self.inner;
        inner.tick_counter.set(0);

        if inner.registration.get().is_some() {
            tracing::debug!(address = %inner.inbox, "responder already active, counter reset");
            return;
        }

        let weak: Weak<ResponderInner<Req, Resp>> = Rc::downgrade(inner);
        let callback: TickCallback = Rc::new(move |event: TickEvent| -> Result<(), ResponderError> {
            match weak.upgrade() {
                Some(inner) => inner.on_tick(event),
                None => Ok(()),
            }
        });
        let id = inner.ticks.register(callback);
        inner.registration.set(Some(id));

        tracing::debug!(
            address = %inner.inbox,
            interval = inner.config.interval,
            request_encoding = %inner.config.request_encoding,
            response_encoding = %inner.config.response_encoding,
            "responder started"
        );
    }

    /// Run one dispatch cycle now, ignoring the tick counter.
    ///
    /// Returns `Ok(None)` without touching the bus when the responder is not
    /// active.
    pub fn poll_now(&self) -> Result<Option<CycleReport>, ResponderError> {
        if !self.is_active() {
            return Ok(None);
        }
        self.inner.dispatch_cycle().map(Some)
    }
}

impl<Req, Resp> Responder<Req, Resp> {
    /// Unregister from the tick source. No effect when inactive.
    pub fn stop(&self) {
        if let Some(id) = self.inner.registration.take() {
            self.inner.ticks.unregister(id);
            tracing::debug!(address = %self.inner.inbox, "responder stopped");
        }
    }

    /// Whether the responder is registered with its tick source.
    pub fn is_active(&self) -> bool {
        self.inner.registration.get().is_some()
    }

    /// Address the responder drains.
    pub fn address(&self) -> &str {
        &self.inner.config.address
    }

    /// Effective configuration.
    pub fn config(&self) -> &ResponderConfig {
        &self.inner.config
    }

    /// Ticks counted since the last dispatch cycle.
    pub fn tick_counter(&self) -> u32 {
        self.inner.tick_counter.get()
    }

    /// Dispatch cycles run since creation.
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.get()
    }
}

impl<Req, Resp> ResponderInner<Req, Resp>
where
    Req: Transportable,
    Resp: Transportable,
{
    fn on_tick(&self, event: TickEvent) -> Result<(), ResponderError> {
        // Stopped by an earlier callback of the same tick.
        if self.registration.get().is_none() {
            return Ok(());
        }

        let count = self.tick_counter.get() + 1;
        if count < self.config.interval {
            self.tick_counter.set(count);
            return Ok(());
        }
        self.tick_counter.set(0);

        tracing::trace!(address = %self.inbox, tick = event.sequence, "poll");
        self.dispatch_cycle().map(|_| ())
    }

    fn dispatch_cycle(&self) -> Result<CycleReport, ResponderError> {
        self.cycles.set(self.cycles.get() + 1);

        let envelopes = self.bus.drain(&self.inbox, Filter::Any, Filter::Any)?;
        let mut report = CycleReport {
            drained: envelopes.len(),
            ..CycleReport::default()
        };
        if envelopes.is_empty() {
            return Ok(report);
        }

        let mut failures = Vec::new();
        let mut pending = envelopes.into_iter();
        while let Some(envelope) = pending.next() {
            match self.respond(envelope, &mut report) {
                Ok(()) => {}
                Err(err @ ResponderError::Handler { .. }) => {
                    tracing::warn!(
                        address = %self.inbox,
                        dropped = pending.len(),
                        failed = failures.len(),
                        error = %err,
                        "handler failed, abandoning dispatch cycle"
                    );
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(address = %self.inbox, error = %err, "envelope failed");
                    report.failed += 1;
                    failures.push(err);
                }
            }
        }

        tracing::debug!(
            address = %self.inbox,
            drained = report.drained,
            published = report.published,
            suppressed = report.suppressed,
            failed = report.failed,
            "dispatch cycle complete"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(ResponderError::Envelopes { report, failures })
        }
    }

    fn respond(&self, envelope: Envelope, report: &mut CycleReport) -> Result<(), ResponderError> {
        let tag = envelope.tag;
        let sender = envelope.sender;
        tracing::trace!(address = %self.inbox, tag, sender = %sender, "request");

        let request = self
            .requests
            .decode_envelope(envelope, self.config.request_encoding)
            .map_err(|source| ResponderError::Decode {
                tag,
                sender,
                source,
            })?;

        let reply = (self.handler)(request).map_err(|source| ResponderError::Handler {
            tag,
            sender,
            source,
        })?;

        if reply.is_empty() {
            report.suppressed += 1;
            return Ok(());
        }

        let lane = self.inbox.with_lane(tag);
        let encoding = self.config.response_encoding;
        for value in reply {
            let payload = self
                .responses
                .encode(value, encoding)
                .map_err(|source| ResponderError::Encode {
                    tag,
                    sender,
                    source,
                })?;

            let response = Envelope::new(
                lane.clone(),
                tag,
                self.identity.local_identity(),
                Some(sender),
                payload,
                encoding,
            );
            self.bus
                .publish(response)
                .map_err(|source| ResponderError::Publish {
                    tag,
                    sender,
                    source,
                })?;
            report.published += 1;
        }
        Ok(())
    }
}

impl<Req, Resp> Lifecycle for Responder<Req, Resp>
where
    Req: Transportable,
    Resp: Transportable,
{
    fn start(&self) {
        Responder::start(self);
    }

    fn stop(&self) {
        Responder::stop(self);
    }

    fn is_active(&self) -> bool {
        Responder::is_active(self)
    }
}

impl<Req, Resp> Drop for Responder<Req, Resp> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<Req, Resp> fmt::Debug for Responder<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("config", &self.inner.config)
            .field("active", &self.is_active())
            .field("tick_counter", &self.tick_counter())
            .finish()
    }
}

/// Fluent construction of a [`Responder`].
///
/// # Example
///
/// ```rust,ignore
/// let responder = Responder::<Order, Receipt>::builder("shop")
///     .interval(30)
///     .request_encoding(Encoding::Json)
///     .response_encoding(Encoding::Xml)
///     .response_xml_root("Receipt")
///     .build(bus, ticks, identity, |order: Order| Some(checkout(order)))?;
/// ```
pub struct ResponderBuilder<Req, Resp> {
    config: ResponderConfig,
    request_xml_root: Option<String>,
    response_xml_root: Option<String>,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> ResponderBuilder<Req, Resp>
where
    Req: Transportable,
    Resp: Transportable,
{
    /// Builder for `address` with default settings.
    pub fn new(address: impl Into<String>) -> Self {
        Self::from_config(ResponderConfig::new(address))
    }

    /// Builder seeded with an existing configuration.
    pub fn from_config(config: ResponderConfig) -> Self {
        Self {
            config,
            request_xml_root: None,
            response_xml_root: None,
            _marker: PhantomData,
        }
    }

    /// Poll every `interval` ticks.
    pub fn interval(mut self, interval: u32) -> Self {
        self.config.interval = interval;
        self
    }

    /// Encoding expected on inbound requests.
    pub fn request_encoding(mut self, encoding: Encoding) -> Self {
        self.config.request_encoding = encoding;
        self
    }

    /// Encoding used for responses.
    pub fn response_encoding(mut self, encoding: Encoding) -> Self {
        self.config.response_encoding = encoding;
        self
    }

    /// Explicit XML root element for requests instead of the derived one.
    pub fn request_xml_root(mut self, root: impl Into<String>) -> Self {
        self.request_xml_root = Some(root.into());
        self
    }

    /// Explicit XML root element for responses instead of the derived one.
    pub fn response_xml_root(mut self, root: impl Into<String>) -> Self {
        self.response_xml_root = Some(root.into());
        self
    }

    /// Validate the configuration and assemble the responder, inactive.
    pub fn build<F, R>(
        self,
        bus: Rc<dyn MessageBus>,
        ticks: Rc<dyn TickSource>,
        identity: Rc<dyn IdentityContext>,
        handler: F,
    ) -> Result<Responder<Req, Resp>, ConfigError>
    where
        F: Fn(Req) -> R + 'static,
        R: IntoReply<Resp>,
    {
        self.config.validate()?;
        let requests = codec_for(self.request_xml_root)?;
        let responses = codec_for(self.response_xml_root)?;

        let handler: BoxedHandler<Req, Resp> =
            Box::new(move |request: Req| handler(request).into_reply());

        Ok(Responder {
            inner: Rc::new(ResponderInner {
                inbox: TopicKey::base(self.config.address.clone()),
                config: self.config,
                bus,
                ticks,
                identity,
                handler,
                requests,
                responses,
                tick_counter: Cell::new(0),
                registration: Cell::new(None),
                cycles: Cell::new(0),
            }),
        })
    }
}

fn codec_for<T>(root: Option<String>) -> Result<Codec<T>, ConfigError> {
    match root {
        Some(root) => XmlSchema::with_root(root).map(Codec::with_xml_schema),
        None => Ok(Codec::new()),
    }
}

/// Group of responders started and stopped together.
///
/// Dropping the set drops, and so stops, every member.
#[derive(Default)]
pub struct ResponderSet {
    members: Vec<Box<dyn Lifecycle>>,
}

impl ResponderSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a responder. Its current state is left as is.
    pub fn add(&mut self, responder: impl Lifecycle + 'static) {
        self.members.push(Box::new(responder));
    }

    /// Start every member.
    pub fn start_all(&self) {
        for member in &self.members {
            member.start();
        }
    }

    /// Stop every member.
    pub fn stop_all(&self) {
        for member in &self.members {
            member.stop();
        }
    }

    /// Number of active members.
    pub fn active(&self) -> usize {
        self.members.iter().filter(|m| m.is_active()).count()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
