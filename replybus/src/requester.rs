//! Peer-side request sending and reply collection.
//!
//! A [`Requester`] is the counterpart of a [`Responder`](crate::Responder):
//! it publishes typed requests on the responder's address and later drains
//! the replies addressed to it on the reply lane named by the request tag.
//!
//! # Example
//!
//! ```rust,ignore
//! let shop = Requester::<Order, Receipt>::new("shop", bus, identity)
//!     .with_encodings(Encoding::Json, Encoding::Json);
//!
//! shop.send(1, Order { item: "hoe".into() }, None)?;
//! // ... responder ticks ...
//! let receipts = shop.collect(1)?;
//! ```

use std::rc::Rc;

use crate::bus::MessageBus;
use crate::codec::{Codec, Encoding, Transportable, XmlSchema};
use crate::envelope::Envelope;
use crate::error::RequesterError;
use crate::identity::{Filter, Identity, IdentityContext};
use crate::topic::TopicKey;

/// Sends `Req` to one address and reads back `Resp` replies.
pub struct Requester<Req, Resp> {
    inbox: TopicKey,
    bus: Rc<dyn MessageBus>,
    identity: Rc<dyn IdentityContext>,
    request_encoding: Encoding,
    response_encoding: Encoding,
    requests: Codec<Req>,
    responses: Codec<Resp>,
}

impl<Req, Resp> Requester<Req, Resp>
where
    Req: Transportable,
    Resp: Transportable,
{
    /// Requester for `address` using plain encodings both ways.
    pub fn new(
        address: impl Into<String>,
        bus: Rc<dyn MessageBus>,
        identity: Rc<dyn IdentityContext>,
    ) -> Self {
        Self {
            inbox: TopicKey::base(address),
            bus,
            identity,
            request_encoding: Encoding::Plain,
            response_encoding: Encoding::Plain,
            requests: Codec::new(),
            responses: Codec::new(),
        }
    }

    /// Encodings for requests sent and replies expected.
    ///
    /// Must mirror the responder's configuration.
    pub fn with_encodings(mut self, request: Encoding, response: Encoding) -> Self {
        self.request_encoding = request;
        self.response_encoding = response;
        self
    }

    /// XML schemas to use instead of the derived ones.
    pub fn with_xml_schemas(mut self, request: XmlSchema<Req>, response: XmlSchema<Resp>) -> Self {
        self.requests = Codec::with_xml_schema(request);
        self.responses = Codec::with_xml_schema(response);
        self
    }

    /// Address requests are sent to.
    pub fn address(&self) -> &str {
        self.inbox.base_name()
    }

    /// Publish `request` under `tag`.
    ///
    /// `recipient` narrows delivery to one participant; `None` broadcasts.
    pub fn send(
        &self,
        tag: u32,
        request: Req,
        recipient: Option<Identity>,
    ) -> Result<(), RequesterError> {
        let payload = self
            .requests
            .encode(request, self.request_encoding)
            .map_err(|source| RequesterError::Encode { source })?;

        let sender = self.identity.local_identity();
        tracing::trace!(address = %self.inbox, tag, sender = %sender, "send request");

        self.bus.publish(Envelope::new(
            self.inbox.clone(),
            tag,
            sender,
            recipient,
            payload,
            self.request_encoding,
        ))?;
        Ok(())
    }

    /// Drain and decode every reply to `tag` addressed to this participant.
    ///
    /// Replies are returned in publish order. Draining consumes them, so on a
    /// decode error the replies of the same batch are lost.
    pub fn collect(&self, tag: u32) -> Result<Vec<Resp>, RequesterError> {
        let me = self.identity.local_identity();
        let lane = self.inbox.with_lane(tag);
        let replies = self.bus.drain(&lane, Filter::Any, Filter::Only(me))?;

        tracing::trace!(topic = %lane, count = replies.len(), "collect replies");
        replies
            .into_iter()
            .map(|reply| {
                self.responses
                    .decode_envelope(reply, self.response_encoding)
                    .map_err(|source| RequesterError::Decode { source })
            })
            .collect()
    }
}
