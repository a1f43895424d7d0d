//! Error types for the replybus messaging layer.

use crate::codec::Encoding;
use crate::identity::Identity;
use crate::responder::CycleReport;
use crate::topic::TopicKey;

/// Error produced by a request handler.
///
/// Handlers may fail with any error type; the responder never inspects it and
/// hands it to the tick source's error boundary unchanged.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors converting between typed values and bus payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a value.
    #[error("{encoding} encode error: {source}")]
    Encode {
        /// Encoding that was in use.
        encoding: Encoding,
        /// Underlying serializer error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to decode a payload.
    #[error("{encoding} decode error: {source}")]
    Decode {
        /// Encoding that was in use.
        encoding: Encoding,
        /// Underlying deserializer error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The payload does not hold the runtime type the decoder expects.
    #[error("payload type mismatch: expected {expected}")]
    TypeMismatch {
        /// Name of the type the decoder wanted.
        expected: &'static str,
    },

    /// The envelope was produced by a different encoding than the decoder uses.
    #[error("encoding mismatch: decoder expects {expected}, envelope carries {actual}")]
    EncodingMismatch {
        /// Encoding the decoder is configured with.
        expected: Encoding,
        /// Encoding tag found on the envelope.
        actual: Encoding,
    },

    /// Encoding name outside the known set.
    #[error("unknown encoding name: {name:?}")]
    UnknownEncodingName {
        /// The unrecognised name.
        name: String,
    },

    /// Integer encoding tag outside the known set.
    #[error("unknown encoding tag: {tag}")]
    UnknownEncoding {
        /// The unrecognised tag.
        tag: u8,
    },
}

/// Errors reading or writing an XML document.
///
/// Carried as the source of [`CodecError::Encode`] and [`CodecError::Decode`]
/// for [`Encoding::Xml`].
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The text is not well-formed XML.
    #[error("malformed xml: {0}")]
    Syntax(#[from] quick_xml::Error),

    /// An attribute could not be parsed.
    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Writing the document failed.
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    /// A tag name or the document is not valid UTF-8.
    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The value does not fit the document model, or the document does not
    /// fit the target type.
    #[error(transparent)]
    Value(#[from] serde_json::Error),

    /// The document has no root element.
    #[error("document has no root element")]
    MissingRoot,

    /// The document has more than one top-level element.
    #[error("document has more than one root element")]
    MultipleRoots,

    /// Text or markup outside the root element.
    #[error("content outside the root element")]
    OutsideRoot,

    /// The root element is not the one the schema expects.
    #[error("expected root <{expected}>, found <{found}>")]
    RootMismatch {
        /// Root element name of the schema.
        expected: String,
        /// Root element name in the document.
        found: String,
    },

    /// The document ended inside an element.
    #[error("document ends inside <{name}>")]
    UnexpectedEof {
        /// Element left open.
        name: String,
    },

    /// A `type` attribute names no known value kind.
    #[error("<{name}> has unknown type {kind:?}")]
    UnknownType {
        /// Element carrying the attribute.
        name: String,
        /// The attribute value.
        kind: String,
    },

    /// Scalar text that does not parse as its declared kind.
    #[error("<{name}> is not a valid {kind}: {text:?}")]
    InvalidScalar {
        /// Element holding the text.
        name: String,
        /// Declared kind.
        kind: &'static str,
        /// The offending text.
        text: String,
    },

    /// Text mixed into a sequence or a structure.
    #[error("<{name}> mixes text with child elements")]
    UnexpectedText {
        /// Offending element.
        name: String,
    },

    /// Child elements inside a scalar.
    #[error("<{name}> holds a scalar but has child elements")]
    UnexpectedChildren {
        /// Offending element.
        name: String,
    },
}

/// Errors raised by a message bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The topic already holds as many pending envelopes as allowed.
    #[error("queue full for {topic}: capacity {capacity}")]
    QueueFull {
        /// Topic whose queue overflowed.
        topic: TopicKey,
        /// Configured capacity.
        capacity: usize,
    },

    /// The bus has been closed and accepts no more envelopes.
    #[error("bus closed")]
    Closed,
}

/// Invalid responder or bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The responder address is empty.
    #[error("responder address must not be empty")]
    EmptyAddress,

    /// The poll interval is zero.
    #[error("poll interval must be at least one tick")]
    ZeroInterval,

    /// An explicit XML root element name is not a valid XML name.
    #[error("invalid XML root element name: {root:?}")]
    InvalidXmlRoot {
        /// The rejected name.
        root: String,
    },
}

/// Errors surfaced by a responder's dispatch cycle.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    /// An inbound payload could not be decoded into the request type.
    #[error("failed to decode request tag {tag} from {sender}: {source}")]
    Decode {
        /// Tag of the inbound envelope.
        tag: u32,
        /// Peer that sent it.
        sender: Identity,
        /// Codec failure.
        source: CodecError,
    },

    /// The handler failed. The rest of the cycle was abandoned.
    #[error("handler failed on request tag {tag} from {sender}: {source}")]
    Handler {
        /// Tag of the inbound envelope.
        tag: u32,
        /// Peer that sent it.
        sender: Identity,
        /// Error returned by the handler.
        source: HandlerError,
    },

    /// A response value could not be encoded.
    #[error("failed to encode response to tag {tag} for {sender}: {source}")]
    Encode {
        /// Tag of the inbound envelope.
        tag: u32,
        /// Peer the response was meant for.
        sender: Identity,
        /// Codec failure.
        source: CodecError,
    },

    /// The bus refused a response envelope.
    #[error("failed to publish response to tag {tag} for {sender}: {source}")]
    Publish {
        /// Tag of the inbound envelope.
        tag: u32,
        /// Peer the response was meant for.
        sender: Identity,
        /// Bus failure.
        source: BusError,
    },

    /// Draining the responder's address failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// One or more envelopes failed while the rest of the cycle completed.
    #[error("{} of {} envelopes failed", .failures.len(), .report.drained)]
    Envelopes {
        /// Counters for the whole cycle.
        report: CycleReport,
        /// One error per failed envelope, in drain order.
        failures: Vec<ResponderError>,
    },
}

/// Errors surfaced to the peer issuing requests.
#[derive(Debug, thiserror::Error)]
pub enum RequesterError {
    /// The request could not be encoded.
    #[error("failed to encode request: {source}")]
    Encode {
        /// Codec failure.
        source: CodecError,
    },

    /// A reply could not be decoded into the response type.
    #[error("failed to decode reply: {source}")]
    Decode {
        /// Codec failure.
        source: CodecError,
    },

    /// The bus failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

/// Callback failures collected by a tick source during one tick.
#[derive(Debug, thiserror::Error)]
#[error("tick {sequence}: {} callback(s) failed", .failures.len())]
pub struct TickError {
    /// Sequence number of the failing tick.
    pub sequence: u64,
    /// Every error returned by a callback during that tick.
    pub failures: Vec<ResponderError>,
}
