//! Conversions between typed values and bus payloads.
//!
//! Three encodings form a closed set:
//!
//! | Encoding | Payload        | Format                                  |
//! |----------|----------------|-----------------------------------------|
//! | `Plain`  | `Payload::Value` | the value itself, no conversion       |
//! | `Xml`    | `Payload::Text`  | one XML element named after the type  |
//! | `Json`   | `Payload::Text`  | compact JSON                          |
//!
//! For every encoding `k`, `decode(encode(v, k), k) == v`. Encodings do not
//! interoperate: XML text fed to the JSON decoder is a decode error.
//!
//! # Example
//!
//! ```rust
//! use replybus::{Codec, Encoding};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Point { x: i32 }
//!
//! let codec = Codec::<Point>::new();
//! let payload = codec.encode(Point { x: 42 }, Encoding::Json).expect("encode should succeed");
//! assert_eq!(payload.as_text(), Some(r#"{"x":42}"#));
//!
//! let decoded = codec.decode(payload, Encoding::Json).expect("decode should succeed");
//! assert_eq!(decoded, Point { x: 42 });
//! ```

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, Payload};
use crate::error::{CodecError, ConfigError, XmlError};
use crate::xml;

/// Root element used when a type name yields no usable XML name.
const FALLBACK_XML_ROOT: &str = "value";

/// Payload encoding. The discriminant is the integer tag carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Encoding {
    /// Typed value passed through untouched.
    #[default]
    Plain = 0,
    /// XML text.
    Xml = 1,
    /// Compact JSON text.
    Json = 2,
}

impl Encoding {
    /// Integer tag for this encoding.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Whether payloads of this encoding are text.
    pub const fn is_text(self) -> bool {
        !matches!(self, Encoding::Plain)
    }
}

impl TryFrom<u8> for Encoding {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Encoding::Plain),
            1 => Ok(Encoding::Xml),
            2 => Ok(Encoding::Json),
            _ => Err(CodecError::UnknownEncoding { tag }),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Plain => "plain",
            Encoding::Xml => "xml",
            Encoding::Json => "json",
        })
    }
}

impl FromStr for Encoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(Encoding::Plain),
            "xml" => Ok(Encoding::Xml),
            "json" => Ok(Encoding::Json),
            _ => Err(CodecError::UnknownEncodingName { name: s.to_string() }),
        }
    }
}

/// XML mapping for `T`.
///
/// The root element name is derived once from `T`'s type name and reused for
/// every message. Peers exchanging XML must agree on it, so it can also be
/// set explicitly.
pub struct XmlSchema<T> {
    root: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> XmlSchema<T> {
    /// Derive the schema from `T`'s type name.
    pub fn derive() -> Self {
        let root = root_name_for(type_name::<T>());
        tracing::trace!(type_name = type_name::<T>(), root = %root, "derived XML schema");
        Self {
            root,
            _marker: PhantomData,
        }
    }

    /// Use an explicit root element name.
    pub fn with_root(root: impl Into<String>) -> Result<Self, ConfigError> {
        let root = root.into();
        if !is_xml_name(&root) {
            return Err(ConfigError::InvalidXmlRoot { root });
        }
        Ok(Self {
            root,
            _marker: PhantomData,
        })
    }

    /// Root element name.
    pub fn root(&self) -> &str {
        &self.root
    }
}

impl<T: Serialize> XmlSchema<T> {
    /// Serialize `value` as a document with a single root element.
    pub fn serialize(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_value(value)
            .map_err(XmlError::from)
            .and_then(|tree| xml::write_document(&self.root, &tree))
            .map_err(|e| CodecError::Encode {
                encoding: Encoding::Xml,
                source: Box::new(e),
            })
    }
}

impl<T: DeserializeOwned> XmlSchema<T> {
    /// Parse a document produced by [`serialize`](Self::serialize).
    ///
    /// The root element must match this schema's root.
    pub fn deserialize(&self, text: &str) -> Result<T, CodecError> {
        xml::read_document(&self.root, text)
            .and_then(|tree| serde_json::from_value(tree).map_err(XmlError::from))
            .map_err(|e| CodecError::Decode {
                encoding: Encoding::Xml,
                source: Box::new(e),
            })
    }
}

impl<T> Clone for XmlSchema<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for XmlSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlSchema").field("root", &self.root).finish()
    }
}

impl<T> Default for XmlSchema<T> {
    fn default() -> Self {
        Self::derive()
    }
}

/// Last path segment of a type name, generics stripped, reduced to XML name
/// characters.
fn root_name_for(type_name: &str) -> String {
    // Tuples, arrays, slices and references have no name of their own.
    if type_name.starts_with(['(', '[', '&', '*']) {
        return FALLBACK_XML_ROOT.to_string();
    }
    let head = type_name.split('<').next().unwrap_or(type_name);
    let last = head.rsplit("::").next().unwrap_or(head);
    let name: String = last
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    if is_xml_name(&name) {
        name
    } else {
        FALLBACK_XML_ROOT.to_string()
    }
}

/// ASCII subset of the XML `Name` production, minus the reserved `xml` prefix.
pub(crate) fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if name.get(..3).is_some_and(|prefix| prefix.eq_ignore_ascii_case("xml")) {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Types that can travel in a payload under every encoding.
///
/// Plain needs an owned `'static` value the bus can carry as `dyn Any`;
/// XML and JSON need serde.
pub trait Transportable: Serialize + DeserializeOwned + Any + Send {}

impl<T: Serialize + DeserializeOwned + Any + Send> Transportable for T {}

/// Encoder/decoder for one value type across all encodings.
///
/// Holds the type's [`XmlSchema`], so build it once and keep it.
pub struct Codec<T> {
    xml: XmlSchema<T>,
}

impl<T> Codec<T> {
    /// Codec with a derived XML schema.
    pub fn new() -> Self {
        Self {
            xml: XmlSchema::derive(),
        }
    }

    /// Codec with an explicit XML schema.
    pub fn with_xml_schema(xml: XmlSchema<T>) -> Self {
        Self { xml }
    }

    /// The XML schema in use.
    pub fn xml_schema(&self) -> &XmlSchema<T> {
        &self.xml
    }
}

impl<T> Default for Codec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        Self {
            xml: self.xml.clone(),
        }
    }
}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("xml", &self.xml).finish()
    }
}

impl<T: Transportable> Codec<T> {
    /// Convert `value` into a payload.
    pub fn encode(&self, value: T, encoding: Encoding) -> Result<Payload, CodecError> {
        match encoding {
            Encoding::Plain => Ok(Payload::value(value)),
            Encoding::Xml => self.xml.serialize(&value).map(Payload::Text),
            Encoding::Json => serde_json::to_string(&value)
                .map(Payload::Text)
                .map_err(|e| CodecError::Encode {
                    encoding,
                    source: Box::new(e),
                }),
        }
    }

    /// Convert a payload back into `T`.
    pub fn decode(&self, payload: Payload, encoding: Encoding) -> Result<T, CodecError> {
        match (encoding, payload) {
            (Encoding::Plain, Payload::Value(value)) => {
                value.downcast::<T>().map(|value| *value).map_err(|_| {
                    CodecError::TypeMismatch {
                        expected: type_name::<T>(),
                    }
                })
            }
            (Encoding::Xml, Payload::Text(text)) => self.xml.deserialize(&text),
            (Encoding::Json, Payload::Text(text)) => {
                serde_json::from_str(&text).map_err(|e| CodecError::Decode {
                    encoding,
                    source: Box::new(e),
                })
            }
            _ => Err(CodecError::TypeMismatch {
                expected: type_name::<T>(),
            }),
        }
    }

    /// Decode an envelope's payload, checking its encoding tag first.
    pub fn decode_envelope(&self, envelope: Envelope, encoding: Encoding) -> Result<T, CodecError> {
        if envelope.encoding != encoding {
            return Err(CodecError::EncodingMismatch {
                expected: encoding,
                actual: envelope.encoding,
            });
        }
        self.decode(envelope.payload, encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::topic::TopicKey;

    #[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
    struct Point {
        x: i32,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
    struct Order {
        id: u32,
        item: String,
        tags: Vec<String>,
        note: Option<String>,
    }

    fn orders() -> Vec<Order> {
        vec![
            Order {
                id: 7,
                item: "parsnip seeds".to_string(),
                tags: vec!["spring".to_string(), "crop".to_string()],
                note: Some("deliver <before> 6 & after 2".to_string()),
            },
            Order {
                id: 8,
                item: "  padded  ".to_string(),
                tags: vec![],
                note: None,
            },
            Order {
                id: 9,
                item: String::new(),
                tags: vec![" ".to_string(), String::new()],
                note: Some("\n\tindented".to_string()),
            },
        ]
    }

    fn assert_roundtrip<T>(value: T)
    where
        T: Transportable + Clone + PartialEq + fmt::Debug,
    {
        let codec = Codec::<T>::new();
        for encoding in [Encoding::Plain, Encoding::Xml, Encoding::Json] {
            let payload = codec
                .encode(value.clone(), encoding)
                .expect("encode should succeed");
            assert_eq!(payload.as_text().is_some(), encoding.is_text());

            let decoded = codec.decode(payload, encoding).expect("decode should succeed");
            assert_eq!(decoded, value, "round trip failed for {}", encoding);
        }
    }

    fn single_root(text: &str, root: &str) -> bool {
        let open = format!("<{root}");
        let close_tag = format!("</{root}>");
        text.starts_with(&open)
            && (text.ends_with(&close_tag) || text.ends_with("/>"))
            && text.matches(&open).count() == 1
    }

    #[test]
    fn test_roundtrip_all_encodings() {
        for order in orders() {
            assert_roundtrip(order);
        }
        assert_roundtrip("  padded  ".to_string());
        assert_roundtrip(String::new());
        assert_roundtrip(Vec::<u32>::new());
        assert_roundtrip(vec![1u32, 2, 3]);
        assert_roundtrip((1u32, "two".to_string()));
        assert_roundtrip(None::<u32>);
        assert_roundtrip(Some(-4i64));
        assert_roundtrip(vec![vec![1.5f64], vec![]]);
    }

    #[test]
    fn test_xml_is_one_document() {
        let cases = [
            (Codec::<Vec<u32>>::new().encode(vec![1, 2, 3], Encoding::Xml), "Vec"),
            (Codec::<Vec<u32>>::new().encode(vec![], Encoding::Xml), "Vec"),
            (Codec::<Option<u32>>::new().encode(None, Encoding::Xml), "Option"),
            (Codec::<(u32, u32)>::new().encode((1, 2), Encoding::Xml), FALLBACK_XML_ROOT),
            (Codec::<String>::new().encode(String::new(), Encoding::Xml), "String"),
        ];
        for (payload, root) in cases {
            let payload = payload.expect("encode should succeed");
            let text = payload.as_text().expect("xml payload is text");
            assert!(single_root(text, root), "not a single <{root}> document: {text}");
        }

        let payload = Codec::<Vec<u32>>::new()
            .encode(vec![1, 2], Encoding::Xml)
            .expect("encode should succeed");
        assert_eq!(
            payload.as_text(),
            Some(concat!(
                r#"<Vec type="array">"#,
                r#"<item type="number">1</item><item type="number">2</item>"#,
                "</Vec>"
            ))
        );
    }

    #[test]
    fn test_xml_root_must_match() {
        let payload = Codec::<Point>::new()
            .encode(Point { x: 1 }, Encoding::Xml)
            .expect("encode should succeed");
        let other =
            Codec::with_xml_schema(XmlSchema::<Point>::with_root("Coord").expect("valid root"));

        let err = other
            .decode(payload, Encoding::Xml)
            .expect_err("root element differs");
        assert!(err.to_string().contains("expected root <Coord>"), "{err}");
    }

    #[test]
    fn test_roundtrip_string() {
        let codec = Codec::<String>::new();
        for encoding in [Encoding::Plain, Encoding::Xml, Encoding::Json] {
            let payload = codec
                .encode("hi".to_string(), encoding)
                .expect("encode should succeed");
            let decoded = codec.decode(payload, encoding).expect("decode should succeed");
            assert_eq!(decoded, "hi");
        }
    }

    #[test]
    fn test_json_is_compact() {
        let codec = Codec::<Point>::new();
        let payload = codec.encode(Point { x: 42 }, Encoding::Json).expect("encode");
        assert_eq!(payload.as_text(), Some(r#"{"x":42}"#));
    }

    #[test]
    fn test_xml_uses_derived_root() {
        let codec = Codec::<Point>::new();
        assert_eq!(codec.xml_schema().root(), "Point");

        let payload = codec.encode(Point { x: 42 }, Encoding::Xml).expect("encode");
        let text = payload.as_text().expect("xml payload is text");
        assert_eq!(text, r#"<Point><x type="number">42</x></Point>"#);
    }

    #[test]
    fn test_xml_explicit_root() {
        let schema = XmlSchema::<Point>::with_root("Coord").expect("valid root");
        let codec = Codec::with_xml_schema(schema);

        let payload = codec.encode(Point { x: 1 }, Encoding::Xml).expect("encode");
        assert!(payload.as_text().expect("text").starts_with("<Coord>"));
        assert_eq!(codec.decode(payload, Encoding::Xml).expect("decode"), Point { x: 1 });
    }

    #[test]
    fn test_xml_root_validation() {
        assert!(XmlSchema::<Point>::with_root("").is_err());
        assert!(XmlSchema::<Point>::with_root("1abc").is_err());
        assert!(XmlSchema::<Point>::with_root("xmlThing").is_err());
        assert!(XmlSchema::<Point>::with_root("has space").is_err());
        assert!(XmlSchema::<Point>::with_root("_ok-name.v2").is_ok());
    }

    #[test]
    fn test_root_name_derivation() {
        assert_eq!(root_name_for("alloc::string::String"), "String");
        assert_eq!(root_name_for("my_crate::model::Point"), "Point");
        assert_eq!(root_name_for("alloc::vec::Vec<my_crate::Point>"), "Vec");
        assert_eq!(root_name_for("u32"), "u32");
        assert_eq!(root_name_for("()"), FALLBACK_XML_ROOT);
        assert_eq!(root_name_for("(u32, u32)"), FALLBACK_XML_ROOT);
        assert_eq!(root_name_for("[u8; 4]"), FALLBACK_XML_ROOT);
        assert_eq!(root_name_for("xml::Xmlish"), FALLBACK_XML_ROOT);
    }

    #[test]
    fn test_plain_type_mismatch() {
        let codec = Codec::<Point>::new();
        let err = codec
            .decode(Payload::value("not a point".to_string()), Encoding::Plain)
            .expect_err("wrong runtime type must fail");

        match err {
            CodecError::TypeMismatch { expected } => assert!(expected.ends_with("Point")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_text_payload_for_plain_is_mismatch() {
        let codec = Codec::<String>::new();
        let result = codec.decode(Payload::text("hi"), Encoding::Plain);
        assert!(matches!(result, Err(CodecError::TypeMismatch { .. })));

        let result = codec.decode(Payload::value("hi".to_string()), Encoding::Json);
        assert!(matches!(result, Err(CodecError::TypeMismatch { .. })));
    }

    #[test]
    fn test_encodings_do_not_interoperate() {
        let codec = Codec::<Point>::new();
        let xml = codec.encode(Point { x: 3 }, Encoding::Xml).expect("encode");

        let result = codec.decode(xml, Encoding::Json);
        assert!(matches!(
            result,
            Err(CodecError::Decode {
                encoding: Encoding::Json,
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_json() {
        let codec = Codec::<Point>::new();
        let err = codec
            .decode(Payload::text("not valid json {"), Encoding::Json)
            .expect_err("malformed json");
        assert!(err.to_string().contains("json decode error"));
    }

    #[test]
    fn test_decode_envelope_checks_tag() {
        let codec = Codec::<Point>::new();
        let envelope = Envelope::new(
            TopicKey::base("geo"),
            0,
            Identity::new(1),
            None,
            Payload::text(r#"{"x":5}"#),
            Encoding::Json,
        );

        let result = codec.decode_envelope(envelope, Encoding::Xml);
        assert!(matches!(
            result,
            Err(CodecError::EncodingMismatch {
                expected: Encoding::Xml,
                actual: Encoding::Json,
            })
        ));
    }

    #[test]
    fn test_encoding_tags() {
        for encoding in [Encoding::Plain, Encoding::Xml, Encoding::Json] {
            assert_eq!(Encoding::try_from(encoding.tag()).expect("known tag"), encoding);
            assert_eq!(encoding.to_string().parse::<Encoding>().expect("known name"), encoding);
        }
        assert!(matches!(
            Encoding::try_from(9),
            Err(CodecError::UnknownEncoding { tag: 9 })
        ));
        assert!("yaml".parse::<Encoding>().is_err());
        assert_eq!("JSON".parse::<Encoding>().expect("case-insensitive"), Encoding::Json);
    }

    #[test]
    fn test_encoding_serde_lowercase() {
        let json = serde_json::to_string(&Encoding::Xml).expect("serialize");
        assert_eq!(json, r#""xml""#);
        let decoded: Encoding = serde_json::from_str(r#""json""#).expect("deserialize");
        assert_eq!(decoded, Encoding::Json);
    }
}
