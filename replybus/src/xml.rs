//! Typed XML documents.
//!
//! A value is written as exactly one root element. Element content follows
//! the value's serde data model; a `type` attribute marks every element whose
//! text alone would be ambiguous:
//!
//! ```text
//! <Order>                                    object with fields
//!   <id type="number">7</id>                 number
//!   <item>  parsnip seeds </item>            string, text kept verbatim
//!   <tags type="array">                      sequence or tuple
//!     <item>spring</item>
//!   </tags>
//!   <labels type="array"/>                   empty sequence
//!   <note type="null"/>                      None / unit
//!   <entry key="two words">..</entry>        map key that is not an XML name
//! </Order>
//! ```
//!
//! No whitespace is written between elements. On read, text inside a leaf
//! element is taken as is, and whitespace between child elements is ignored.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Map, Number, Value};

use crate::codec::is_xml_name;
use crate::error::XmlError;

const TYPE_ATTR: &str = "type";
const KEY_ATTR: &str = "key";
const ITEM_TAG: &str = "item";
const ENTRY_TAG: &str = "entry";

/// Write `value` as a document rooted at `root`.
pub(crate) fn write_document(root: &str, value: &Value) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, root, None, value)?;
    String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Utf8(e.utf8_error()))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    key: Option<&str>,
    value: &Value,
) -> Result<(), XmlError> {
    let mut start = BytesStart::new(name);
    if let Some(key) = key {
        start.push_attribute((KEY_ATTR, key));
    }

    match value {
        Value::Null => {
            start.push_attribute((TYPE_ATTR, "null"));
            writer.write_event(Event::Empty(start))?;
        }
        Value::Bool(flag) => {
            start.push_attribute((TYPE_ATTR, "boolean"));
            write_leaf(writer, start, name, if *flag { "true" } else { "false" })?;
        }
        Value::Number(number) => {
            start.push_attribute((TYPE_ATTR, "number"));
            write_leaf(writer, start, name, &number.to_string())?;
        }
        Value::String(text) => write_leaf(writer, start, name, text)?,
        Value::Array(items) => {
            start.push_attribute((TYPE_ATTR, "array"));
            if items.is_empty() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }
            writer.write_event(Event::Start(start))?;
            for item in items {
                write_element(writer, ITEM_TAG, None, item)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                start.push_attribute((TYPE_ATTR, "object"));
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }
            writer.write_event(Event::Start(start))?;
            for (field, value) in fields {
                if is_xml_name(field) {
                    write_element(writer, field, None, value)?;
                } else {
                    write_element(writer, ENTRY_TAG, Some(field), value)?;
                }
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
    }
    Ok(())
}

fn write_leaf(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    name: &str,
    text: &str,
) -> Result<(), XmlError> {
    writer.write_event(Event::Start(start))?;
    if !text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Read a document whose root element must be `root`.
pub(crate) fn read_document(root: &str, text: &str) -> Result<Value, XmlError> {
    let mut reader = Reader::from_str(text);
    let mut value = None;

    loop {
        let (start, empty) = match reader.read_event()? {
            Event::Start(start) => (start, false),
            Event::Empty(start) => (start, true),
            Event::Text(chunk) if is_blank(&chunk) => continue,
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
            Event::Eof => break,
            _ => return Err(XmlError::OutsideRoot),
        };

        if value.is_some() {
            return Err(XmlError::MultipleRoots);
        }
        let found = tag_name(&start)?;
        if found != root {
            return Err(XmlError::RootMismatch {
                expected: root.to_string(),
                found,
            });
        }
        value = Some(read_element(&mut reader, &start, empty)?);
    }

    value.ok_or(XmlError::MissingRoot)
}

fn read_element(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    empty: bool,
) -> Result<Value, XmlError> {
    let name = tag_name(start)?;
    let kind = attribute(start, TYPE_ATTR)?;

    let mut text = String::new();
    let mut children: Vec<(String, Value)> = Vec::new();
    if !empty {
        loop {
            match reader.read_event()? {
                Event::Text(chunk) => text.push_str(&chunk.unescape()?),
                Event::CData(chunk) => {
                    text.push_str(&chunk.decode().map_err(quick_xml::Error::from)?)
                }
                Event::Start(child) => {
                    let key = child_key(&child)?;
                    children.push((key, read_element(reader, &child, false)?));
                }
                Event::Empty(child) => {
                    let key = child_key(&child)?;
                    children.push((key, read_element(reader, &child, true)?));
                }
                Event::End(_) => break,
                Event::Eof => return Err(XmlError::UnexpectedEof { name }),
                _ => {}
            }
        }
    }

    match kind.as_deref() {
        None if children.is_empty() => Ok(Value::String(text)),
        None | Some("object") => {
            only_whitespace(&name, &text)?;
            Ok(Value::Object(children.into_iter().collect::<Map<_, _>>()))
        }
        Some("array") => {
            only_whitespace(&name, &text)?;
            Ok(Value::Array(children.into_iter().map(|(_, item)| item).collect()))
        }
        Some("string") => {
            no_children(&name, &children)?;
            Ok(Value::String(text))
        }
        Some("null") => {
            no_children(&name, &children)?;
            only_whitespace(&name, &text)?;
            Ok(Value::Null)
        }
        Some("boolean") => {
            no_children(&name, &children)?;
            match text.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(XmlError::InvalidScalar {
                    name,
                    kind: "boolean",
                    text,
                }),
            }
        }
        Some("number") => {
            no_children(&name, &children)?;
            match serde_json::from_str::<Number>(text.trim()) {
                Ok(number) => Ok(Value::Number(number)),
                Err(_) => Err(XmlError::InvalidScalar {
                    name,
                    kind: "number",
                    text,
                }),
            }
        }
        Some(other) => Err(XmlError::UnknownType {
            name,
            kind: other.to_string(),
        }),
    }
}

fn tag_name(start: &BytesStart<'_>) -> Result<String, XmlError> {
    Ok(std::str::from_utf8(start.name().as_ref())?.to_string())
}

fn attribute(start: &BytesStart<'_>, key: &str) -> Result<Option<String>, XmlError> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn child_key(child: &BytesStart<'_>) -> Result<String, XmlError> {
    let name = tag_name(child)?;
    if name == ENTRY_TAG {
        if let Some(key) = attribute(child, KEY_ATTR)? {
            return Ok(key);
        }
    }
    Ok(name)
}

fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

fn only_whitespace(name: &str, text: &str) -> Result<(), XmlError> {
    if text.trim().is_empty() {
        Ok(())
    } else {
        Err(XmlError::UnexpectedText {
            name: name.to_string(),
        })
    }
}

fn no_children(name: &str, children: &[(String, Value)]) -> Result<(), XmlError> {
    if children.is_empty() {
        Ok(())
    } else {
        Err(XmlError::UnexpectedChildren {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(value: Value) -> Value {
        let document = write_document("doc", &value).expect("write document");
        read_document("doc", &document).expect("read document")
    }

    #[test]
    fn test_single_root_for_every_shape() {
        for value in [
            json!(null),
            json!([]),
            json!([1, 2, 3]),
            json!({}),
            json!("  padded  "),
            json!(""),
            json!(true),
        ] {
            let document = write_document("doc", &value).expect("write document");
            assert!(document.starts_with("<doc"), "unexpected document: {document}");
            assert!(
                document.ends_with("</doc>") || document.ends_with("/>"),
                "unexpected document: {document}"
            );
            assert_eq!(read_document("doc", &document).expect("read document"), value);
        }
    }

    #[test]
    fn test_layout() {
        let document = write_document(
            "Order",
            &json!({ "id": 7, "tags": ["a"], "note": null, "two words": "x" }),
        )
        .expect("write document");
        assert_eq!(
            document,
            concat!(
                "<Order>",
                r#"<id type="number">7</id>"#,
                r#"<note type="null"/>"#,
                r#"<tags type="array"><item>a</item></tags>"#,
                r#"<entry key="two words">x</entry>"#,
                "</Order>"
            )
        );
    }

    #[test]
    fn test_whitespace_and_markup_in_text() {
        let value = json!({ "a": " x ", "b": "\n\t", "c": "<&>\"'" });
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn test_nested_collections() {
        let value = json!({ "grid": [[1, 2], [], [3.5, -4]], "maps": [{}, { "k": [] }] });
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn test_indented_input_accepted() {
        let document = concat!(
            "<?xml version=\"1.0\"?>\n",
            "<doc>\n",
            "  <x type=\"number\">1</x>\n",
            "  <s> y </s>\n",
            "</doc>\n"
        );
        assert_eq!(
            read_document("doc", document).expect("read document"),
            json!({ "x": 1, "s": " y " })
        );
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(
            read_document("doc", "<other/>"),
            Err(XmlError::RootMismatch { .. })
        ));
        assert!(matches!(
            read_document("doc", "<doc>1</doc><doc>2</doc>"),
            Err(XmlError::MultipleRoots)
        ));
        assert!(matches!(read_document("doc", ""), Err(XmlError::MissingRoot)));
        assert!(matches!(
            read_document("doc", r#"<doc type="number">seven</doc>"#),
            Err(XmlError::InvalidScalar { kind: "number", .. })
        ));
        assert!(matches!(
            read_document("doc", r#"<doc type="date">x</doc>"#),
            Err(XmlError::UnknownType { .. })
        ));
        assert!(matches!(
            read_document("doc", "<doc><a>1</a>"),
            Err(XmlError::UnexpectedEof { .. }) | Err(XmlError::Syntax(_))
        ));
    }
}
