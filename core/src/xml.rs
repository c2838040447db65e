//! Generic XML to `serde_json::Value` conversion.
//!
//! Each element becomes a value:
//! - attributes go under `"@attributes"`, inserted before any child;
//! - child elements are keyed by name, repeated names collect into an array;
//! - an element with only text becomes a string;
//! - text next to attributes is kept under `"#text"`, text next to child
//!   elements is dropped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

struct Node {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let mut attributes = Map::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(|e| e.to_string())?;
            attributes.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            children: Map::new(),
            text: String::new(),
        })
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.attributes.is_empty() && self.children.is_empty() {
            return if text.is_empty() {
                Value::Object(Map::new())
            } else {
                Value::String(text.to_string())
            };
        }

        let mut object = Map::new();
        if !self.attributes.is_empty() {
            object.insert("@attributes".to_string(), Value::Object(self.attributes));
        }
        if self.children.is_empty() && !text.is_empty() {
            object.insert("#text".to_string(), Value::String(text.to_string()));
        }
        object.extend(self.children);
        Value::Object(object)
    }
}

/// Convert a document into the value of its root element.
pub fn to_value(document: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root = None;

    loop {
        let finished = match reader.read_event().map_err(|e| format!("XML parse error: {e}"))? {
            Event::Start(start) => {
                stack.push(Node::open(&start)?);
                None
            }
            Event::Empty(start) => Some(Node::open(&start)?),
            Event::End(_) => stack.pop(),
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text.unescape().map_err(|e| e.to_string())?);
                }
                None
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
                None
            }
            Event::Eof => break,
            _ => None,
        };

        if let Some(node) = finished {
            let name = node.name.clone();
            let value = node.into_value();
            match stack.last_mut() {
                Some(parent) => parent.add_child(name, value),
                None if root.is_none() => root = Some(value),
                None => return Err("more than one root element".to_string()),
            }
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

/// Contents of the first entry of the root element.
///
/// For a root holding child elements this is the value of the first child
/// (or the collected array when that name repeats). A text-only root yields
/// its text. Returns `None` for an empty root.
pub fn first_element_contents(document: &str) -> Result<Option<Value>, String> {
    let root = to_value(document)?;
    Ok(match root {
        Value::Object(map) => map.into_iter().next().map(|(_, value)| value),
        Value::String(text) => Some(Value::String(text)),
        other => Some(other),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_elements_and_repeats() {
        let value = to_value(
            "<response><parts><part><code>A1</code></part><part><code>B2</code></part></parts></response>",
        )
        .unwrap();
        assert_eq!(
            value,
            json!({"parts": {"part": [{"code": "A1"}, {"code": "B2"}]}})
        );
    }

    #[test]
    fn attributes_come_first() {
        let value = to_value(r#"<offer id="7" status="on"><price>10.5</price></offer>"#).unwrap();
        assert_eq!(
            value,
            json!({"@attributes": {"id": "7", "status": "on"}, "price": "10.5"})
        );
        let first = value.as_object().unwrap().keys().next().unwrap().clone();
        assert_eq!(first, "@attributes");
    }

    #[test]
    fn text_with_attributes_and_entities() {
        let value = to_value(r#"<code lang="pt">Pe&amp;as</code>"#).unwrap();
        assert_eq!(value, json!({"@attributes": {"lang": "pt"}, "#text": "Pe&as"}));
    }

    #[test]
    fn empty_elements_and_cdata() {
        let value = to_value("<r><a/><b><![CDATA[<raw>]]></b></r>").unwrap();
        assert_eq!(value, json!({"a": {}, "b": "<raw>"}));
    }

    #[test]
    fn first_element_contents_of_root() {
        let contents = first_element_contents(
            "<?xml version=\"1.0\"?><response><items><item>1</item><item>2</item></items><total>2</total></response>",
        )
        .unwrap();
        assert_eq!(contents, Some(json!({"item": ["1", "2"]})));

        assert_eq!(first_element_contents("<r>plain</r>").unwrap(), Some(json!("plain")));
        assert_eq!(first_element_contents("<r></r>").unwrap(), None);
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(to_value("<a><b></a>").is_err());
        assert!(to_value("<a>").is_err());
        assert!(to_value("").is_err());
        assert!(to_value("<a/><b/>").is_err());
    }
}
