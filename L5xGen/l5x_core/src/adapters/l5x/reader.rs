//! L5X XML to raw tree.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

/// Element under construction.
struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8(start.name().as_ref().to_vec())
            .context("element name is not UTF-8")?;
        let mut attributes = Map::new();
        for attr in start.attributes() {
            let attr = attr.with_context(|| format!("malformed attribute on <{}>", name))?;
            let key = String::from_utf8(attr.key.as_ref().to_vec())
                .context("attribute name is not UTF-8")?;
            let value = attr
                .unescape_value()
                .with_context(|| format!("bad attribute value {} on <{}>", key, name))?;
            attributes.insert(format!("@{}", key), Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            children: Map::new(),
            text: String::new(),
        })
    }

    /// Text-only elements collapse to a string, everything else to a map.
    fn close(self) -> (String, Value) {
        if self.attributes.is_empty() && self.children.is_empty() {
            return (self.name, Value::String(self.text));
        }
        let mut node = self.attributes;
        node.extend(self.children);
        if !self.text.is_empty() {
            node.insert("#text".to_string(), Value::String(self.text));
        }
        (self.name, Value::Object(node))
    }
}

/// Repeated children become an array at the position of the first occurrence.
fn attach(parent: &mut Map<String, Value>, key: String, value: Value) {
    match parent.get_mut(&key) {
        None => {
            parent.insert(key, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Parses an L5X document into `{root_element: node}`.
pub fn read_l5x_str(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut document = Map::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(Frame::open(&e)?),
            Ok(Event::Empty(e)) => {
                let (key, value) = Frame::open(&e)?.close();
                match stack.last_mut() {
                    Some(parent) => attach(&mut parent.children, key, value),
                    None => attach(&mut document, key, value),
                }
            }
            Ok(Event::End(_)) => {
                let Some(frame) = stack.pop() else {
                    bail!("unbalanced end tag at byte {}", reader.buffer_position());
                };
                let (key, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => attach(&mut parent.children, key, value),
                    None => attach(&mut document, key, value),
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(frame) = stack.last_mut() {
                    let text = e.unescape().context("bad text content")?;
                    frame.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(frame) = stack.last_mut() {
                    let text = String::from_utf8(e.into_inner().into_owned())
                        .context("CDATA section is not UTF-8")?;
                    frame.text.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => bail!(
                "XML error at byte {}: {}",
                reader.buffer_position(),
                err
            ),
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        bail!("unclosed element <{}>", open.name);
    }
    if document.is_empty() {
        bail!("document has no root element");
    }
    Ok(Value::Object(document))
}

pub fn read_l5x(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)
        .with_context(|| format!("read L5X file {}", path.display()))?;
    read_l5x_str(&xml).with_context(|| format!("parse L5X file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn attributes_children_and_cdata() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<RSLogix5000Content SchemaRevision="1.0">
  <Controller Name="Line1">
    <Tags/>
    <Programs>
      <Program Name="Main">
        <Routines>
          <Routine Name="R" Type="RLL">
            <RLLContent>
              <Rung Number="0" Type="N">
                <Text><![CDATA[XIC(A)[XIO(B),XIC(C)]OTE(D);]]></Text>
              </Rung>
              <Rung Number="1" Type="N">
                <Comment><![CDATA[line one
line two]]></Comment>
                <Text><![CDATA[OTE(&x);]]></Text>
              </Rung>
            </RLLContent>
          </Routine>
        </Routines>
      </Program>
    </Programs>
  </Controller>
</RSLogix5000Content>"#;
        let doc = read_l5x_str(xml).unwrap();
        let controller = &doc["RSLogix5000Content"]["Controller"];
        assert_eq!(doc["RSLogix5000Content"]["@SchemaRevision"], "1.0");
        assert_eq!(controller["Tags"], json!(""));
        let rungs = &controller["Programs"]["Program"]["Routines"]["Routine"]["RLLContent"]["Rung"];
        assert_eq!(rungs[0]["Text"], "XIC(A)[XIO(B),XIC(C)]OTE(D);");
        assert_eq!(rungs[1]["Comment"], "line one\nline two");
        assert_eq!(rungs[1]["Text"], "OTE(&x);");
        assert_eq!(rungs[1]["@Number"], "1");
    }

    #[test]
    fn text_next_to_attributes_is_hash_text() {
        let doc = read_l5x_str(r#"<Data Format="L5K"><![CDATA[[0,1]]]></Data>"#).unwrap();
        assert_eq!(doc, json!({"Data": {"@Format": "L5K", "#text": "[0,1]"}}));
        let doc = read_l5x_str("<Tag Name=\"A&amp;B\"><Description>x &lt; y</Description></Tag>").unwrap();
        assert_eq!(doc["Tag"]["@Name"], "A&B");
        assert_eq!(doc["Tag"]["Description"], "x < y");
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(read_l5x_str("<A><B></A>").is_err());
        assert!(read_l5x_str("<A>").is_err());
        assert!(read_l5x_str("").is_err());
    }
}
