//! Raw tree to L5X XML.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Elements whose text Logix writes as CDATA.
pub const CDATA_ELEMENTS: &[&str] = &[
    "Text",
    "Comment",
    "Description",
    "RevisionNote",
    "Line",
    "AdditionalHelpText",
    "ExtendedDescription",
];

/// `Data`/`DefaultData` formats whose payload is CDATA.
const CDATA_FORMATS: &[&str] = &["L5K", "String"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Spaces per nesting level; 0 writes everything on one line.
    pub indent: usize,
    pub standalone: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            standalone: true,
        }
    }
}

/// Serializes `{root_element: node}` with the default options.
pub fn write_l5x(document: &Value) -> Result<String> {
    write_l5x_with(document, &WriterOptions::default())
}

pub fn write_l5x_with(document: &Value, options: &WriterOptions) -> Result<String> {
    let Some(root) = document.as_object() else {
        bail!("L5X document must be a map with one root element");
    };
    let elements: Vec<(&String, &Value)> = root.iter().filter(|(_, v)| !v.is_null()).collect();
    if elements.len() != 1 {
        bail!(
            "L5X document must have exactly one root element, found {}",
            elements.len()
        );
    }

    let mut writer = if options.indent > 0 {
        Writer::new_with_indent(Vec::new(), b' ', options.indent)
    } else {
        Writer::new(Vec::new())
    };
    let standalone = options.standalone.then_some("yes");
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), standalone)))
        .context("write XML declaration")?;
    for (name, value) in elements {
        write_element(&mut writer, name, value)?;
    }
    String::from_utf8(writer.into_inner()).context("writer produced invalid UTF-8")
}

pub fn write_l5x_file(document: &Value, path: impl AsRef<Path>, options: &WriterOptions) -> Result<()> {
    let path = path.as_ref();
    let xml = write_l5x_with(document, options)?;
    fs::write(path, xml).with_context(|| format!("write L5X file {}", path.display()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
            Ok(())
        }
        Value::Object(node) => write_node(writer, name, node),
        scalar => {
            let text = scalar_text(scalar);
            if text.is_empty() {
                writer.write_event(Event::Empty(BytesStart::new(name)))?;
                return Ok(());
            }
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            write_text(writer, &text, CDATA_ELEMENTS.contains(&name))?;
            writer.write_event(Event::End(BytesEnd::new(name)))?;
            Ok(())
        }
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, name: &str, node: &Map<String, Value>) -> Result<()> {
    let mut start = BytesStart::new(name);
    let mut children = Vec::new();
    let mut text = None;
    for (key, value) in node {
        if value.is_null() {
            continue;
        }
        if let Some(attr) = key.strip_prefix('@') {
            let value = scalar_text(value);
            start.push_attribute((attr, value.as_str()));
        } else if key == "#text" {
            text = Some(scalar_text(value));
        } else {
            children.push((key, value));
        }
    }

    let text = text.filter(|t| !t.is_empty());
    if children.is_empty() && text.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = text {
        let format = node.get("@Format").and_then(Value::as_str).unwrap_or("");
        let cdata = CDATA_ELEMENTS.contains(&name) || CDATA_FORMATS.contains(&format);
        write_text(writer, &text, cdata)?;
    }
    for (key, value) in children {
        write_element(writer, key, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_text(writer: &mut Writer<Vec<u8>>, text: &str, cdata: bool) -> Result<()> {
    // A CDATA section cannot contain its own terminator.
    if cdata && !text.contains("]]>") {
        writer.write_event(Event::CData(BytesCData::new(text)))?;
    } else {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        // Nested structures never appear in attribute position.
        other => other.to_string(),
    }
}
