//! Default templates for newly constructed objects.

use std::path::{Path, PathBuf};

use log::debug;
use serde_json::Value;

use super::reader::{read_l5x, read_l5x_str};
use crate::error::{L5xError, L5xResult};
use crate::ports::TemplateSource;

const EMBEDDED: &[(&str, &str)] = &[
    ("root.L5X", include_str!("assets/root.L5X")),
    ("_program.L5X", include_str!("assets/_program.L5X")),
    ("_routine.L5X", include_str!("assets/_routine.L5X")),
    ("_datatype.L5X", include_str!("assets/_datatype.L5X")),
    ("_aoi.L5X", include_str!("assets/_aoi.L5X")),
    ("_module.L5X", include_str!("assets/_module.L5X")),
    ("_rung.L5X", include_str!("assets/_rung.L5X")),
    ("_tag.L5X", include_str!("assets/_tag.L5X")),
];

/// Templates compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl EmbeddedTemplates {
    pub fn names() -> impl Iterator<Item = &'static str> {
        EMBEDDED.iter().map(|(name, _)| *name)
    }

    fn source(path: &str) -> Option<&'static str> {
        let file = file_name(path);
        EMBEDDED
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(file))
            .map(|(_, xml)| *xml)
    }
}

impl TemplateSource for EmbeddedTemplates {
    fn load_template(&self, path: &str, key: Option<&str>) -> L5xResult<Value> {
        let xml = Self::source(path)
            .ok_or_else(|| L5xError::configuration(format!("no embedded template {}", path)))?;
        let document = read_l5x_str(xml)
            .map_err(|e| L5xError::configuration(format!("template {}: {:#}", path, e)))?;
        select(document, path, key)
    }
}

/// Templates read from a directory; files missing there fall back to the embedded set.
#[derive(Debug, Clone)]
pub struct DirTemplates {
    dir: PathBuf,
}

impl DirTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateSource for DirTemplates {
    fn load_template(&self, path: &str, key: Option<&str>) -> L5xResult<Value> {
        let candidate = self.dir.join(file_name(path));
        if !candidate.is_file() {
            return EmbeddedTemplates.load_template(path, key);
        }
        debug!("loading template override {}", candidate.display());
        let document = read_l5x(&candidate)
            .map_err(|e| L5xError::configuration(format!("template {}: {:#}", path, e)))?;
        select(document, path, key)
    }
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

fn select(document: Value, path: &str, key: Option<&str>) -> L5xResult<Value> {
    let Some(key) = key else {
        return Ok(document);
    };
    match document {
        Value::Object(mut map) => match map.remove(key) {
            Some(node @ Value::Object(_)) => Ok(node),
            _ => Err(L5xError::configuration(format!(
                "template {} has no {} element",
                path, key
            ))),
        },
        _ => Err(L5xError::configuration(format!("template {} is not a document", path))),
    }
}
