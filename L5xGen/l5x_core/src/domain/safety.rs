use serde::Serialize;
use serde_json::Value;

use crate::domain::tree::{self, Meta};
use crate::domain::validation::{parse_rockwell_bool, rockwell_bool};
use crate::error::{L5xError, L5xResult};

pub const SAFETY_LEVELS: &[&str] = &["SIL1", "SIL2", "SIL3", "SIL4"];

const TAG_MAP_KEY: &str = "SafetyTagMap";

/// One `standard=safety` entry of the safety tag map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyTagPair {
    pub tag_name: String,
    pub safety_tag_name: String,
}

/// `Controller/SafetyInfo`: safety lock flags, SIL level and the standard-to-safety tag map.
#[derive(Debug, Clone, Default)]
pub struct SafetyInfo {
    meta: Meta,
}

impl SafetyInfo {
    pub fn from_meta(meta: Meta) -> Self {
        Self { meta }
    }

    /// Missing and empty nodes read as an empty `SafetyInfo`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(meta) => Self { meta },
            _ => Self::default(),
        }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    pub fn meta_data(&self) -> Value {
        Value::Object(self.meta.clone())
    }

    pub fn safety_locked(&self) -> bool {
        parse_rockwell_bool(tree::attr(&self.meta, "@SafetyLocked"))
    }

    pub fn set_safety_locked(&mut self, locked: bool) {
        tree::set_attr(&mut self.meta, "@SafetyLocked", rockwell_bool(locked));
    }

    pub fn signature_runmode_protect(&self) -> bool {
        parse_rockwell_bool(tree::attr(&self.meta, "@SignatureRunModeProtect"))
    }

    pub fn set_signature_runmode_protect(&mut self, protect: bool) {
        tree::set_attr(
            &mut self.meta,
            "@SignatureRunModeProtect",
            rockwell_bool(protect),
        );
    }

    pub fn configure_safety_io_always(&self) -> bool {
        parse_rockwell_bool(tree::attr(&self.meta, "@ConfigureSafetyIOAlways"))
    }

    pub fn set_configure_safety_io_always(&mut self, always: bool) {
        tree::set_attr(
            &mut self.meta,
            "@ConfigureSafetyIOAlways",
            rockwell_bool(always),
        );
    }

    pub fn safety_level(&self) -> &str {
        tree::attr_or(&self.meta, "@SafetyLevel", "")
    }

    /// Accepts any label naming one of the SIL levels, e.g. `SIL2/PLd`.
    pub fn set_safety_level(&mut self, level: &str) -> L5xResult<()> {
        if !SAFETY_LEVELS.iter().any(|sil| level.contains(sil)) {
            return Err(L5xError::validation(
                "safety level",
                format!("{} does not name one of {:?}", level, SAFETY_LEVELS),
            ));
        }
        tree::set_attr(&mut self.meta, "@SafetyLevel", level);
        Ok(())
    }

    pub fn safety_tag_map(&self) -> &str {
        tree::attr(&self.meta, TAG_MAP_KEY).unwrap_or("").trim()
    }

    /// Replaces the whole map. Every non-empty entry needs exactly one `=`;
    /// an empty map is written as a null slot.
    pub fn set_safety_tag_map(&mut self, map: &str) -> L5xResult<()> {
        let map = map.trim();
        if map.is_empty() {
            self.meta.insert(TAG_MAP_KEY.to_string(), Value::Null);
            return Ok(());
        }
        for entry in map.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if entry.matches('=').count() != 1 {
                return Err(L5xError::validation(
                    "safety tag map",
                    format!("entry {} must be of the form tag=safety_tag", entry),
                ));
            }
        }
        tree::set_attr(&mut self.meta, TAG_MAP_KEY, map);
        Ok(())
    }

    pub fn safety_tag_pairs(&self) -> Vec<SafetyTagPair> {
        parse_pairs(self.safety_tag_map())
    }

    /// Appends `tag=safety_tag`; an existing identical pair moves to the end.
    pub fn add_safety_tag_mapping(&mut self, tag: &str, safety_tag: &str) -> L5xResult<()> {
        let (tag, safety_tag) = (tag.trim(), safety_tag.trim());
        if tag.is_empty() || safety_tag.is_empty() {
            return Err(L5xError::validation(
                "safety tag map",
                "tag and safety tag names must not be empty",
            ));
        }
        let mut pairs = self.safety_tag_pairs();
        pairs.retain(|p| !(p.tag_name == tag && p.safety_tag_name == safety_tag));
        pairs.push(SafetyTagPair {
            tag_name: tag.to_string(),
            safety_tag_name: safety_tag.to_string(),
        });
        self.set_safety_tag_map(&format_pairs(&pairs))
    }

    /// Removing a pair that is not mapped is a no-op.
    pub fn remove_safety_tag_mapping(&mut self, tag: &str, safety_tag: &str) -> L5xResult<()> {
        let (tag, safety_tag) = (tag.trim(), safety_tag.trim());
        let mut pairs = self.safety_tag_pairs();
        let before = pairs.len();
        pairs.retain(|p| !(p.tag_name == tag && p.safety_tag_name == safety_tag));
        if pairs.len() == before {
            return Ok(());
        }
        self.set_safety_tag_map(&format_pairs(&pairs))
    }
}

fn parse_pairs(map: &str) -> Vec<SafetyTagPair> {
    map.split(',')
        .filter_map(|entry| entry.split_once('='))
        .map(|(tag, safety)| SafetyTagPair {
            tag_name: tag.trim().to_string(),
            safety_tag_name: safety.trim().to_string(),
        })
        .filter(|p| !p.tag_name.is_empty())
        .collect()
}

fn format_pairs(pairs: &[SafetyTagPair]) -> String {
    pairs
        .iter()
        .map(|p| format!("{}={}", p.tag_name, p.safety_tag_name))
        .collect::<Vec<_>>()
        .join(", ")
}
