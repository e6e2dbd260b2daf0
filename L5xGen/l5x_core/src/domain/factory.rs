//! Asset construction by kind and scored controller profile matching.

use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::aoi::{Aoi, AOI_TEMPLATE};
use crate::domain::controller::Controller;
use crate::domain::datatype::{Datatype, DATATYPE_TEMPLATE};
use crate::domain::meta::TreeObject;
use crate::domain::module::{Module, MODULE_TEMPLATE};
use crate::domain::program::{Program, PROGRAM_TEMPLATE};
use crate::domain::tag::{Tag, TagScope, TAG_TEMPLATE};
use crate::domain::tree::{self, Meta};
use crate::error::L5xResult;
use crate::ports::TemplateSource;

/// The five controller-level asset collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Datatype,
    Tag,
    Program,
    Aoi,
    Module,
}

impl AssetKind {
    /// Import order: datatypes before the tags that use them.
    pub const ALL: [AssetKind; 5] = [
        AssetKind::Datatype,
        AssetKind::Tag,
        AssetKind::Program,
        AssetKind::Aoi,
        AssetKind::Module,
    ];

    pub fn container_key(self) -> &'static str {
        match self {
            AssetKind::Datatype => "DataTypes",
            AssetKind::Tag => "Tags",
            AssetKind::Program => "Programs",
            AssetKind::Aoi => "AddOnInstructionDefinitions",
            AssetKind::Module => "Modules",
        }
    }

    pub fn item_key(self) -> &'static str {
        match self {
            AssetKind::Datatype => "DataType",
            AssetKind::Tag => "Tag",
            AssetKind::Program => "Program",
            AssetKind::Aoi => "AddOnInstructionDefinition",
            AssetKind::Module => "Module",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            AssetKind::Datatype => DATATYPE_TEMPLATE,
            AssetKind::Tag => TAG_TEMPLATE,
            AssetKind::Program => PROGRAM_TEMPLATE,
            AssetKind::Aoi => AOI_TEMPLATE,
            AssetKind::Module => MODULE_TEMPLATE,
        }
    }

    pub fn from_container_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.container_key() == key)
    }

    /// Guesses the kind of a bare node from the keys it carries.
    pub fn from_shape(value: &Value) -> Option<Self> {
        let meta = value.as_object()?;
        let has = |key: &str| meta.contains_key(key);
        if has("Parameters") || has("LocalTags") || has("@ExecutePrescan") {
            Some(AssetKind::Aoi)
        } else if has("Routines") || has("@MainRoutineName") {
            Some(AssetKind::Program)
        } else if has("@CatalogNumber") || has("Ports") {
            Some(AssetKind::Module)
        } else if has("Members") || has("@Family") {
            Some(AssetKind::Datatype)
        } else if has("@DataType") || has("@TagType") {
            Some(AssetKind::Tag)
        } else {
            None
        }
    }
}

/// A typed controller asset of any kind.
#[derive(Debug, Clone)]
pub enum Asset {
    Datatype(Datatype),
    Tag(Tag),
    Program(Program),
    Aoi(Aoi),
    Module(Module),
}

impl Asset {
    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Datatype(_) => AssetKind::Datatype,
            Asset::Tag(_) => AssetKind::Tag,
            Asset::Program(_) => AssetKind::Program,
            Asset::Aoi(_) => AssetKind::Aoi,
            Asset::Module(_) => AssetKind::Module,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Asset::Datatype(a) => a.name(),
            Asset::Tag(a) => a.name(),
            Asset::Program(a) => a.name(),
            Asset::Aoi(a) => a.name(),
            Asset::Module(a) => a.name(),
        }
    }

    pub fn meta_data(&self) -> Value {
        match self {
            Asset::Datatype(a) => a.meta_data(),
            Asset::Tag(a) => a.meta_data(),
            Asset::Program(a) => a.meta_data(),
            Asset::Aoi(a) => a.meta_data(),
            Asset::Module(a) => a.meta_data(),
        }
    }
}

/// Builds an asset from its raw node. `container` only matters for tags.
pub fn create_asset(kind: AssetKind, meta: Value, container: &TagScope) -> L5xResult<Asset> {
    let meta = tree::into_meta(meta, kind.item_key())?;
    build(kind, meta, container)
}

/// Builds an asset from `meta`, or from the kind's default template when `meta` is `None`.
pub fn create_asset_or_default(
    kind: AssetKind,
    meta: Option<Value>,
    templates: &dyn TemplateSource,
    container: &TagScope,
) -> L5xResult<Asset> {
    let value = tree::get_default_meta_data(meta, templates, kind.template(), Some(kind.item_key()))?;
    create_asset(kind, value, container)
}

fn build(kind: AssetKind, meta: Meta, container: &TagScope) -> L5xResult<Asset> {
    Ok(match kind {
        AssetKind::Datatype => Asset::Datatype(Datatype::from_meta(meta)?),
        AssetKind::Tag => Asset::Tag(Tag::from_meta(meta, container.clone())?),
        AssetKind::Program => Asset::Program(Program::from_meta(meta)?),
        AssetKind::Aoi => Asset::Aoi(Aoi::from_meta(meta)?),
        AssetKind::Module => Asset::Module(Module::from_meta(meta)?),
    })
}

/// Scores how well a raw L5X document fits a controller profile.
pub trait ControllerMatcher: Send + Sync {
    fn name(&self) -> &str;

    /// 0.0 (no evidence) to 1.0.
    fn calculate_score(&self, document: &Value) -> f64;
}

/// Wildcard name patterns identifying one plant standard (`*` any run, `?` one character).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternMatcher {
    pub name: String,
    pub datatype_patterns: Vec<String>,
    pub module_patterns: Vec<String>,
    pub program_patterns: Vec<String>,
    pub safety_program_patterns: Vec<String>,
    pub tag_patterns: Vec<String>,
}

const CHECK_WEIGHT: f64 = 0.2;

impl PatternMatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn check_datatypes(&self, document: &Value) -> bool {
        let items = controller_items(document, AssetKind::Datatype);
        matches_any(&items, &self.datatype_patterns)
    }

    pub fn check_modules(&self, document: &Value) -> bool {
        let items = controller_items(document, AssetKind::Module);
        matches_any(&items, &self.module_patterns)
    }

    pub fn check_programs(&self, document: &Value) -> bool {
        let items = controller_items(document, AssetKind::Program);
        matches_any(&items, &self.program_patterns)
    }

    pub fn check_safety_programs(&self, document: &Value) -> bool {
        let items: Vec<&Value> = controller_items(document, AssetKind::Program)
            .into_iter()
            .filter(|p| p.get("@Class").and_then(Value::as_str) == Some("Safety"))
            .collect();
        matches_any(&items, &self.safety_program_patterns)
    }

    pub fn check_tags(&self, document: &Value) -> bool {
        let items = controller_items(document, AssetKind::Tag);
        matches_any(&items, &self.tag_patterns)
    }
}

impl ControllerMatcher for PatternMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn calculate_score(&self, document: &Value) -> f64 {
        let checks = [
            self.check_datatypes(document),
            self.check_modules(document),
            self.check_programs(document),
            self.check_safety_programs(document),
            self.check_tags(document),
        ];
        checks.iter().filter(|hit| **hit).count() as f64 * CHECK_WEIGHT
    }
}

fn controller_items(document: &Value, kind: AssetKind) -> Vec<&Value> {
    document
        .get("RSLogix5000Content")
        .and_then(|c| c.get("Controller"))
        .and_then(Value::as_object)
        .map(|c| tree::child_list(c, kind.container_key(), kind.item_key()))
        .unwrap_or_default()
}

fn matches_any(items: &[&Value], patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let compiled: Vec<Regex> = patterns.iter().filter_map(|p| wildcard_regex(p)).collect();
    items
        .iter()
        .filter_map(|item| item.get("@Name").and_then(Value::as_str))
        .any(|name| compiled.iter().any(|re| re.is_match(name)))
}

pub fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut expr = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).ok()
}

pub const DEFAULT_MIN_SCORE: f64 = 0.3;

/// Picks the registered profile that best fits a document.
pub struct ControllerFactory {
    matchers: Vec<Box<dyn ControllerMatcher>>,
    min_score: f64,
}

impl Default for ControllerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerFactory {
    pub fn new() -> Self {
        Self {
            matchers: Vec::new(),
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn from_profiles(profiles: &[PatternMatcher]) -> Self {
        let mut factory = Self::new();
        for profile in profiles {
            factory.register(profile.clone());
        }
        factory
    }

    pub fn register(&mut self, matcher: impl ControllerMatcher + 'static) {
        self.matchers.push(Box::new(matcher));
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub fn matcher_names(&self) -> Vec<&str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// Highest scoring matcher at or above the minimum; the earliest registered wins ties.
    pub fn get_best_match(&self, document: Option<&Value>) -> Option<&dyn ControllerMatcher> {
        let document = match document {
            Some(v) if !is_empty_document(v) => v,
            _ => {
                warn!("no controller data provided");
                return None;
            }
        };
        if self.matchers.is_empty() {
            debug!("no controller matchers registered");
            return None;
        }

        let mut best: Option<(f64, &dyn ControllerMatcher)> = None;
        for matcher in &self.matchers {
            let score = matcher.calculate_score(document);
            if score + f64::EPSILON < self.min_score {
                info!(
                    "{} score {:.2} below min score {:.2}",
                    matcher.name(),
                    score,
                    self.min_score
                );
                continue;
            }
            info!("matched {} with score {:.2}", matcher.name(), score);
            if best.map_or(true, |(top, _)| score > top + f64::EPSILON) {
                best = Some((score, matcher.as_ref()));
            }
        }

        match best {
            Some((score, matcher)) => {
                info!("best match: {} with score {:.2}", matcher.name(), score);
                Some(matcher)
            }
            None => {
                info!("no matches found above min score {:.2}", self.min_score);
                None
            }
        }
    }

    /// Builds the controller and tags it with the best matching profile, if any.
    pub fn create_controller(&self, document: Value) -> L5xResult<Controller> {
        let profile = self.get_best_match(Some(&document)).map(|m| m.name().to_string());
        let mut controller = Controller::from_value(document)?;
        controller.set_profile(profile);
        Ok(controller)
    }
}

fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({"RSLogix5000Content": {"@SoftwareRevision": "33.01", "Controller": {
            "@Name": "Line1",
            "DataTypes": {"DataType": [{"@Name": "zz_Version"}, {"@Name": "UDT_Motor"}]},
            "Modules": {"Module": {"@Name": "Local"}},
            "Programs": {"Program": [
                {"@Name": "MCP", "@Class": "Standard"},
                {"@Name": "s_Common", "@Class": "Safety"}
            ]},
            "Tags": {"Tag": {"@Name": "z_JunkData", "@DataType": "DINT"}}
        }}})
    }

    fn gm() -> PatternMatcher {
        PatternMatcher {
            name: "gm".into(),
            datatype_patterns: vec!["zz_Version".into()],
            module_patterns: vec!["zz_*".into()],
            program_patterns: vec!["MCP".into()],
            safety_program_patterns: vec!["s_Common".into()],
            tag_patterns: vec!["z_*Data".into()],
        }
    }

    #[test]
    fn score_counts_matching_checks() {
        let score = gm().calculate_score(&document());
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn wildcards_anchor_the_whole_name() {
        let re = wildcard_regex("sz_*").unwrap();
        assert!(re.is_match("sz_Panel"));
        assert!(!re.is_match("xsz_Panel"));
        assert!(wildcard_regex("A?C").unwrap().is_match("ABC"));
        assert!(!wildcard_regex("A.C").unwrap().is_match("ABC"));
    }

    #[test]
    fn best_match_respects_minimum_and_registration_order() {
        let weak = PatternMatcher {
            name: "weak".into(),
            program_patterns: vec!["MCP".into()],
            ..Default::default()
        };
        let mut twin = gm();
        twin.name = "twin".into();

        let mut factory = ControllerFactory::new();
        factory.register(weak);
        factory.register(gm());
        factory.register(twin);

        let doc = document();
        assert_eq!(factory.get_best_match(Some(&doc)).unwrap().name(), "gm");
        assert!(factory.get_best_match(None).is_none());
        assert!(factory.get_best_match(Some(&json!({}))).is_none());

        let only_weak = ControllerFactory::from_profiles(&[PatternMatcher {
            name: "weak".into(),
            program_patterns: vec!["MCP".into()],
            ..Default::default()
        }]);
        assert!(only_weak.get_best_match(Some(&doc)).is_none());
    }

    #[test]
    fn asset_kind_from_shape() {
        assert_eq!(
            AssetKind::from_shape(&json!({"@Name": "U", "Members": ""})),
            Some(AssetKind::Datatype)
        );
        assert_eq!(
            AssetKind::from_shape(&json!({"@Name": "T", "@DataType": "BOOL"})),
            Some(AssetKind::Tag)
        );
        assert_eq!(
            AssetKind::from_shape(&json!({"@Name": "P", "Routines": ""})),
            Some(AssetKind::Program)
        );
        assert_eq!(
            AssetKind::from_shape(&json!({"@Name": "A", "Parameters": "", "Routines": ""})),
            Some(AssetKind::Aoi)
        );
        assert_eq!(AssetKind::from_shape(&json!("x")), None);
        assert_eq!(
            AssetKind::from_container_key("AddOnInstructionDefinitions"),
            Some(AssetKind::Aoi)
        );
    }

    #[test]
    fn create_asset_dispatches_by_kind() {
        let asset = create_asset(
            AssetKind::Tag,
            json!({"@Name": "Run", "@DataType": "BOOL"}),
            &TagScope::Program("Main".into()),
        )
        .unwrap();
        assert_eq!(asset.kind(), AssetKind::Tag);
        assert_eq!(asset.name(), "Run");
        match asset {
            Asset::Tag(tag) => assert_eq!(tag.scope(), &TagScope::Program("Main".into())),
            other => panic!("unexpected asset {:?}", other.kind()),
        }
        assert!(create_asset(AssetKind::Program, json!([1]), &TagScope::Controller).is_err());
    }
}
