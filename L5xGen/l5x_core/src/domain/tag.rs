//! Tags, AOI parameters and local tags, with alias-chain resolution.

use std::collections::HashSet;

use serde_json::Value;

use crate::domain::collection::NamedList;
use crate::domain::datatype::DatatypeRegistry;
use crate::domain::meta::TreeObject;
use crate::domain::tree::{self, Meta};
use crate::domain::validation::{
    escape_markup, parse_rockwell_bool, rockwell_bool, validate_name, validate_one_of,
    validate_rockwell_bool,
};
use crate::error::{L5xError, L5xResult};
use crate::ports::TemplateSource;

pub const TAG_TEMPLATE: &str = "_tag.L5X";

pub const TAG_CLASSES: &[&str] = &["Standard", "Safety"];
pub const TAG_TYPES: &[&str] = &["Base", "Structure", "Array"];
pub const EXTERNAL_ACCESS: &[&str] = &["None", "ReadOnly", "Read/Write"];

/// Owner of a tag; alias lookups start in the owner and fall back to controller scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagScope {
    Controller,
    Program(String),
    Aoi(String),
}

impl TagScope {
    pub fn is_controller(&self) -> bool {
        matches!(self, TagScope::Controller)
    }
}

/// Tag tables visible from one scope.
#[derive(Clone, Copy, Default)]
pub struct TagLookup<'a> {
    pub local: Option<&'a NamedList<Tag>>,
    pub controller: Option<&'a NamedList<Tag>>,
}

impl<'a> TagLookup<'a> {
    pub fn find(&self, name: &str) -> Option<&'a Tag> {
        self.local
            .and_then(|tags| tags.get(name))
            .or_else(|| self.controller.and_then(|tags| tags.get(name)))
    }
}

/// `Data[Format=Decorated]/Structure/DataValueMember`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValueMember {
    pub name: String,
    pub datatype: String,
    pub radix: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Tag {
    meta: Meta,
    scope: TagScope,
}

impl TreeObject for Tag {
    const KEY_ORDER: &'static [&'static str] = &[
        "@Name",
        "@Class",
        "@TagType",
        "@DataType",
        "@Dimensions",
        "@Radix",
        "@AliasFor",
        "@Constant",
        "@ExternalAccess",
        "ConsumeInfo",
        "ProduceInfo",
        "Description",
        "Data",
    ];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

impl Tag {
    /// Wraps a raw `Tag` (or `Parameter`/`LocalTag`) node. The name, class, constant flag and
    /// dimensions are validated when present; tag type and external access only on set, since
    /// exported projects carry `Alias` and `Read Only` spellings.
    pub fn from_meta(meta: Meta, scope: TagScope) -> L5xResult<Self> {
        let mut tag = Self { meta, scope };
        tag.validate()?;
        tag.init_dict_order();
        Ok(tag)
    }

    pub fn from_value(value: Value, scope: TagScope) -> L5xResult<Self> {
        Self::from_meta(tree::into_meta(value, "tag")?, scope)
    }

    pub fn from_template(
        templates: &dyn TemplateSource,
        name: &str,
        datatype: &str,
        scope: TagScope,
    ) -> L5xResult<Self> {
        let value = tree::get_default_meta_data(None, templates, TAG_TEMPLATE, Some("Tag"))?;
        let mut tag = Self::from_value(value, scope)?;
        tag.set_name(name)?;
        tag.set_datatype(datatype)?;
        Ok(tag)
    }

    fn validate(&self) -> L5xResult<()> {
        if let Some(name) = self.attr("@Name").filter(|n| !n.is_empty()) {
            validate_name("tag name", name)?;
        }
        if let Some(class) = self.attr("@Class") {
            validate_one_of("tag class", class, TAG_CLASSES)?;
        }
        if let Some(constant) = self.attr("@Constant") {
            validate_rockwell_bool("constant", constant)?;
        }
        if let Some(dimensions) = self.attr("@Dimensions") {
            validate_dimensions(dimensions)?;
        }
        Ok(())
    }

    pub fn scope(&self) -> &TagScope {
        &self.scope
    }

    pub(crate) fn set_scope(&mut self, scope: TagScope) {
        self.scope = scope;
    }

    pub fn class(&self) -> &str {
        self.attr("@Class").unwrap_or("")
    }

    pub fn set_class(&mut self, class: &str) -> L5xResult<()> {
        validate_one_of("tag class", class, TAG_CLASSES)?;
        tree::set_attr(&mut self.meta, "@Class", class);
        Ok(())
    }

    pub fn is_safety(&self) -> bool {
        self.class() == "Safety"
    }

    pub fn tag_type(&self) -> &str {
        self.attr("@TagType").unwrap_or("")
    }

    pub fn set_tag_type(&mut self, tag_type: &str) -> L5xResult<()> {
        validate_one_of("tag type", tag_type, TAG_TYPES)?;
        tree::set_attr(&mut self.meta, "@TagType", tag_type);
        Ok(())
    }

    pub fn datatype(&self) -> &str {
        self.attr("@DataType").unwrap_or("")
    }

    /// Changing the datatype invalidates the stored value, so `Data` is cleared.
    pub fn set_datatype(&mut self, datatype: &str) -> L5xResult<()> {
        validate_name("datatype", datatype)?;
        tree::set_attr(&mut self.meta, "@DataType", datatype);
        self.meta
            .insert("Data".to_string(), Value::Array(Vec::new()));
        Ok(())
    }

    pub fn dimensions(&self) -> &str {
        self.attr("@Dimensions").unwrap_or("")
    }

    pub fn set_dimensions(&mut self, dimensions: &str) -> L5xResult<()> {
        validate_dimensions(dimensions)?;
        tree::set_attr(&mut self.meta, "@Dimensions", dimensions);
        Ok(())
    }

    pub fn radix(&self) -> &str {
        self.attr("@Radix").unwrap_or("")
    }

    pub fn external_access(&self) -> &str {
        self.attr("@ExternalAccess").unwrap_or("")
    }

    pub fn set_external_access(&mut self, access: &str) -> L5xResult<()> {
        validate_one_of("external access", access, EXTERNAL_ACCESS)?;
        tree::set_attr(&mut self.meta, "@ExternalAccess", access);
        Ok(())
    }

    pub fn is_constant(&self) -> bool {
        parse_rockwell_bool(self.attr("@Constant"))
    }

    pub fn set_constant(&mut self, constant: bool) {
        tree::set_attr(&mut self.meta, "@Constant", rockwell_bool(constant));
    }

    pub fn opc_ua_access(&self) -> &str {
        self.attr("@OpcUaAccess").unwrap_or("")
    }

    /// AOI parameter usage (`Input`, `Output`, `InOut`); empty for plain tags.
    pub fn usage(&self) -> &str {
        self.attr("@Usage").unwrap_or("")
    }

    pub fn alias_for(&self) -> &str {
        self.attr("@AliasFor").unwrap_or("")
    }

    pub fn is_alias(&self) -> bool {
        !self.alias_for().is_empty()
    }

    /// `Other.Member:1` -> `Other`.
    pub fn alias_for_base_name(&self) -> &str {
        let alias = self.alias_for();
        let base = alias.split('.').next().unwrap_or("");
        base.split(':').next().unwrap_or("")
    }

    pub fn data(&self) -> Vec<&Value> {
        tree::as_list(self.meta.get("Data"))
    }

    fn data_with_format(&self, format: &str) -> Option<&Value> {
        self.data()
            .into_iter()
            .find(|d| d.get("@Format").and_then(Value::as_str) == Some(format))
    }

    pub fn decorated_data(&self) -> Option<&Value> {
        self.data_with_format("Decorated")
    }

    pub fn l5k_data(&self) -> Option<&Value> {
        self.data_with_format("L5K")
    }

    pub fn datavalue_members(&self) -> Vec<DataValueMember> {
        let Some(structure) = self.decorated_data().and_then(|d| d.get("Structure")) else {
            return Vec::new();
        };
        tree::as_list(structure.get("DataValueMember"))
            .into_iter()
            .filter_map(Value::as_object)
            .map(|m| DataValueMember {
                name: tree::attr_or(m, "@Name", "").to_string(),
                datatype: tree::attr_or(m, "@DataType", "").to_string(),
                radix: tree::attr_or(m, "@Radix", "").to_string(),
                value: tree::attr_or(m, "@Value", "").to_string(),
            })
            .collect()
    }

    /// Writes `@Value` of one decorated data value member, markup-escaped.
    pub fn set_datavalue_member(&mut self, member: &str, value: &str) -> L5xResult<()> {
        let slot = self
            .decorated_data_members_mut()
            .and_then(|members| {
                members.iter_mut().find(|m| {
                    m.get("@Name").and_then(Value::as_str) == Some(member)
                })
            })
            .and_then(Value::as_object_mut)
            .ok_or_else(|| L5xError::lookup("data value member", member))?;
        tree::set_attr(slot, "@Value", escape_markup(value));
        Ok(())
    }

    fn decorated_data_members_mut(&mut self) -> Option<&mut Vec<Value>> {
        let data = self.meta.get_mut("Data")?;
        let decorated = match data {
            Value::Array(items) => items
                .iter_mut()
                .find(|d| d.get("@Format").and_then(Value::as_str) == Some("Decorated"))?,
            other if other.get("@Format").and_then(Value::as_str) == Some("Decorated") => other,
            _ => return None,
        };
        let structure = decorated.as_object_mut()?.get_mut("Structure")?;
        let slot = structure.as_object_mut()?.get_mut("DataValueMember")?;
        if !slot.is_array() {
            let single = slot.take();
            *slot = Value::Array(vec![single]);
        }
        slot.as_array_mut()
    }

    /// Tag name followed by every endpoint of its datatype; empty when the type is unknown.
    pub fn endpoint_operands(&self, registry: &dyn DatatypeRegistry) -> Vec<String> {
        if self.datatype().is_empty() {
            return Vec::new();
        }
        let Some(datatype) = registry.find_datatype(self.datatype()) else {
            return Vec::new();
        };
        datatype
            .endpoint_operands(registry)
            .iter()
            .map(|suffix| format!("{}{}", self.name(), suffix))
            .collect()
    }

    /// Tag the alias base name points at, looked up locally first.
    pub fn get_parent_tag<'a>(&self, lookup: &TagLookup<'a>) -> Option<&'a Tag> {
        if !self.is_alias() {
            return None;
        }
        lookup.find(self.alias_for_base_name())
    }

    /// End of the alias chain. An unresolved link stops the walk at the current tag.
    pub fn get_base_tag<'a>(&'a self, lookup: &TagLookup<'a>) -> L5xResult<&'a Tag> {
        let mut visited = HashSet::new();
        let mut current = self;
        visited.insert(current.name().to_string());
        while let Some(parent) = current.get_parent_tag(lookup) {
            if !visited.insert(parent.name().to_string()) {
                return Err(L5xError::CycleDetected(parent.name().to_string()));
            }
            current = parent;
        }
        Ok(current)
    }

    /// Fully resolved operand path for this tag plus `additional` (e.g. `.Member`).
    /// Member paths from every alias link are carried along.
    pub fn get_alias_string(&self, lookup: &TagLookup<'_>, additional: &str) -> L5xResult<String> {
        let mut visited = HashSet::new();
        let mut current = self;
        let mut suffix = additional.to_string();
        loop {
            if !current.is_alias() {
                return Ok(format!("{}{}", current.name(), suffix));
            }
            if !visited.insert(current.name().to_string()) {
                return Err(L5xError::CycleDetected(current.name().to_string()));
            }
            let alias = current.alias_for();
            let Some(parent) = current.get_parent_tag(lookup) else {
                return Ok(format!("{}{}", alias, suffix));
            };
            if let Some(dot) = alias.find('.') {
                suffix = format!("{}{}", &alias[dot..], suffix);
            }
            current = parent;
        }
    }
}

/// Space separated non-negative array dimensions, e.g. `10` or `2 3 4`. Empty means scalar.
pub fn validate_dimensions(dimensions: &str) -> L5xResult<()> {
    for part in dimensions.split_whitespace() {
        if part.parse::<u32>().is_err() {
            return Err(L5xError::validation(
                "dimensions",
                format!("'{}' must be non-negative integers", dimensions),
            ));
        }
    }
    Ok(())
}
