//! User and built-in datatypes, and the member expansion into endpoint operands.

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::domain::collection::NamedList;
use crate::domain::meta::TreeObject;
use crate::domain::tree::{self, Meta};
use crate::domain::validation::parse_rockwell_bool;
use crate::error::L5xResult;
use crate::ports::TemplateSource;

pub const DATATYPE_TEMPLATE: &str = "_datatype.L5X";

/// Types whose values have no addressable members.
pub const ATOMIC_DATATYPES: &[&str] = &[
    "BIT", "BOOL", "SINT", "INT", "DINT", "LINT", "REAL", "LREAL", "USINT", "UINT", "UDINT",
    "ULINT", "STRING", "TIMER",
];

pub fn is_atomic_datatype(name: &str) -> bool {
    ATOMIC_DATATYPES.contains(&name)
}

/// Name based datatype resolution; the controller is the usual implementor.
pub trait DatatypeRegistry {
    fn find_datatype(&self, name: &str) -> Option<&Datatype>;
}

impl DatatypeRegistry for NamedList<Datatype> {
    fn find_datatype(&self, name: &str) -> Option<&Datatype> {
        self.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct DatatypeMember {
    meta: Meta,
}

impl TreeObject for DatatypeMember {
    const KEY_ORDER: &'static [&'static str] = &[
        "@Name",
        "@DataType",
        "@Dimension",
        "@Radix",
        "@Hidden",
        "@Target",
        "@BitNumber",
        "@ExternalAccess",
        "Description",
    ];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

impl DatatypeMember {
    pub fn from_meta(meta: Meta) -> Self {
        Self { meta }
    }

    pub fn datatype(&self) -> &str {
        self.attr("@DataType").unwrap_or("")
    }

    pub fn dimension(&self) -> &str {
        self.attr("@Dimension").unwrap_or("")
    }

    pub fn set_dimension(&mut self, dimension: &str) {
        tree::set_attr(&mut self.meta, "@Dimension", dimension);
    }

    pub fn is_hidden(&self) -> bool {
        parse_rockwell_bool(self.attr("@Hidden"))
    }

    pub fn is_atomic(&self) -> bool {
        is_atomic_datatype(self.datatype())
    }

    pub fn resolve<'r>(&self, registry: &'r dyn DatatypeRegistry) -> Option<&'r Datatype> {
        registry.find_datatype(self.datatype())
    }
}

#[derive(Debug, Clone)]
pub struct Datatype {
    meta: Meta,
    members: Vec<DatatypeMember>,
    builtin: bool,
    endpoints: OnceCell<Vec<String>>,
}

impl TreeObject for Datatype {
    const KEY_ORDER: &'static [&'static str] =
        &["@Name", "@Family", "@Class", "Description", "Members"];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn meta_data(&self) -> Value {
        let mut meta = self.meta.clone();
        let members = self
            .members
            .iter()
            .map(|m| Value::Object(m.meta.clone()))
            .collect();
        tree::put_list(&mut meta, "Members", "Member", members);
        Value::Object(meta)
    }
}

impl Datatype {
    pub fn from_meta(mut meta: Meta) -> L5xResult<Self> {
        let members = tree::take_list(&mut meta, "Members", "Member")
            .into_iter()
            .map(|m| tree::into_meta(m, "datatype member").map(DatatypeMember::from_meta))
            .collect::<L5xResult<Vec<_>>>()?;
        let mut datatype = Self {
            meta,
            members,
            builtin: false,
            endpoints: OnceCell::new(),
        };
        datatype.init_dict_order();
        Ok(datatype)
    }

    pub fn from_value(value: Value) -> L5xResult<Self> {
        Self::from_meta(tree::into_meta(value, "datatype")?)
    }

    pub fn from_template(templates: &dyn TemplateSource, name: &str) -> L5xResult<Self> {
        let value =
            tree::get_default_meta_data(None, templates, DATATYPE_TEMPLATE, Some("DataType"))?;
        let mut datatype = Self::from_value(value)?;
        datatype.set_name(name)?;
        Ok(datatype)
    }

    pub(crate) fn builtin(meta: Meta) -> L5xResult<Self> {
        let mut datatype = Self::from_meta(meta)?;
        datatype.builtin = true;
        Ok(datatype)
    }

    pub fn family(&self) -> &str {
        self.attr("@Family").unwrap_or("")
    }

    pub fn class(&self) -> &str {
        self.attr("@Class").unwrap_or("")
    }

    pub fn members(&self) -> &[DatatypeMember] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&DatatypeMember> {
        self.members.iter().find(|m| m.name() == name)
    }

    /// Appends a member and drops the cached endpoint operands of this datatype.
    pub fn add_member(&mut self, member: DatatypeMember) {
        self.members.push(member);
        self.invalidate();
    }

    pub fn is_atomic(&self) -> bool {
        is_atomic_datatype(self.name())
    }

    /// Member of the injected built-in set; built-ins are never exported.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Dotted member paths reachable from a value of this type, computed once and cached.
    /// The cache is not refreshed when a referenced datatype changes; see [`Datatype::invalidate`].
    pub fn endpoint_operands(&self, registry: &dyn DatatypeRegistry) -> &[String] {
        self.endpoints
            .get_or_init(|| self.expand(registry, &mut Vec::new()))
    }

    pub fn invalidate(&mut self) {
        self.endpoints = OnceCell::new();
    }

    fn expand(&self, registry: &dyn DatatypeRegistry, stack: &mut Vec<String>) -> Vec<String> {
        if self.is_atomic() {
            return vec![String::new()];
        }
        if stack.iter().any(|n| n == self.name()) {
            return Vec::new();
        }
        stack.push(self.name().to_string());

        let mut endpoints = Vec::new();
        for member in self.members.iter().filter(|m| !m.is_hidden()) {
            if member.is_atomic() {
                endpoints.push(format!(".{}", member.name()));
                continue;
            }
            let Some(nested) = member.resolve(registry) else {
                continue;
            };
            for suffix in nested.expand(registry, stack) {
                endpoints.push(format!(".{}{}", member.name(), suffix));
            }
        }

        stack.pop();
        endpoints
    }
}
