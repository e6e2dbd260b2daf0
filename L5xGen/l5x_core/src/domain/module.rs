//! I/O modules, their ports, connections and connection tags.

use serde_json::Value;

use crate::domain::collection::NamedList;
use crate::domain::meta::TreeObject;
use crate::domain::tree::{self, Meta};
use crate::domain::validation::{
    parse_rockwell_bool, rockwell_bool, validate_integer, validate_ip_address,
};
use crate::error::{L5xError, L5xResult};
use crate::ports::TemplateSource;

pub const MODULE_TEMPLATE: &str = "_module.L5X";

/// Name of the controller's own module.
pub const LOCAL_MODULE: &str = "Local";

/// Bytes per element of a connection tag array.
pub fn data_multiplier(datatype: &str) -> L5xResult<i64> {
    match datatype {
        "" => Ok(0),
        "SINT" => Ok(1),
        "INT" => Ok(2),
        "DINT" | "REAL" | "DWORD" => Ok(4),
        "LINT" | "LREAL" | "LWORD" => Ok(8),
        other => Err(L5xError::validation(
            "connection tag datatype",
            format!("unsupported datatype '{}'", other),
        )),
    }
}

/// Read-only view over `ConfigTag`, `InputTag` or `OutputTag`.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTag<'a> {
    meta: &'a Meta,
}

impl<'a> ConnectionTag<'a> {
    fn from_value(value: Option<&'a Value>) -> Option<Self> {
        value.and_then(Value::as_object).map(|meta| Self { meta })
    }

    pub fn meta(&self) -> &'a Meta {
        self.meta
    }

    pub fn config_size(&self) -> L5xResult<i64> {
        match tree::attr(self.meta, "@ConfigSize") {
            Some(size) => validate_integer("ConfigSize", size),
            None => Ok(0),
        }
    }

    fn decorated_structure(&self) -> Option<&'a Meta> {
        tree::as_list(self.meta.get("Data"))
            .into_iter()
            .find(|d| d.get("@Format").and_then(Value::as_str) == Some("Decorated"))
            .and_then(|d| d.get("Structure"))
            .and_then(Value::as_object)
    }

    pub fn datatype(&self) -> &'a str {
        self.decorated_structure()
            .and_then(|s| tree::attr(s, "@DataType"))
            .unwrap_or("")
    }

    /// Element count of the decorated array member.
    pub fn dimensions(&self) -> &'a str {
        self.decorated_structure()
            .and_then(|s| s.get("ArrayMember"))
            .and_then(Value::as_object)
            .and_then(|a| tree::attr(a, "@Dimensions"))
            .unwrap_or("")
    }

    /// Byte size: array dimensions times the element width; 0 when no size is recorded.
    pub fn resolved_size(&self) -> L5xResult<i64> {
        let dimensions = self.dimensions();
        if dimensions.is_empty() {
            return Ok(0);
        }
        let count = validate_integer("ArrayMember Dimensions", dimensions)?;
        count
            .checked_mul(data_multiplier(self.datatype())?)
            .ok_or_else(|| {
                L5xError::validation(
                    "ArrayMember Dimensions",
                    format!("{} elements of {} overflow the byte size", count, self.datatype()),
                )
            })
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    meta: Meta,
}

impl TreeObject for Module {
    const KEY_ORDER: &'static [&'static str] = &[
        "@Name",
        "@CatalogNumber",
        "@Vendor",
        "@ProductType",
        "@ProductCode",
        "@Major",
        "@Minor",
        "@ParentModule",
        "@ParentModPortId",
        "@Inhibited",
        "@MajorFault",
        "Description",
        "EKey",
        "Ports",
        "Communications",
    ];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

impl Module {
    pub fn from_meta(meta: Meta) -> L5xResult<Self> {
        let mut module = Self { meta };
        module.init_dict_order();
        Ok(module)
    }

    pub fn from_value(value: Value) -> L5xResult<Self> {
        Self::from_meta(tree::into_meta(value, "module")?)
    }

    pub fn from_template(templates: &dyn TemplateSource, name: &str) -> L5xResult<Self> {
        let value = tree::get_default_meta_data(None, templates, MODULE_TEMPLATE, Some("Module"))?;
        let mut module = Self::from_value(value)?;
        module.set_name(name)?;
        Ok(module)
    }

    pub fn catalog_number(&self) -> &str {
        self.attr("@CatalogNumber").unwrap_or("")
    }

    pub fn set_catalog_number(&mut self, catalog_number: &str) {
        tree::set_attr(&mut self.meta, "@CatalogNumber", catalog_number);
    }

    fn set_integer(&mut self, key: &str, value: &str) -> L5xResult<()> {
        let parsed = validate_integer(key.trim_start_matches('@'), value)?;
        tree::set_attr(&mut self.meta, key, parsed.to_string());
        Ok(())
    }

    pub fn vendor(&self) -> &str {
        self.attr("@Vendor").unwrap_or("")
    }

    pub fn set_vendor(&mut self, vendor: &str) -> L5xResult<()> {
        self.set_integer("@Vendor", vendor)
    }

    pub fn product_type(&self) -> &str {
        self.attr("@ProductType").unwrap_or("")
    }

    pub fn set_product_type(&mut self, product_type: &str) -> L5xResult<()> {
        self.set_integer("@ProductType", product_type)
    }

    pub fn product_code(&self) -> &str {
        self.attr("@ProductCode").unwrap_or("")
    }

    pub fn set_product_code(&mut self, product_code: &str) -> L5xResult<()> {
        self.set_integer("@ProductCode", product_code)
    }

    pub fn major_version(&self) -> &str {
        self.attr("@Major").unwrap_or("")
    }

    pub fn set_major_version(&mut self, major: &str) -> L5xResult<()> {
        self.set_integer("@Major", major)
    }

    pub fn minor_version(&self) -> &str {
        self.attr("@Minor").unwrap_or("")
    }

    pub fn set_minor_version(&mut self, minor: &str) -> L5xResult<()> {
        self.set_integer("@Minor", minor)
    }

    pub fn is_inhibited(&self) -> bool {
        parse_rockwell_bool(self.attr("@Inhibited"))
    }

    pub fn set_inhibited(&mut self, inhibited: bool) {
        tree::set_attr(&mut self.meta, "@Inhibited", rockwell_bool(inhibited));
    }

    pub fn major_fault(&self) -> bool {
        parse_rockwell_bool(self.attr("@MajorFault"))
    }

    pub fn set_major_fault(&mut self, fault: bool) {
        tree::set_attr(&mut self.meta, "@MajorFault", rockwell_bool(fault));
    }

    pub fn parent_module_name(&self) -> &str {
        self.attr("@ParentModule").unwrap_or("")
    }

    pub fn parent_module<'m>(&self, modules: &'m NamedList<Module>) -> L5xResult<&'m Module> {
        modules
            .get(self.parent_module_name())
            .ok_or_else(|| L5xError::lookup("module", self.parent_module_name()))
    }

    pub fn set_parent_module(&mut self, parent: &Module) {
        tree::set_attr(&mut self.meta, "@ParentModule", parent.name());
    }

    pub fn ekey(&self) -> Option<&Value> {
        self.meta.get("EKey")
    }

    pub fn ports(&self) -> Vec<&Meta> {
        tree::child_list(&self.meta, "Ports", "Port")
            .into_iter()
            .filter_map(Value::as_object)
            .collect()
    }

    /// Address of the first port.
    pub fn ip_address(&self) -> &str {
        self.ports()
            .into_iter()
            .next()
            .and_then(|p| tree::attr(p, "@Address"))
            .unwrap_or("")
    }

    pub fn set_ip_address(&mut self, address: &str) -> L5xResult<()> {
        validate_ip_address(address)?;
        if self.ports().is_empty() {
            return Err(L5xError::lookup("port", "first port"));
        }
        let ports = tree::list_mut(&mut self.meta, "Ports", "Port");
        let port = ports
            .first_mut()
            .and_then(Value::as_object_mut)
            .ok_or_else(|| L5xError::lookup("port", "first port"))?;
        tree::set_attr(port, "@Address", address);
        Ok(())
    }

    /// `@Address` of the first port whose `@Type` is one of `port_types`.
    pub fn port_address(&self, port_types: &[&str]) -> Option<&str> {
        self.ports()
            .into_iter()
            .find(|p| tree::attr(p, "@Type").is_some_and(|t| port_types.contains(&t)))
            .and_then(|p| tree::attr(p, "@Address"))
    }

    pub fn communications(&self) -> Option<&Meta> {
        self.meta.get("Communications").and_then(Value::as_object)
    }

    pub fn connections(&self) -> Vec<&Meta> {
        match self.communications() {
            Some(comms) => tree::child_list(comms, "Connections", "Connection")
                .into_iter()
                .filter_map(Value::as_object)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn controller_connection(&self) -> Option<&Meta> {
        self.connections().into_iter().next()
    }

    fn controller_connection_mut(&mut self) -> Option<&mut Meta> {
        let comms = self.meta.get_mut("Communications")?.as_object_mut()?;
        if !matches!(comms.get("Connections"), Some(Value::Object(_))) {
            return None;
        }
        tree::list_mut(comms, "Connections", "Connection")
            .first_mut()
            .and_then(Value::as_object_mut)
    }

    fn connection_point(&self, key: &str) -> L5xResult<i64> {
        match self.controller_connection() {
            None => Ok(-1),
            Some(conn) => match tree::attr(conn, key) {
                Some(value) => validate_integer(key.trim_start_matches('@'), value),
                None => Ok(0),
            },
        }
    }

    pub fn config_connection_point(&self) -> L5xResult<i64> {
        self.connection_point("@ConfigCxnPoint")
    }

    pub fn input_connection_point(&self) -> L5xResult<i64> {
        self.connection_point("@InputCxnPoint")
    }

    pub fn output_connection_point(&self) -> L5xResult<i64> {
        self.connection_point("@OutputCxnPoint")
    }

    fn connection_size(&self, key: &str) -> L5xResult<i64> {
        match self.controller_connection().and_then(|c| tree::attr(c, key)) {
            Some(value) => validate_integer(key.trim_start_matches('@'), value),
            None => Ok(0),
        }
    }

    pub fn config_connection_size(&self) -> L5xResult<i64> {
        match self.config_tag() {
            Some(tag) => tag.config_size(),
            None => Ok(0),
        }
    }

    pub fn input_connection_size(&self) -> L5xResult<i64> {
        self.connection_size("@InputSize")
    }

    pub fn output_connection_size(&self) -> L5xResult<i64> {
        self.connection_size("@OutputSize")
    }

    pub fn config_tag(&self) -> Option<ConnectionTag<'_>> {
        ConnectionTag::from_value(self.communications().and_then(|c| c.get("ConfigTag")))
    }

    pub fn input_tag(&self) -> Option<ConnectionTag<'_>> {
        ConnectionTag::from_value(self.controller_connection().and_then(|c| c.get("InputTag")))
    }

    pub fn output_tag(&self) -> Option<ConnectionTag<'_>> {
        ConnectionTag::from_value(self.controller_connection().and_then(|c| c.get("OutputTag")))
    }

    pub fn rpi(&self) -> &str {
        self.controller_connection()
            .and_then(|c| tree::attr(c, "@RPI"))
            .unwrap_or("")
    }

    pub fn set_rpi(&mut self, rpi: &str) -> L5xResult<()> {
        validate_integer("RPI", rpi)?;
        let conn = self
            .controller_connection_mut()
            .ok_or_else(|| L5xError::lookup("connection", "controller connection"))?;
        tree::set_attr(conn, "@RPI", rpi);
        Ok(())
    }
}
