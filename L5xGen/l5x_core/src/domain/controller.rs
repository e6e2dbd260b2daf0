//! Controller aggregate: the root of an L5X project.
//!
//! The controller lifts its five asset collections out of `RSLogix5000Content/Controller`
//! into typed lists and writes them back on [`TreeObject::meta_data`]. Built-in datatypes
//! are injected on every build and never exported.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::aoi::Aoi;
use crate::domain::builtins::builtin_datatypes;
use crate::domain::collection::NamedList;
use crate::domain::datatype::{Datatype, DatatypeRegistry};
use crate::domain::factory::{create_asset, Asset, AssetKind};
use crate::domain::instruction::{Instruction, InstructionType};
use crate::domain::meta::TreeObject;
use crate::domain::module::{Module, LOCAL_MODULE};
use crate::domain::program::Program;
use crate::domain::routine::HasRoutines;
use crate::domain::safety::SafetyInfo;
use crate::domain::tag::{Tag, TagLookup, TagScope};
use crate::domain::tree::{self, Meta};
use crate::domain::validation::{validate_integer, validate_ip_address};
use crate::error::{L5xError, L5xResult};
use crate::ports::TemplateSource;

pub const ROOT_TEMPLATE: &str = "root.L5X";
pub const CONTENT_KEY: &str = "RSLogix5000Content";
pub const CONTROLLER_KEY: &str = "Controller";

pub const MAX_SLOT: u8 = 16;
const SLOT_PORT_TYPES: &[&str] = &["ICP", "5069"];

/// Scope of a textual rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenameScope {
    /// Controller tag collection only.
    Tag,
    /// Every string under the controller node.
    All,
}

/// Outcome of a bulk import; skipped items were logged as warnings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct Controller {
    /// Whole document with the controller node lifted out.
    document: Meta,
    meta: Meta,
    datatypes: NamedList<Datatype>,
    tags: NamedList<Tag>,
    programs: NamedList<Program>,
    aois: NamedList<Aoi>,
    modules: NamedList<Module>,
    safety_info: SafetyInfo,
    had_safety_info: bool,
    profile: Option<String>,
    ip_address: Option<String>,
    slot: Option<u8>,
}

impl TreeObject for Controller {
    const KEY_ORDER: &'static [&'static str] = &[
        "@Use",
        "@Name",
        "@ProcessorType",
        "@MajorRev",
        "@MinorRev",
        "@TimeSlice",
        "@ShareUnusedTimeSlice",
        "@ProjectCreationDate",
        "@LastModifiedDate",
        "@SFCExecutionControl",
        "@SFCRestartPosition",
        "@SFCLastScan",
        "@ProjectSN",
        "@MatchProjectToController",
        "@CanUseRPIFromProducer",
        "@InhibitAutomaticFirmwareUpdate",
        "@PassThroughConfiguration",
        "@DownloadProjectDocumentationAndExtendedProperties",
        "@DownloadProjectCustomProperties",
        "@ReportMinorOverflow",
        "@CommPath",
        "Description",
        "RedundancyInfo",
        "Security",
        "SafetyInfo",
        "DataTypes",
        "Modules",
        "AddOnInstructionDefinitions",
        "Tags",
        "Programs",
        "Tasks",
    ];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// The full document, `RSLogix5000Content` included.
    fn meta_data(&self) -> Value {
        let mut document = self.document.clone();
        let content = document
            .entry(CONTENT_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(content) = content {
            content.insert(
                CONTROLLER_KEY.to_string(),
                Value::Object(self.controller_meta()),
            );
        }
        Value::Object(document)
    }
}

impl DatatypeRegistry for Controller {
    fn find_datatype(&self, name: &str) -> Option<&Datatype> {
        self.datatypes.get(name)
    }
}

impl Controller {
    /// Builds the typed model from a whole L5X document.
    pub fn from_value(value: Value) -> L5xResult<Self> {
        let mut document = tree::into_meta(value, "controller document")?;
        let content = match document.get_mut(CONTENT_KEY) {
            Some(Value::Object(content)) => content,
            _ => {
                return Err(L5xError::configuration(format!(
                    "document has no {} root",
                    CONTENT_KEY
                )))
            }
        };
        let meta = match content.get_mut(CONTROLLER_KEY).map(Value::take) {
            Some(Value::Object(meta)) => meta,
            _ => {
                return Err(L5xError::configuration(format!(
                    "{} has no {} node",
                    CONTENT_KEY, CONTROLLER_KEY
                )))
            }
        };
        Self::build(document, meta)
    }

    /// New controller from the `root.L5X` template.
    pub fn from_template(templates: &dyn TemplateSource, name: &str) -> L5xResult<Self> {
        let value = tree::get_default_meta_data(None, templates, ROOT_TEMPLATE, None)?;
        let mut controller = Self::from_value(value)?;
        controller.set_name(name)?;
        Ok(controller)
    }

    fn build(document: Meta, mut meta: Meta) -> L5xResult<Self> {
        tree::init_dict_order(&mut meta, Self::KEY_ORDER);

        let mut datatypes: NamedList<Datatype> = builtin_datatypes().iter().cloned().collect();
        for raw in tree::take_list(&mut meta, "DataTypes", "DataType") {
            datatypes.add(Datatype::from_value(raw)?, None);
        }
        let tags = tree::take_list(&mut meta, "Tags", "Tag")
            .into_iter()
            .map(|t| Tag::from_value(t, TagScope::Controller))
            .collect::<L5xResult<NamedList<_>>>()?;
        let programs = tree::take_list(&mut meta, "Programs", "Program")
            .into_iter()
            .map(Program::from_value)
            .collect::<L5xResult<NamedList<_>>>()?;
        let aois = tree::take_list(
            &mut meta,
            "AddOnInstructionDefinitions",
            "AddOnInstructionDefinition",
        )
        .into_iter()
        .map(Aoi::from_value)
        .collect::<L5xResult<NamedList<_>>>()?;
        let modules = tree::take_list(&mut meta, "Modules", "Module")
            .into_iter()
            .map(Module::from_value)
            .collect::<L5xResult<NamedList<_>>>()?;

        let safety = meta.get_mut("SafetyInfo").map(Value::take);
        let had_safety_info = !matches!(safety, None | Some(Value::Null));
        let safety_info = safety.map(SafetyInfo::from_value).unwrap_or_default();

        debug!(
            "built controller {}: {} datatypes, {} tags, {} programs, {} aois, {} modules",
            tree::attr_or(&meta, "@Name", ""),
            datatypes.len(),
            tags.len(),
            programs.len(),
            aois.len(),
            modules.len()
        );

        Ok(Self {
            document,
            meta,
            datatypes,
            tags,
            programs,
            aois,
            modules,
            safety_info,
            had_safety_info,
            profile: None,
            ip_address: None,
            slot: None,
        })
    }

    /// Controller node with every typed collection written back; built-ins excluded.
    pub fn controller_meta(&self) -> Meta {
        let mut meta = self.meta.clone();
        if self.had_safety_info || !self.safety_info.is_empty() {
            meta.insert("SafetyInfo".to_string(), self.safety_info.meta_data());
        }
        tree::put_list(
            &mut meta,
            "DataTypes",
            "DataType",
            self.datatypes
                .iter()
                .filter(|d| !d.is_builtin())
                .map(TreeObject::meta_data)
                .collect(),
        );
        tree::put_list(
            &mut meta,
            "Modules",
            "Module",
            self.modules.iter().map(TreeObject::meta_data).collect(),
        );
        tree::put_list(
            &mut meta,
            "AddOnInstructionDefinitions",
            "AddOnInstructionDefinition",
            self.aois.iter().map(TreeObject::meta_data).collect(),
        );
        tree::put_list(
            &mut meta,
            "Tags",
            "Tag",
            self.tags.iter().map(TreeObject::meta_data).collect(),
        );
        tree::put_list(
            &mut meta,
            "Programs",
            "Program",
            self.programs.iter().map(TreeObject::meta_data).collect(),
        );
        meta
    }

    /// Commits typed state to the tree and rebuilds every collection from it.
    /// The rebuilt model replaces the current one only when the whole rebuild succeeds.
    pub fn compile(&mut self) -> L5xResult<()> {
        let (document, meta) = self.split_document();
        let mut rebuilt = Self::build(document, meta)?;
        rebuilt.profile = self.profile.clone();
        rebuilt.ip_address = self.ip_address.clone();
        rebuilt.slot = self.slot;
        *self = rebuilt;
        Ok(())
    }

    fn split_document(&self) -> (Meta, Meta) {
        (self.document.clone(), self.controller_meta())
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn set_profile(&mut self, profile: Option<String>) {
        self.profile = profile;
    }

    fn content(&self) -> Option<&Meta> {
        self.document.get(CONTENT_KEY).and_then(Value::as_object)
    }

    fn content_mut(&mut self) -> &mut Meta {
        let slot = self
            .document
            .entry(CONTENT_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        tree::ensure_object(slot)
    }

    pub fn software_revision(&self) -> &str {
        self.content()
            .and_then(|c| tree::attr(c, "@SoftwareRevision"))
            .unwrap_or("")
    }

    pub fn processor_type(&self) -> &str {
        self.attr("@ProcessorType").unwrap_or("")
    }

    pub fn created_date(&self) -> Option<&str> {
        self.attr("@ProjectCreationDate")
    }

    pub fn modified_date(&self) -> Option<&str> {
        self.attr("@LastModifiedDate")
    }

    pub fn comm_path(&self) -> &str {
        self.attr("@CommPath").unwrap_or("")
    }

    pub fn set_comm_path(&mut self, path: &str) {
        tree::set_attr(&mut self.meta, "@CommPath", path);
    }

    pub fn major_revision(&self) -> L5xResult<i64> {
        self.revision_part("@MajorRev")
    }

    pub fn minor_revision(&self) -> L5xResult<i64> {
        self.revision_part("@MinorRev")
    }

    fn revision_part(&self, key: &str) -> L5xResult<i64> {
        let field = key.trim_start_matches('@');
        match self.attr(key) {
            Some(text) if !text.is_empty() => validate_integer(field, text),
            _ => Err(L5xError::validation(field, "revision is not set")),
        }
    }

    /// `major.minor`, e.g. `33.11`.
    pub fn revision(&self) -> L5xResult<String> {
        Ok(format!("{}.{}", self.major_revision()?, self.minor_revision()?))
    }

    pub fn set_major_revision(&mut self, major: u32) -> L5xResult<()> {
        let minor = self.minor_revision().unwrap_or(0);
        self.apply_revision(i64::from(major), minor)
    }

    pub fn set_minor_revision(&mut self, minor: u32) -> L5xResult<()> {
        let major = self.major_revision().unwrap_or(0);
        self.apply_revision(major, i64::from(minor))
    }

    /// Writes the controller revision, the document software revision and the
    /// firmware revision of the `Local` module together.
    fn apply_revision(&mut self, major: i64, minor: i64) -> L5xResult<()> {
        if !self.modules.contains(LOCAL_MODULE) {
            return Err(L5xError::lookup("module", LOCAL_MODULE));
        }
        if let Some(local) = self.modules.get_mut(LOCAL_MODULE) {
            local.set_major_version(&major.to_string())?;
            local.set_minor_version(&minor.to_string())?;
        }
        tree::set_attr(&mut self.meta, "@MajorRev", major.to_string());
        tree::set_attr(&mut self.meta, "@MinorRev", minor.to_string());
        tree::set_attr(
            self.content_mut(),
            "@SoftwareRevision",
            format!("{}.{}", major, minor),
        );
        info!("{}: revision set to {}.{}", self.name(), major, minor);
        Ok(())
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Four dot-separated octets in [0,255]; `None` clears the address.
    pub fn set_ip_address(&mut self, address: Option<&str>) -> L5xResult<()> {
        if let Some(address) = address {
            validate_ip_address(address)?;
        }
        self.ip_address = address.map(str::to_string);
        Ok(())
    }

    /// Explicit slot, else the address of the `Local` module's backplane port.
    pub fn slot(&self) -> Option<u8> {
        if self.slot.is_some() {
            return self.slot;
        }
        self.local_module()?
            .port_address(SLOT_PORT_TYPES)?
            .trim()
            .parse()
            .ok()
    }

    pub fn set_slot(&mut self, slot: Option<u8>) -> L5xResult<()> {
        if let Some(slot) = slot {
            if slot > MAX_SLOT {
                return Err(L5xError::validation(
                    "slot",
                    format!("{} is outside [0,{}]", slot, MAX_SLOT),
                ));
            }
        }
        self.slot = slot;
        Ok(())
    }

    pub fn local_module(&self) -> Option<&Module> {
        self.modules.get(LOCAL_MODULE)
    }

    pub fn safety_info(&self) -> &SafetyInfo {
        &self.safety_info
    }

    pub fn safety_info_mut(&mut self) -> &mut SafetyInfo {
        &mut self.safety_info
    }

    pub fn datatypes(&self) -> &NamedList<Datatype> {
        &self.datatypes
    }

    pub fn datatypes_mut(&mut self) -> &mut NamedList<Datatype> {
        &mut self.datatypes
    }

    /// Datatypes that are exported, i.e. everything but the built-ins.
    pub fn user_datatypes(&self) -> impl Iterator<Item = &Datatype> {
        self.datatypes.iter().filter(|d| !d.is_builtin())
    }

    pub fn tags(&self) -> &NamedList<Tag> {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut NamedList<Tag> {
        &mut self.tags
    }

    pub fn programs(&self) -> &NamedList<Program> {
        &self.programs
    }

    pub fn programs_mut(&mut self) -> &mut NamedList<Program> {
        &mut self.programs
    }

    pub fn aois(&self) -> &NamedList<Aoi> {
        &self.aois
    }

    pub fn aois_mut(&mut self) -> &mut NamedList<Aoi> {
        &mut self.aois
    }

    pub fn modules(&self) -> &NamedList<Module> {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut NamedList<Module> {
        &mut self.modules
    }

    pub fn add_datatype(&mut self, datatype: Datatype, index: Option<usize>) {
        self.datatypes.add(datatype, index);
    }

    pub fn add_tag(&mut self, mut tag: Tag, index: Option<usize>) {
        tag.set_scope(TagScope::Controller);
        self.tags.add(tag, index);
    }

    pub fn add_program(&mut self, program: Program, index: Option<usize>) {
        self.programs.add(program, index);
    }

    pub fn add_aoi(&mut self, aoi: Aoi, index: Option<usize>) {
        self.aois.add(aoi, index);
    }

    pub fn add_module(&mut self, module: Module, index: Option<usize>) {
        self.modules.add(module, index);
    }

    /// Adds to the matching collection; an existing name is replaced.
    pub fn add_asset(&mut self, asset: Asset, index: Option<usize>) {
        match asset {
            Asset::Datatype(a) => self.add_datatype(a, index),
            Asset::Tag(a) => self.add_tag(a, index),
            Asset::Program(a) => self.add_program(a, index),
            Asset::Aoi(a) => self.add_aoi(a, index),
            Asset::Module(a) => self.add_module(a, index),
        }
    }

    pub fn remove_asset(&mut self, kind: AssetKind, name: &str) -> Option<Asset> {
        match kind {
            AssetKind::Datatype => self.datatypes.remove(name).map(Asset::Datatype),
            AssetKind::Tag => self.tags.remove(name).map(Asset::Tag),
            AssetKind::Program => self.programs.remove(name).map(Asset::Program),
            AssetKind::Aoi => self.aois.remove(name).map(Asset::Aoi),
            AssetKind::Module => self.modules.remove(name).map(Asset::Module),
        }
    }

    pub fn asset_names(&self, kind: AssetKind) -> Vec<&str> {
        match kind {
            AssetKind::Datatype => self.datatypes.names(),
            AssetKind::Tag => self.tags.names(),
            AssetKind::Program => self.programs.names(),
            AssetKind::Aoi => self.aois.names(),
            AssetKind::Module => self.modules.names(),
        }
    }

    /// Copies assets out of another L5X document. Items that fail to build are logged
    /// and skipped; a document without a controller imports nothing.
    pub fn import_assets_from_l5x_dict(
        &mut self,
        source: &Value,
        asset_types: &[AssetKind],
    ) -> ImportSummary {
        let mut summary = ImportSummary::default();
        let Some(content) = source.get(CONTENT_KEY).and_then(Value::as_object) else {
            warn!("no {} found in provided L5X document", CONTENT_KEY);
            return summary;
        };
        let Some(controller) = content.get(CONTROLLER_KEY).and_then(Value::as_object) else {
            warn!("no {} found in {}", CONTROLLER_KEY, CONTENT_KEY);
            return summary;
        };
        if asset_types.is_empty() {
            warn!("no asset types provided to import");
            return summary;
        }

        for kind in asset_types {
            if !controller.contains_key(kind.container_key()) {
                warn!("no {} found in provided controller", kind.container_key());
                continue;
            }
            for item in tree::child_list(controller, kind.container_key(), kind.item_key()) {
                match create_asset(*kind, item.clone(), &TagScope::Controller) {
                    Ok(asset) => {
                        info!("{} {} imported", kind.item_key(), asset.name());
                        self.add_asset(asset, None);
                        summary.imported += 1;
                    }
                    Err(e) => {
                        warn!("failed to import {}: {}", kind.item_key(), e);
                        summary.skipped += 1;
                    }
                }
            }
        }
        summary
    }

    /// Textual rename of `from` to `to`, then a rebuild from the renamed tree.
    /// Empty names are ignored.
    pub fn rename_asset(&mut self, scope: RenameScope, from: &str, to: &str) -> L5xResult<()> {
        if from.is_empty() || to.is_empty() {
            return Ok(());
        }
        let (document, mut meta) = self.split_document();
        match scope {
            RenameScope::Tag => {
                if let Some(tags) = meta.get_mut("Tags") {
                    tree::replace_strings(tags, from, to);
                }
            }
            RenameScope::All => {
                for (_, value) in meta.iter_mut() {
                    tree::replace_strings(value, from, to);
                }
            }
        }
        let mut rebuilt = Self::build(document, meta)?;
        rebuilt.profile = self.profile.clone();
        rebuilt.ip_address = self.ip_address.clone();
        rebuilt.slot = self.slot;
        *self = rebuilt;
        Ok(())
    }

    pub fn safety_programs(&self) -> Vec<&Program> {
        self.programs.iter().filter(|p| p.is_safe()).collect()
    }

    pub fn standard_programs(&self) -> Vec<&Program> {
        self.programs.iter().filter(|p| !p.is_safe()).collect()
    }

    pub fn safety_tags(&self) -> Vec<&Tag> {
        self.tags.iter().filter(|t| t.is_safety()).collect()
    }

    pub fn standard_tags(&self) -> Vec<&Tag> {
        self.tags.iter().filter(|t| !t.is_safety()).collect()
    }

    /// Tag tables visible from `scope`; unknown owners see controller tags only.
    pub fn tag_lookup(&self, scope: &TagScope) -> TagLookup<'_> {
        let local = match scope {
            TagScope::Controller => None,
            TagScope::Program(name) => self.programs.get(name).map(Program::tags),
            TagScope::Aoi(name) => self.aois.get(name).map(Aoi::local_tags),
        };
        TagLookup {
            local,
            controller: Some(&self.tags),
        }
    }

    /// Resolves the alias chain of a tag owned by this controller or one of its programs.
    pub fn get_base_tag<'a>(&'a self, tag: &'a Tag) -> L5xResult<&'a Tag> {
        tag.get_base_tag(&self.tag_lookup(tag.scope()))
    }

    pub fn endpoint_operands(&self, tag: &Tag) -> Vec<String> {
        tag.endpoint_operands(self)
    }

    pub fn instructions(&self) -> Vec<&Instruction> {
        self.programs.iter().flat_map(HasRoutines::instructions).collect()
    }

    pub fn input_instructions(&self) -> Vec<&Instruction> {
        self.instructions().into_iter().filter(|i| i.is_input()).collect()
    }

    pub fn output_instructions(&self) -> Vec<&Instruction> {
        self.instructions().into_iter().filter(|i| i.is_output()).collect()
    }

    pub fn get_instructions(
        &self,
        instruction_filter: Option<&str>,
        operand_filter: Option<&str>,
    ) -> Vec<&Instruction> {
        self.programs
            .iter()
            .flat_map(|p| p.get_instructions(instruction_filter, operand_filter))
            .collect()
    }

    /// Mnemonic classification with this controller's add-on instructions known.
    pub fn classify_instruction(&self, instruction: &Instruction) -> InstructionType {
        instruction.classify_with(|name| self.aois.contains(name))
    }

    pub fn aoi_instructions(&self) -> Vec<&Instruction> {
        self.instructions()
            .into_iter()
            .filter(|i| self.classify_instruction(i) == InstructionType::Aoi)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({"RSLogix5000Content": {
            "@SchemaRevision": "1.0",
            "@SoftwareRevision": "32.11",
            "Controller": {
                "@Use": "Target",
                "@Name": "Line1",
                "@ProcessorType": "1756-L83ES",
                "@MajorRev": "32",
                "@MinorRev": "11",
                "@ProjectCreationDate": "Mon Jan 01 00:00:00 2024",
                "SafetyInfo": {"@SafetyLevel": "SIL2/PLd", "SafetyTagMap": "Std1=Safe1"},
                "DataTypes": {"DataType": {"@Name": "UDT_Motor", "@Family": "NoFamily",
                    "Members": {"Member": [
                        {"@Name": "Run", "@DataType": "BOOL", "@Hidden": "false"},
                        {"@Name": "Speed", "@DataType": "REAL", "@Hidden": "false"}
                    ]}}},
                "Modules": {"Module": {"@Name": "Local", "@CatalogNumber": "1756-L83ES",
                    "@Major": "32", "@Minor": "11",
                    "Ports": {"Port": [
                        {"@Id": "1", "@Address": "3", "@Type": "ICP"},
                        {"@Id": "2", "@Address": "192.168.1.10", "@Type": "Ethernet"}
                    ]}}},
                "AddOnInstructionDefinitions": {"AddOnInstructionDefinition": {
                    "@Name": "Valve", "@Revision": "1.0"}},
                "Tags": {"Tag": [
                    {"@Name": "Motor1", "@TagType": "Base", "@DataType": "UDT_Motor"},
                    {"@Name": "Run1", "@TagType": "Alias", "@AliasFor": "Motor1.Run"},
                    {"@Name": "SafeStop", "@Class": "Safety", "@TagType": "Base", "@DataType": "BOOL"}
                ]},
                "Programs": {"Program": [
                    {"@Name": "Main", "@MainRoutineName": "MainRoutine", "@Class": "Standard",
                        "Tags": {"Tag": {"@Name": "Local1", "@TagType": "Base", "@DataType": "BOOL"}},
                        "Routines": {"Routine": {"@Name": "MainRoutine", "@Type": "RLL",
                            "RLLContent": {"Rung": [
                                {"@Number": "0", "@Type": "N", "Text": "XIC(Local1)Valve(V1);"},
                                {"@Number": "1", "@Type": "N", "Text": "XIC(Run1)OTE(Out1);"}
                            ]}}}},
                    {"@Name": "Safe", "@Class": "Safety"}
                ]}
            }
        }})
    }

    fn controller() -> Controller {
        Controller::from_value(document()).unwrap()
    }

    #[test]
    fn builtins_are_injected_first_and_not_exported() {
        let c = controller();
        assert_eq!(c.datatypes().first().unwrap().name(), "BOOL");
        assert!(c.datatypes().contains("TIMER"));
        assert_eq!(c.user_datatypes().count(), 1);
        let out = c.meta_data();
        let exported = &out["RSLogix5000Content"]["Controller"]["DataTypes"]["DataType"];
        assert_eq!(exported.as_array().unwrap().len(), 1);
        assert_eq!(exported[0]["@Name"], "UDT_Motor");
    }

    #[test]
    fn compile_is_idempotent() {
        let mut c = controller();
        c.compile().unwrap();
        let first = c.meta_data();
        let names = c.asset_names(AssetKind::Datatype).join(",");
        c.compile().unwrap();
        assert_eq!(c.meta_data(), first);
        assert_eq!(c.asset_names(AssetKind::Datatype).join(","), names);
    }

    #[test]
    fn missing_controller_is_a_configuration_error() {
        assert!(matches!(
            Controller::from_value(json!({"RSLogix5000Content": {"@SchemaRevision": "1.0"}})),
            Err(L5xError::Configuration(_))
        ));
        assert!(matches!(
            Controller::from_value(json!({"Other": {}})),
            Err(L5xError::Configuration(_))
        ));
    }

    #[test]
    fn revision_updates_local_module_and_document() {
        let mut c = controller();
        assert_eq!(c.revision().unwrap(), "32.11");
        c.set_major_revision(33).unwrap();
        c.set_minor_revision(1).unwrap();
        assert_eq!(c.software_revision(), "33.1");
        assert_eq!(c.local_module().unwrap().major_version(), "33");
        assert_eq!(c.local_module().unwrap().minor_version(), "1");
        let out = c.meta_data();
        assert_eq!(out["RSLogix5000Content"]["@SoftwareRevision"], "33.1");
        assert_eq!(out["RSLogix5000Content"]["Controller"]["@MajorRev"], "33");
    }

    #[test]
    fn revision_without_local_module_fails_before_writing() {
        let mut c = controller();
        c.remove_asset(AssetKind::Module, LOCAL_MODULE);
        assert!(matches!(c.set_major_revision(34), Err(L5xError::Lookup { .. })));
        assert_eq!(c.attr("@MajorRev"), Some("32"));
        assert_eq!(c.software_revision(), "32.11");
    }

    #[test]
    fn connection_settings() {
        let mut c = controller();
        assert_eq!(c.slot(), Some(3));
        c.set_slot(Some(5)).unwrap();
        assert_eq!(c.slot(), Some(5));
        assert!(c.set_slot(Some(17)).is_err());
        assert!(c.set_ip_address(Some("10.0.0.300")).is_err());
        c.set_ip_address(Some("10.0.0.3")).unwrap();
        assert_eq!(c.ip_address(), Some("10.0.0.3"));
        c.set_comm_path("AB_ETHIP-1\\10.0.0.3\\Backplane\\5");
        assert!(c.comm_path().ends_with("\\5"));
        assert_eq!(c.processor_type(), "1756-L83ES");
        assert!(c.modified_date().is_none());
        c.compile().unwrap();
        assert_eq!(c.ip_address(), Some("10.0.0.3"));
    }

    #[test]
    fn add_asset_replaces_by_name() {
        let mut c = controller();
        let tag = Tag::from_value(
            json!({"@Name": "Motor1", "@TagType": "Base", "@DataType": "DINT"}),
            TagScope::Program("Main".into()),
        )
        .unwrap();
        c.add_asset(Asset::Tag(tag), None);
        assert_eq!(c.tags().len(), 3);
        assert_eq!(c.tags().names()[0], "Motor1");
        let motor = c.tags().get("Motor1").unwrap();
        assert_eq!(motor.datatype(), "DINT");
        assert!(motor.scope().is_controller());
    }

    #[test]
    fn import_skips_invalid_items() {
        let mut c = controller();
        let source = json!({"RSLogix5000Content": {"Controller": {
            "@Name": "Other",
            "Tags": {"Tag": [
                {"@Name": "NewTag", "@TagType": "Base", "@DataType": "DINT"},
                {"@Name": "Bad Tag", "@TagType": "Base", "@DataType": "DINT"}
            ]},
            "DataTypes": {"DataType": {"@Name": "UDT_Valve"}}
        }}});
        let summary = c.import_assets_from_l5x_dict(&source, &AssetKind::ALL);
        assert_eq!(summary, ImportSummary { imported: 2, skipped: 1 });
        assert!(c.tags().contains("NewTag"));
        assert!(!c.tags().contains("Bad Tag"));
        assert!(c.datatypes().contains("UDT_Valve"));

        assert_eq!(
            c.import_assets_from_l5x_dict(&json!({}), &AssetKind::ALL),
            ImportSummary::default()
        );
        assert_eq!(
            c.import_assets_from_l5x_dict(&source, &[]),
            ImportSummary::default()
        );
    }

    #[test]
    fn rename_tag_everywhere() {
        let mut c = controller();
        c.rename_asset(RenameScope::All, "Motor1", "Pump1").unwrap();
        assert!(c.tags().contains("Pump1"));
        assert_eq!(c.tags().get("Run1").unwrap().alias_for(), "Pump1.Run");

        c.rename_asset(RenameScope::Tag, "Local1", "Nope").unwrap();
        let main = c.programs().get("Main").unwrap();
        assert!(main.tags().contains("Local1"));
    }

    #[test]
    fn partitions_lookup_and_instructions() {
        let c = controller();
        assert_eq!(c.safety_programs().len(), 1);
        assert_eq!(c.standard_programs()[0].name(), "Main");
        assert_eq!(c.safety_tags()[0].name(), "SafeStop");
        assert_eq!(c.standard_tags().len(), 2);

        let run1 = c.tags().get("Run1").unwrap();
        assert_eq!(c.get_base_tag(run1).unwrap().name(), "Motor1");
        assert_eq!(
            c.endpoint_operands(c.tags().get("Motor1").unwrap()),
            vec!["Motor1.Run", "Motor1.Speed"]
        );
        let lookup = c.tag_lookup(&TagScope::Program("Main".into()));
        assert!(lookup.find("Local1").is_some());
        assert!(lookup.find("Motor1").is_some());

        assert_eq!(c.instructions().len(), 4);
        assert_eq!(c.input_instructions().len(), 2);
        assert_eq!(c.output_instructions().len(), 1);
        assert_eq!(c.aoi_instructions()[0].name(), "Valve");
        assert_eq!(c.get_instructions(Some("XIC"), Some("Run1")).len(), 1);
    }

    #[test]
    fn safety_info_round_trips() {
        let mut c = controller();
        assert_eq!(c.safety_info().safety_level(), "SIL2/PLd");
        c.safety_info_mut().add_safety_tag_mapping("Std2", "Safe2").unwrap();
        c.compile().unwrap();
        assert_eq!(c.safety_info().safety_tag_map(), "Std1=Safe1, Std2=Safe2");
        let out = c.meta_data();
        let keys: Vec<&str> = out["RSLogix5000Content"]["Controller"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let pos = |k: &str| keys.iter().position(|x| *x == k).unwrap();
        assert!(pos("SafetyInfo") < pos("DataTypes"));
    }
}
