use serde_json::Value;

use crate::domain::collection::NamedList;
use crate::domain::meta::TreeObject;
use crate::domain::routine::{HasRoutines, Routine};
use crate::domain::tag::{Tag, TagScope};
use crate::domain::tree::{self, Meta};
use crate::domain::validation::{parse_rockwell_bool, rockwell_bool, validate_revision};
use crate::error::L5xResult;
use crate::ports::TemplateSource;

pub const AOI_TEMPLATE: &str = "_aoi.L5X";

/// Add-on instruction definition.
#[derive(Debug, Clone)]
pub struct Aoi {
    meta: Meta,
    parameters: NamedList<Tag>,
    local_tags: NamedList<Tag>,
    routines: NamedList<Routine>,
}

impl TreeObject for Aoi {
    const KEY_ORDER: &'static [&'static str] = &[
        "@Name",
        "@Class",
        "@Revision",
        "@ExecutePrescan",
        "@ExecutePostscan",
        "@ExecuteEnableInFalse",
        "@CreatedDate",
        "@CreatedBy",
        "@EditedDate",
        "@EditedBy",
        "@SoftwareRevision",
        "Description",
        "RevisionNote",
        "Parameters",
        "LocalTags",
        "Routines",
    ];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn meta_data(&self) -> Value {
        let mut meta = self.meta.clone();
        tree::put_list(
            &mut meta,
            "Parameters",
            "Parameter",
            self.parameters.iter().map(TreeObject::meta_data).collect(),
        );
        tree::put_list(
            &mut meta,
            "LocalTags",
            "LocalTag",
            self.local_tags.iter().map(TreeObject::meta_data).collect(),
        );
        tree::put_list(
            &mut meta,
            "Routines",
            "Routine",
            self.routines.iter().map(TreeObject::meta_data).collect(),
        );
        Value::Object(meta)
    }
}

impl HasRoutines for Aoi {
    fn routines(&self) -> &NamedList<Routine> {
        &self.routines
    }

    fn routines_mut(&mut self) -> &mut NamedList<Routine> {
        &mut self.routines
    }
}

impl Aoi {
    pub fn from_meta(mut meta: Meta) -> L5xResult<Self> {
        let scope = TagScope::Aoi(tree::attr_or(&meta, "@Name", "").to_string());
        let parameters = lift_tags(&mut meta, "Parameters", "Parameter", &scope)?;
        let local_tags = lift_tags(&mut meta, "LocalTags", "LocalTag", &scope)?;
        let routines = tree::take_list(&mut meta, "Routines", "Routine")
            .into_iter()
            .map(Routine::from_value)
            .collect::<L5xResult<NamedList<_>>>()?;
        let mut aoi = Self {
            meta,
            parameters,
            local_tags,
            routines,
        };
        aoi.init_dict_order();
        Ok(aoi)
    }

    pub fn from_value(value: Value) -> L5xResult<Self> {
        Self::from_meta(tree::into_meta(value, "add-on instruction")?)
    }

    pub fn from_template(templates: &dyn TemplateSource, name: &str) -> L5xResult<Self> {
        let value = tree::get_default_meta_data(
            None,
            templates,
            AOI_TEMPLATE,
            Some("AddOnInstructionDefinition"),
        )?;
        let mut aoi = Self::from_value(value)?;
        aoi.set_name(name)?;
        Ok(aoi)
    }

    pub fn revision(&self) -> &str {
        self.attr("@Revision").unwrap_or("")
    }

    pub fn set_revision(&mut self, revision: &str) -> L5xResult<()> {
        validate_revision("revision", revision)?;
        tree::set_attr(&mut self.meta, "@Revision", revision);
        Ok(())
    }

    pub fn software_revision(&self) -> &str {
        self.attr("@SoftwareRevision").unwrap_or("")
    }

    pub fn set_software_revision(&mut self, revision: &str) -> L5xResult<()> {
        validate_revision("software revision", revision)?;
        tree::set_attr(&mut self.meta, "@SoftwareRevision", revision);
        Ok(())
    }

    pub fn revision_extension(&self) -> &str {
        self.attr("@RevisionExtension").unwrap_or("")
    }

    /// Logix rejects a raw `<` in the extension; it is stored pre-escaped.
    pub fn set_revision_extension(&mut self, extension: &str) {
        tree::set_attr(
            &mut self.meta,
            "@RevisionExtension",
            extension.replace('<', "&lt;"),
        );
    }

    pub fn revision_note(&self) -> &str {
        self.attr("RevisionNote").unwrap_or("")
    }

    pub fn set_revision_note(&mut self, note: &str) {
        tree::set_attr(&mut self.meta, "RevisionNote", note);
    }

    pub fn execute_prescan(&self) -> bool {
        parse_rockwell_bool(self.attr("@ExecutePrescan"))
    }

    pub fn set_execute_prescan(&mut self, value: bool) {
        tree::set_attr(&mut self.meta, "@ExecutePrescan", rockwell_bool(value));
    }

    pub fn execute_postscan(&self) -> bool {
        parse_rockwell_bool(self.attr("@ExecutePostscan"))
    }

    pub fn set_execute_postscan(&mut self, value: bool) {
        tree::set_attr(&mut self.meta, "@ExecutePostscan", rockwell_bool(value));
    }

    pub fn execute_enable_in_false(&self) -> bool {
        parse_rockwell_bool(self.attr("@ExecuteEnableInFalse"))
    }

    pub fn set_execute_enable_in_false(&mut self, value: bool) {
        tree::set_attr(&mut self.meta, "@ExecuteEnableInFalse", rockwell_bool(value));
    }

    pub fn created_date(&self) -> &str {
        self.attr("@CreatedDate").unwrap_or("")
    }

    pub fn created_by(&self) -> &str {
        self.attr("@CreatedBy").unwrap_or("")
    }

    pub fn edited_date(&self) -> &str {
        self.attr("@EditedDate").unwrap_or("")
    }

    pub fn edited_by(&self) -> &str {
        self.attr("@EditedBy").unwrap_or("")
    }

    pub fn parameters(&self) -> &NamedList<Tag> {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut NamedList<Tag> {
        &mut self.parameters
    }

    pub fn local_tags(&self) -> &NamedList<Tag> {
        &self.local_tags
    }

    pub fn local_tags_mut(&mut self) -> &mut NamedList<Tag> {
        &mut self.local_tags
    }

    /// `Logic` when present, else the first routine.
    pub fn main_routine(&self) -> Option<&Routine> {
        self.routines
            .get("Logic")
            .or_else(|| self.routines.first())
    }
}

fn lift_tags(
    meta: &mut Meta,
    container: &str,
    item: &str,
    scope: &TagScope,
) -> L5xResult<NamedList<Tag>> {
    tree::take_list(meta, container, item)
        .into_iter()
        .map(|t| Tag::from_value(t, scope.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::L5xError;
    use serde_json::json;

    fn aoi() -> Aoi {
        Aoi::from_value(json!({
            "@Name": "Valve",
            "@Revision": "1.0",
            "@RevisionExtension": "<beta>",
            "@ExecutePrescan": "false",
            "Parameters": {"Parameter": [
                {"@Name": "EnableIn", "@TagType": "Base", "@DataType": "BOOL", "@Usage": "Input"},
                {"@Name": "Open", "@TagType": "Base", "@DataType": "BOOL", "@Usage": "Output"}
            ]},
            "LocalTags": {"LocalTag": {"@Name": "Timer1", "@DataType": "TIMER"}},
            "Routines": {"Routine": [
                {"@Name": "Prescan", "@Type": "RLL", "RLLContent": ""},
                {"@Name": "Logic", "@Type": "RLL", "RLLContent": {"Rung":
                    {"@Number": "0", "@Type": "N", "Text": "XIC(EnableIn)OTE(Open);"}}}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn lifts_parameters_local_tags_and_routines() {
        let a = aoi();
        assert_eq!(a.parameters().names(), vec!["EnableIn", "Open"]);
        assert_eq!(a.parameters().get("Open").unwrap().usage(), "Output");
        assert_eq!(a.local_tags().len(), 1);
        assert_eq!(a.local_tags().first().unwrap().scope(), &TagScope::Aoi("Valve".into()));
        assert_eq!(a.main_routine().unwrap().name(), "Logic");
        assert_eq!(a.instructions().len(), 2);
    }

    #[test]
    fn revision_grammar_and_extension_escape() {
        let mut a = aoi();
        assert_eq!(a.revision_extension(), "<beta>");
        a.set_revision_extension("<rc1>");
        assert_eq!(a.revision_extension(), "&lt;rc1>");
        assert!(a.set_revision("2.1.3").is_ok());
        assert!(matches!(a.set_revision("v2"), Err(L5xError::Validation { .. })));
        assert!(a.set_software_revision("33.01").is_ok());
        assert_eq!(a.revision(), "2.1.3");
    }

    #[test]
    fn execute_flags() {
        let mut a = aoi();
        assert!(!a.execute_prescan());
        a.set_execute_prescan(true);
        a.set_execute_enable_in_false(true);
        assert_eq!(a.attr("@ExecutePrescan"), Some("true"));
        assert!(a.execute_enable_in_false());
        assert!(!a.execute_postscan());
    }

    #[test]
    fn main_routine_falls_back_to_first() {
        let a = Aoi::from_value(json!({
            "@Name": "Pump",
            "Routines": {"Routine": {"@Name": "Only", "@Type": "RLL"}}
        }))
        .unwrap();
        assert_eq!(a.main_routine().unwrap().name(), "Only");
    }

    #[test]
    fn export_keeps_canonical_order() {
        let out = aoi().meta_data();
        let keys: Vec<&str> = out.as_object().unwrap().keys().map(String::as_str).collect();
        let pos = |k: &str| keys.iter().position(|x| *x == k).unwrap();
        assert!(pos("Parameters") < pos("LocalTags"));
        assert!(pos("LocalTags") < pos("Routines"));
        assert_eq!(out["LocalTags"]["LocalTag"][0]["@Name"], "Timer1");
    }
}
