use serde_json::Value;

use crate::domain::collection::NamedList;
use crate::domain::meta::TreeObject;
use crate::domain::routine::{HasRoutines, Routine};
use crate::domain::tag::{Tag, TagScope};
use crate::domain::tree::{self, Meta};
use crate::domain::validation::{parse_rockwell_bool, rockwell_bool, validate_one_of};
use crate::error::{L5xError, L5xResult};
use crate::ports::TemplateSource;

pub const PROGRAM_TEMPLATE: &str = "_program.L5X";

#[derive(Debug, Clone)]
pub struct Program {
    meta: Meta,
    tags: NamedList<Tag>,
    routines: NamedList<Routine>,
}

impl TreeObject for Program {
    const KEY_ORDER: &'static [&'static str] = &[
        "@Name",
        "@TestEdits",
        "@MainRoutineName",
        "@FaultRoutineName",
        "@Disabled",
        "@Class",
        "@UseAsFolder",
        "Description",
        "Tags",
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
            "Tags",
            "Tag",
            self.tags.iter().map(TreeObject::meta_data).collect(),
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

impl HasRoutines for Program {
    fn routines(&self) -> &NamedList<Routine> {
        &self.routines
    }

    fn routines_mut(&mut self) -> &mut NamedList<Routine> {
        &mut self.routines
    }
}

impl Program {
    pub fn from_meta(mut meta: Meta) -> L5xResult<Self> {
        let name = tree::attr_or(&meta, "@Name", "").to_string();
        let scope = TagScope::Program(name);
        let tags = tree::take_list(&mut meta, "Tags", "Tag")
            .into_iter()
            .map(|t| Tag::from_value(t, scope.clone()))
            .collect::<L5xResult<NamedList<_>>>()?;
        let routines = tree::take_list(&mut meta, "Routines", "Routine")
            .into_iter()
            .map(Routine::from_value)
            .collect::<L5xResult<NamedList<_>>>()?;
        let mut program = Self {
            meta,
            tags,
            routines,
        };
        program.init_dict_order();
        Ok(program)
    }

    pub fn from_value(value: Value) -> L5xResult<Self> {
        Self::from_meta(tree::into_meta(value, "program")?)
    }

    pub fn from_template(templates: &dyn TemplateSource, name: &str) -> L5xResult<Self> {
        let value =
            tree::get_default_meta_data(None, templates, PROGRAM_TEMPLATE, Some("Program"))?;
        let mut program = Self::from_value(value)?;
        program.set_name(name)?;
        Ok(program)
    }

    /// Renames the program and re-scopes its tags.
    pub fn rename(&mut self, name: &str) -> L5xResult<()> {
        self.set_name(name)?;
        let scope = TagScope::Program(name.to_string());
        for tag in self.tags.iter_mut() {
            tag.set_scope(scope.clone());
        }
        Ok(())
    }

    pub fn tags(&self) -> &NamedList<Tag> {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut NamedList<Tag> {
        &mut self.tags
    }

    pub fn add_tag(&mut self, mut tag: Tag, index: Option<usize>) {
        tag.set_scope(TagScope::Program(self.name().to_string()));
        self.tags.add(tag, index);
    }

    pub fn class(&self) -> &str {
        self.attr("@Class").unwrap_or("Standard")
    }

    pub fn set_class(&mut self, class: &str) -> L5xResult<()> {
        validate_one_of("program class", class, &["Standard", "Safety"])?;
        tree::set_attr(&mut self.meta, "@Class", class);
        Ok(())
    }

    pub fn is_safe(&self) -> bool {
        self.class() == "Safety"
    }

    pub fn is_disabled(&self) -> bool {
        parse_rockwell_bool(self.attr("@Disabled"))
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        tree::set_attr(&mut self.meta, "@Disabled", rockwell_bool(disabled));
    }

    pub fn use_as_folder(&self) -> bool {
        parse_rockwell_bool(self.attr("@UseAsFolder"))
    }

    pub fn set_use_as_folder(&mut self, folder: bool) {
        tree::set_attr(&mut self.meta, "@UseAsFolder", rockwell_bool(folder));
    }

    pub fn test_edits(&self) -> bool {
        parse_rockwell_bool(self.attr("@TestEdits"))
    }

    pub fn set_test_edits(&mut self, test_edits: bool) {
        tree::set_attr(&mut self.meta, "@TestEdits", rockwell_bool(test_edits));
    }

    pub fn main_routine_name(&self) -> &str {
        self.attr("@MainRoutineName").unwrap_or("")
    }

    pub fn main_routine(&self) -> Option<&Routine> {
        self.routines.get(self.main_routine_name())
    }

    /// The routine must already belong to the program.
    pub fn set_main_routine_name(&mut self, name: &str) -> L5xResult<()> {
        if !self.routines.contains(name) {
            return Err(L5xError::lookup("routine", name));
        }
        tree::set_attr(&mut self.meta, "@MainRoutineName", name);
        Ok(())
    }

    pub fn fault_routine_name(&self) -> &str {
        self.attr("@FaultRoutineName").unwrap_or("")
    }
}
