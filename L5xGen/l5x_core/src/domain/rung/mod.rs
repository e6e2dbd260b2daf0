//! Ladder rung: text, derived instruction list, element sequence and branch table.
//!
//! Every edit rewrites the token list and funnels through [`Rung::set_rung_text`], which
//! re-derives the whole layout before anything is stored. A failing edit leaves the rung as it
//! was.

pub mod branches;
pub mod sequence;
pub mod tokenizer;

use serde::Serialize;
use serde_json::Value;

use crate::domain::instruction::Instruction;
use crate::domain::meta::TreeObject;
use crate::domain::tree::{self, Meta};
use crate::error::{L5xError, L5xResult};
use crate::ports::TemplateSource;

pub use sequence::{derive_layout, BranchTable, RungBranch, RungElement, RungElementType, RungLayout};

pub const RUNG_TEMPLATE: &str = "_rung.L5X";

/// Selects an instruction of a rung for removal, replacement or moving.
#[derive(Debug, Clone, Copy)]
pub enum InstructionRef<'a> {
    /// Token index of the instruction.
    Token(usize),
    /// Literal instruction text, e.g. `XIC(A)`.
    Text(&'a str),
    Instruction(&'a Instruction),
}

impl<'a> From<&'a str> for InstructionRef<'a> {
    fn from(text: &'a str) -> Self {
        InstructionRef::Text(text)
    }
}

impl<'a> From<usize> for InstructionRef<'a> {
    fn from(index: usize) -> Self {
        InstructionRef::Token(index)
    }
}

impl<'a> From<&'a Instruction> for InstructionRef<'a> {
    fn from(instruction: &'a Instruction) -> Self {
        InstructionRef::Instruction(instruction)
    }
}

/// Instruction payload of an execution step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructionStep {
    pub name: String,
    pub text: String,
    pub operands: Vec<String>,
    pub is_input: bool,
    pub is_output: bool,
}

/// Export form of one sequence element for rendering or simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionStep {
    pub step_type: RungElementType,
    pub position: usize,
    pub branch_id: String,
    pub root_branch_id: String,
    pub branch_level: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<InstructionStep>,
}

#[derive(Debug, Clone)]
pub struct Rung {
    meta: Meta,
    layout: RungLayout,
}

impl TreeObject for Rung {
    const KEY_ORDER: &'static [&'static str] = &["@Number", "@Type", "Comment", "Text"];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }
}

impl PartialEq for Rung {
    fn eq(&self, other: &Self) -> bool {
        self.text() == other.text() && self.number() == other.number()
    }
}

impl Rung {
    /// Wraps a raw `Rung` node. Degenerate branches in the stored text are repaired here.
    pub fn from_meta(meta: Meta) -> L5xResult<Self> {
        let mut rung = Self {
            meta,
            layout: RungLayout::default(),
        };
        rung.init_dict_order();
        let text = rung.text().to_string();
        rung.set_rung_text(&text)?;
        Ok(rung)
    }

    pub fn from_value(value: Value) -> L5xResult<Self> {
        Self::from_meta(tree::into_meta(value, "rung")?)
    }

    /// New rung from the default template.
    pub fn from_template(
        templates: &dyn TemplateSource,
        text: &str,
        number: i64,
        comment: Option<&str>,
    ) -> L5xResult<Self> {
        let value = tree::get_default_meta_data(None, templates, RUNG_TEMPLATE, Some("Rung"))?;
        let mut meta = tree::into_meta(value, "rung")?;
        tree::set_attr(&mut meta, "@Number", number.to_string());
        tree::set_attr(&mut meta, "Text", text);
        if let Some(comment) = comment {
            tree::set_attr(&mut meta, "Comment", comment);
        }
        Self::from_meta(meta)
    }

    pub fn number(&self) -> i64 {
        self.attr("@Number")
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Renumbering changes the generated branch ids, so the layout is re-derived.
    pub fn set_number(&mut self, number: i64) -> L5xResult<()> {
        let layout = derive_layout(self.text(), number)?;
        tree::set_attr(&mut self.meta, "@Number", number.to_string());
        self.layout = layout;
        Ok(())
    }

    pub fn rung_type(&self) -> &str {
        self.attr("@Type").unwrap_or("N")
    }

    pub fn comment(&self) -> &str {
        self.attr("Comment").unwrap_or("")
    }

    pub fn set_comment(&mut self, comment: &str) {
        tree::set_attr(&mut self.meta, "Comment", comment);
    }

    /// Number of comment lines; 0 without a comment.
    pub fn comment_lines(&self) -> usize {
        self.comment().lines().count()
    }

    /// Stored text including the terminating `;`.
    pub fn text(&self) -> &str {
        self.attr("Text").unwrap_or("")
    }

    pub fn tokens(&self) -> &[String] {
        &self.layout.tokens
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.layout.instructions
    }

    pub fn sequence(&self) -> &[RungElement] {
        &self.layout.sequence
    }

    pub fn branches(&self) -> &BranchTable {
        &self.layout.branches
    }

    pub fn get_instruction_by_index(&self, index: usize) -> Option<&Instruction> {
        self.layout.instructions.get(index)
    }

    pub fn input_instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.layout.instructions.iter().filter(|i| i.is_input())
    }

    pub fn output_instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.layout.instructions.iter().filter(|i| i.is_output())
    }

    /// Store new text: appends the missing `;`, re-derives the layout and keeps the healed text.
    pub fn set_rung_text(&mut self, text: &str) -> L5xResult<()> {
        let layout = derive_layout(text, self.number())?;
        let healed = format!("{};", layout.body());
        tree::set_attr(&mut self.meta, "Text", healed);
        self.layout = layout;
        Ok(())
    }

    fn set_tokens(&mut self, tokens: &[String]) -> L5xResult<()> {
        self.set_rung_text(&tokenizer::join(tokens))
    }

    /// Token index of the instruction `reference` selects.
    fn resolve(&self, reference: InstructionRef<'_>, occurrence: usize) -> L5xResult<usize> {
        let by_text = |text: &str| {
            self.layout
                .instructions
                .iter()
                .filter(|i| i.text() == text)
                .nth(occurrence)
                .map(Instruction::token_index)
                .ok_or_else(|| {
                    L5xError::NotFound(format!("'{}' (occurrence {})", text, occurrence))
                })
        };
        match reference {
            InstructionRef::Token(index) => match self.layout.tokens.get(index) {
                Some(token) if !tokenizer::is_branch_token(token) => Ok(index),
                Some(_) => Err(L5xError::NotFound(format!(
                    "token {} is a branch marker",
                    index
                ))),
                None => Err(L5xError::NotFound(format!(
                    "token {} out of range for {} tokens",
                    index,
                    self.layout.tokens.len()
                ))),
            },
            InstructionRef::Text(text) => by_text(text),
            InstructionRef::Instruction(instruction) => by_text(instruction.text()),
        }
    }

    /// Insert an instruction at token `index` (append when `None`).
    pub fn add_instruction(&mut self, text: &str, index: Option<usize>) -> L5xResult<()> {
        let instruction = Instruction::parse(text)?;
        let mut tokens = self.layout.tokens.clone();
        let index = index.unwrap_or(tokens.len());
        if index > tokens.len() {
            return Err(L5xError::structural(format!(
                "insert position {} out of range for {} tokens",
                index,
                tokens.len()
            )));
        }
        tokens.insert(index, instruction.text().to_string());
        self.set_tokens(&tokens)
    }

    pub fn remove_instruction<'a>(
        &mut self,
        reference: impl Into<InstructionRef<'a>>,
        occurrence: usize,
    ) -> L5xResult<()> {
        let index = self.resolve(reference.into(), occurrence)?;
        let mut tokens = self.layout.tokens.clone();
        tokens.remove(index);
        self.set_tokens(&tokens)
    }

    pub fn replace_instruction<'a>(
        &mut self,
        reference: impl Into<InstructionRef<'a>>,
        new_text: &str,
        occurrence: usize,
    ) -> L5xResult<()> {
        let replacement = Instruction::parse(new_text)?;
        let index = self.resolve(reference.into(), occurrence)?;
        let mut tokens = self.layout.tokens.clone();
        tokens[index] = replacement.text().to_string();
        self.set_tokens(&tokens)
    }

    /// Move an instruction to token position `new_position` (as counted after removal).
    pub fn move_instruction<'a>(
        &mut self,
        reference: impl Into<InstructionRef<'a>>,
        new_position: usize,
        occurrence: usize,
    ) -> L5xResult<()> {
        let index = self.resolve(reference.into(), occurrence)?;
        if index == new_position {
            return Ok(());
        }
        let mut tokens = self.layout.tokens.clone();
        if new_position >= tokens.len() {
            return Err(L5xError::structural(format!(
                "move position {} out of range for {} tokens",
                new_position,
                tokens.len()
            )));
        }
        let token = tokens.remove(index);
        tokens.insert(new_position, token);
        self.set_tokens(&tokens)
    }

    /// Wrap the token range `[start, end)` in a new branch with one empty alternative.
    pub fn insert_branch(&mut self, start: usize, end: usize) -> L5xResult<()> {
        let tokens = branches::insert_branch_tokens(&self.layout.tokens, start, end, &[])?;
        self.set_tokens(&tokens)
    }

    /// Add an empty alternative after the one starting at the `[`/`,` token `position`.
    pub fn insert_branch_level(&mut self, position: usize) -> L5xResult<()> {
        let tokens = branches::insert_branch_level_tokens(&self.layout.tokens, position)?;
        self.set_tokens(&tokens)
    }

    /// Delete a whole branch (with everything nested in it) by id.
    pub fn remove_branch(&mut self, branch_id: &str) -> L5xResult<()> {
        let branch = self
            .layout
            .branches
            .get(branch_id)
            .filter(|b| !b.is_alternative)
            .ok_or_else(|| L5xError::lookup("branch", branch_id))?;
        let end = branch.end_position.ok_or_else(|| {
            L5xError::structural(format!("branch {} was never closed", branch_id))
        })?;
        let tokens = branches::remove_tokens(&self.layout.tokens, branch.start_position, end)?;
        self.set_tokens(&tokens)
    }

    /// Removes the instructions in `[start, end)` and puts an empty branch `[,]` at `start`.
    /// The removed instructions are not moved into the branch.
    pub fn wrap_instructions_in_branch(&mut self, start: usize, end: usize) -> L5xResult<()> {
        let tokens = &self.layout.tokens;
        if start > end || end > tokens.len() {
            return Err(L5xError::structural(format!(
                "range {}..{} out of range for {} tokens",
                start,
                end,
                tokens.len()
            )));
        }
        let mut remaining = tokens[..start].to_vec();
        remaining.extend_from_slice(&tokens[end..]);
        let wrapped = branches::insert_branch_tokens(&remaining, start, start, &[])?;
        self.set_tokens(&wrapped)
    }

    /// Drop the inclusive token range `[start, end]`.
    pub fn remove_tokens(&mut self, start: usize, end: usize) -> L5xResult<()> {
        let tokens = branches::remove_tokens(&self.layout.tokens, start, end)?;
        self.set_tokens(&tokens)
    }

    pub fn get_branch_nesting_level(&self, position: usize) -> usize {
        branches::branch_nesting_level(&self.layout.tokens, position)
    }

    pub fn get_branch_internal_nesting_level(&self, start: usize) -> L5xResult<usize> {
        branches::branch_internal_nesting_level(&self.layout.tokens, start)
    }

    pub fn get_max_branch_depth(&self) -> usize {
        branches::max_branch_depth(&self.layout.tokens)
    }

    pub fn validate_branch_structure(&self) -> bool {
        branches::validate_branch_structure(&self.layout.tokens)
    }

    pub fn find_matching_branch_end(&self, start: usize) -> L5xResult<Option<usize>> {
        branches::find_matching_branch_end(&self.layout.tokens, start)
    }

    pub fn get_execution_sequence(&self) -> Vec<ExecutionStep> {
        self.layout
            .sequence
            .iter()
            .map(|element| ExecutionStep {
                step_type: element.element_type,
                position: element.position,
                branch_id: element.branch_id.clone(),
                root_branch_id: element.root_branch_id.clone(),
                branch_level: element.branch_level,
                instruction: element
                    .instruction_index
                    .and_then(|i| self.layout.instructions.get(i))
                    .map(|instruction| InstructionStep {
                        name: instruction.name().to_string(),
                        text: instruction.text().to_string(),
                        operands: instruction
                            .operands()
                            .iter()
                            .map(|op| op.text().to_string())
                            .collect(),
                        is_input: instruction.is_input(),
                        is_output: instruction.is_output(),
                    }),
            })
            .collect()
    }
}
