//! Branch/sequence builder.
//!
//! Walks a token list with an explicit branch stack and produces the ordered element
//! sequence plus the branch table. `derive_layout` is the one entry point the rung uses:
//! text in, fully derived layout out, with degenerate branches repaired on the way.

use log::debug;
use serde::Serialize;

use super::tokenizer::{self, BRANCH_END, BRANCH_NEXT, BRANCH_START};
use crate::domain::instruction::Instruction;
use crate::error::{L5xError, L5xResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RungElementType {
    Instruction,
    BranchStart,
    BranchNext,
    BranchEnd,
}

/// One entry of the element sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RungElement {
    pub element_type: RungElementType,
    /// Instruction text; empty for branch markers.
    pub instruction: String,
    /// Branch (or alternative) the element belongs to; empty on the main line.
    pub branch_id: String,
    /// Innermost enclosing branch; empty on the main line.
    pub root_branch_id: String,
    pub branch_level: usize,
    /// Token index.
    pub position: usize,
    /// Index into the rung's instruction list for instruction elements.
    pub instruction_index: Option<usize>,
}

/// A branch (`[ ... ]`) or one of its `,` alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RungBranch {
    pub branch_id: String,
    pub start_position: usize,
    /// `None` until the closing `]` has been seen.
    pub end_position: Option<usize>,
    pub root_branch_id: String,
    /// Alternatives and directly nested branches.
    pub nested_branches: Vec<String>,
    pub is_alternative: bool,
}

/// Everything derived from one rung text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RungLayout {
    /// Tokens after degenerate-branch repair.
    pub tokens: Vec<String>,
    pub instructions: Vec<Instruction>,
    pub sequence: Vec<RungElement>,
    pub branches: BranchTable,
}

impl RungLayout {
    /// Repaired text without the terminating `;`.
    pub fn body(&self) -> String {
        tokenizer::join(&self.tokens)
    }
}

/// Insertion-ordered branch table keyed by branch id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchTable {
    entries: Vec<RungBranch>,
}

impl BranchTable {
    pub fn get(&self, id: &str) -> Option<&RungBranch> {
        self.entries.iter().find(|b| b.branch_id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut RungBranch> {
        self.entries.iter_mut().find(|b| b.branch_id == id)
    }

    fn insert(&mut self, branch: RungBranch) {
        self.entries.push(branch);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RungBranch> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|b| b.branch_id.as_str()).collect()
    }
}

struct Frame {
    branch_id: String,
    start_position: usize,
    alternatives: usize,
}

/// Outcome of one builder pass.
enum Built {
    Complete {
        sequence: Vec<RungElement>,
        branches: BranchTable,
        instructions: Vec<Instruction>,
    },
    /// `[`/`]` pair with no `,` alternative at these token positions.
    Degenerate { start: usize, end: usize },
}

/// Single-pass builder over a token list.
pub struct SequenceBuilder<'a> {
    tokens: &'a [String],
    rung_number: i64,
    branch_stack: Vec<Frame>,
    branch_id_counter: usize,
    branch_id: String,
    root_branch_id: String,
    branch_level: usize,
    /// (branch_id, root_branch_id) to restore when the innermost branch closes.
    branch_history: Vec<(String, String)>,
    sequence: Vec<RungElement>,
    branches: BranchTable,
    instructions: Vec<Instruction>,
}

impl<'a> SequenceBuilder<'a> {
    pub fn new(tokens: &'a [String], rung_number: i64) -> Self {
        Self {
            tokens,
            rung_number,
            branch_stack: Vec::new(),
            branch_id_counter: 0,
            branch_id: String::new(),
            root_branch_id: String::new(),
            branch_level: 0,
            branch_history: Vec::new(),
            sequence: Vec::new(),
            branches: BranchTable::default(),
            instructions: Vec::new(),
        }
    }

    fn next_branch_id(&mut self) -> String {
        let id = format!("rung_{}_branch_{}", self.rung_number, self.branch_id_counter);
        self.branch_id_counter += 1;
        id
    }

    /// Element positioned in the current branch context.
    fn element(&self, element_type: RungElementType, position: usize) -> RungElement {
        RungElement {
            element_type,
            instruction: String::new(),
            branch_id: self.branch_id.clone(),
            root_branch_id: self.root_branch_id.clone(),
            branch_level: self.branch_level,
            position,
            instruction_index: None,
        }
    }

    fn process_instruction(&mut self, token: &str, position: usize) -> L5xResult<()> {
        if token.is_empty() {
            return Err(L5xError::structural("empty instruction token"));
        }
        let instruction = Instruction::parse(token)?.at_token(position);
        let index = self.instructions.len();
        self.instructions.push(instruction);
        let element = RungElement {
            instruction: token.to_string(),
            instruction_index: Some(index),
            ..self.element(RungElementType::Instruction, position)
        };
        self.sequence.push(element);
        Ok(())
    }

    fn process_branch_start(&mut self, position: usize) {
        let id = self.next_branch_id();
        let parent = self.branch_stack.last().map(|f| f.branch_id.clone());
        if let Some(parent) = &parent {
            if let Some(parent_branch) = self.branches.get_mut(parent) {
                parent_branch.nested_branches.push(id.clone());
            }
        }
        self.branches.insert(RungBranch {
            branch_id: id.clone(),
            start_position: position,
            end_position: None,
            root_branch_id: parent.unwrap_or_default(),
            nested_branches: Vec::new(),
            is_alternative: false,
        });
        let element = RungElement {
            branch_id: id.clone(),
            ..self.element(RungElementType::BranchStart, position)
        };
        self.sequence.push(element);

        self.branch_history
            .push((self.branch_id.clone(), self.root_branch_id.clone()));
        self.branch_stack.push(Frame {
            branch_id: id.clone(),
            start_position: position,
            alternatives: 0,
        });
        self.branch_id = id.clone();
        self.root_branch_id = id;
        self.branch_level += 1;
    }

    fn process_branch_next(&mut self, position: usize) -> L5xResult<()> {
        let frame = self.branch_stack.last_mut().ok_or_else(|| {
            L5xError::structural(format!(
                "branch next at token {} found without an active branch",
                position
            ))
        })?;
        frame.alternatives += 1;
        let parent_id = frame.branch_id.clone();
        let alternative_id = format!("{}:{}", parent_id, frame.alternatives);

        if let Some(parent) = self.branches.get_mut(&parent_id) {
            parent.nested_branches.push(alternative_id.clone());
        }
        self.branches.insert(RungBranch {
            branch_id: alternative_id.clone(),
            start_position: position,
            end_position: None,
            root_branch_id: parent_id.clone(),
            nested_branches: Vec::new(),
            is_alternative: true,
        });
        let element = RungElement {
            branch_id: alternative_id.clone(),
            root_branch_id: parent_id,
            ..self.element(RungElementType::BranchNext, position)
        };
        self.sequence.push(element);
        self.branch_id = alternative_id;
        Ok(())
    }

    /// Returns the degenerate pair when the closing branch never saw a `,`.
    fn process_branch_end(&mut self, position: usize) -> L5xResult<Option<(usize, usize)>> {
        let frame = self.branch_stack.pop().ok_or_else(|| {
            L5xError::structural(format!(
                "branch end at token {} found without an active branch",
                position
            ))
        })?;
        if frame.alternatives == 0 {
            return Ok(Some((frame.start_position, position)));
        }

        let alternatives: Vec<String> = match self.branches.get_mut(&frame.branch_id) {
            Some(branch) => {
                branch.end_position = Some(position);
                branch.nested_branches.clone()
            }
            None => Vec::new(),
        };
        for id in alternatives {
            if let Some(branch) = self.branches.get_mut(&id) {
                if branch.is_alternative {
                    branch.end_position = Some(position);
                }
            }
        }

        let (branch_id, root_branch_id) = self.branch_history.pop().unwrap_or_default();
        self.branch_level = self.branch_level.saturating_sub(1);
        self.branch_id = branch_id;
        self.root_branch_id = root_branch_id;
        let element = RungElement {
            branch_id: frame.branch_id,
            ..self.element(RungElementType::BranchEnd, position)
        };
        self.sequence.push(element);
        Ok(None)
    }

    fn build(mut self) -> L5xResult<Built> {
        let tokens = self.tokens;
        for (position, token) in tokens.iter().enumerate() {
            match token.as_str() {
                BRANCH_START => self.process_branch_start(position),
                BRANCH_NEXT => self.process_branch_next(position)?,
                BRANCH_END => {
                    if let Some((start, end)) = self.process_branch_end(position)? {
                        return Ok(Built::Degenerate { start, end });
                    }
                }
                _ => self.process_instruction(token, position)?,
            }
        }
        if let Some(frame) = self.branch_stack.last() {
            return Err(L5xError::structural(format!(
                "branch opened at token {} is never closed",
                frame.start_position
            )));
        }
        Ok(Built::Complete {
            sequence: self.sequence,
            branches: self.branches,
            instructions: self.instructions,
        })
    }
}

/// Full derivation of one rung text: tokens, instructions, element sequence and branch table.
/// A branch without any `,` alternative is removed (its `[`/`]` pair deleted) and the parse
/// restarts on the corrected tokens.
pub fn derive_layout(text: &str, rung_number: i64) -> L5xResult<RungLayout> {
    let mut tokens = tokenizer::tokenize(text)?;
    loop {
        match SequenceBuilder::new(&tokens, rung_number).build()? {
            Built::Complete {
                sequence,
                branches,
                instructions,
            } => {
                return Ok(RungLayout {
                    tokens,
                    instructions,
                    sequence,
                    branches,
                });
            }
            Built::Degenerate { start, end } => {
                debug!(
                    "rung {}: removing degenerate branch at tokens {}..{}",
                    rung_number, start, end
                );
                tokens.remove(end);
                tokens.remove(start);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(layout: &RungLayout) -> Vec<RungElementType> {
        layout.sequence.iter().map(|e| e.element_type).collect()
    }

    #[test]
    fn simple_branch_sequence() {
        let layout = derive_layout("XIC(A)[XIO(B),XIC(C)]OTE(D);", 3).unwrap();
        use RungElementType::*;
        assert_eq!(
            types(&layout),
            vec![Instruction, BranchStart, Instruction, BranchNext, Instruction, BranchEnd, Instruction]
        );
        assert_eq!(layout.instructions.len(), 4);

        let start = &layout.sequence[1];
        assert_eq!(start.branch_id, "rung_3_branch_0");
        assert_eq!(start.branch_level, 0);
        assert_eq!(layout.sequence[2].branch_id, "rung_3_branch_0");
        assert_eq!(layout.sequence[2].root_branch_id, "rung_3_branch_0");
        assert_eq!(layout.sequence[2].branch_level, 1);
        assert_eq!(layout.sequence[4].branch_id, "rung_3_branch_0:1");
        assert_eq!(layout.sequence[6].branch_id, "");
        assert_eq!(layout.sequence[6].branch_level, 0);

        let branch = layout.branches.get("rung_3_branch_0").unwrap();
        assert_eq!(branch.start_position, 1);
        assert_eq!(branch.end_position, Some(5));
        assert_eq!(branch.nested_branches, vec!["rung_3_branch_0:1".to_string()]);
        let alt = layout.branches.get("rung_3_branch_0:1").unwrap();
        assert_eq!(alt.start_position, 3);
        assert_eq!(alt.end_position, Some(5));
    }

    #[test]
    fn nested_branches_report_their_parent() {
        let layout = derive_layout("[XIC(A),[XIC(B),XIC(C)]XIO(D)]OTE(E);", 0).unwrap();
        let inner = layout.branches.get("rung_0_branch_1").unwrap();
        assert_eq!(inner.root_branch_id, "rung_0_branch_0");
        assert_eq!(inner.start_position, 3);
        assert_eq!(inner.end_position, Some(7));

        let xio = layout
            .sequence
            .iter()
            .find(|e| e.instruction == "XIO(D)")
            .unwrap();
        assert_eq!(xio.branch_id, "rung_0_branch_0:1");
        assert_eq!(xio.root_branch_id, "rung_0_branch_0");
        assert_eq!(xio.branch_level, 1);

        let c = layout.sequence.iter().find(|e| e.instruction == "XIC(C)").unwrap();
        assert_eq!(c.branch_level, 2);
        assert_eq!(c.branch_id, "rung_0_branch_1:1");
        assert_eq!(c.root_branch_id, "rung_0_branch_1");

        let outer = layout.branches.get("rung_0_branch_0").unwrap();
        assert!(outer.nested_branches.contains(&"rung_0_branch_1".to_string()));
    }

    #[test]
    fn degenerate_branch_is_removed() {
        let layout = derive_layout("XIC(A)[XIC(B)]OTE(C);", 0).unwrap();
        assert_eq!(layout.body(), "XIC(A)XIC(B)OTE(C)");
        assert!(layout.branches.is_empty());
        assert_eq!(layout.instructions.len(), 3);
    }

    #[test]
    fn nested_degenerate_branches_all_heal() {
        let layout = derive_layout("[[XIC(A)]XIC(B),XIC(C)][]OTE(D);", 0).unwrap();
        assert_eq!(layout.body(), "[XIC(A)XIC(B),XIC(C)]OTE(D)");
        assert_eq!(layout.branches.ids(), vec!["rung_0_branch_0", "rung_0_branch_0:1"]);
    }

    #[test]
    fn unbalanced_brackets_are_structural_errors() {
        assert!(matches!(derive_layout("XIC(A)]OTE(B);", 0), Err(L5xError::Structural(_))));
        assert!(matches!(derive_layout("[XIC(A),XIC(B)", 0), Err(L5xError::Structural(_))));
        assert!(matches!(derive_layout("XIC(A),XIC(B)", 0), Err(L5xError::Structural(_))));
    }

    #[test]
    fn instruction_token_positions_are_recorded() {
        let layout = derive_layout("XIC(A)[XIO(B),XIC(C)]OTE(D);", 0).unwrap();
        let positions: Vec<usize> = layout.instructions.iter().map(|i| i.token_index()).collect();
        assert_eq!(positions, vec![0, 2, 4, 6]);
    }
}
