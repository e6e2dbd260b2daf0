use serde::Serialize;

use super::operand::Operand;
use crate::error::{L5xError, L5xResult};

/// Classification of an instruction mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstructionType {
    Input,
    Output,
    Jsr,
    Aoi,
    Unknown,
}

pub const INPUT_INSTRUCTIONS: &[&str] = &["XIC", "XIO"];

/// Output mnemonics with the index of their destination operand (-1 = last operand).
pub const OUTPUT_INSTRUCTIONS: &[(&str, i32)] = &[
    ("OTE", -1),
    ("OTU", -1),
    ("OTL", -1),
    ("TON", 0),
    ("TOF", 0),
    ("RTO", 0),
    ("CTU", 0),
    ("CTD", 0),
    ("RES", -1),
    ("MSG", -1),
    ("GSV", -1),
    ("ONS", -1),
    ("OSR", -1),
    ("OSF", -1),
    ("IOT", -1),
    ("CPT", 0),
    ("ADD", -1),
    ("SUB", -1),
    ("MUL", -1),
    ("DIV", -1),
    ("MOD", -1),
    ("SQR", -1),
    ("NEG", -1),
    ("ABS", -1),
    ("MOV", -1),
    ("MOVE", -1),
    ("MVM", -1),
    ("AND", -1),
    ("OR", -1),
    ("XOR", -1),
    ("NOT", -1),
    ("SWPB", -1),
    ("CLR", -1),
    ("BTD", 2),
    ("FAL", 4),
    ("COP", 1),
    ("FLL", 1),
    ("AVE", 2),
    ("SIZE", -1),
    ("CPS", 1),
];

pub const JSR_INSTRUCTION: &str = "JSR";

/// Mnemonic-only classification; operand content never matters.
pub fn classify(name: &str) -> InstructionType {
    if INPUT_INSTRUCTIONS.contains(&name) {
        InstructionType::Input
    } else if OUTPUT_INSTRUCTIONS.iter().any(|(n, _)| *n == name) {
        InstructionType::Output
    } else if name == JSR_INSTRUCTION {
        InstructionType::Jsr
    } else {
        InstructionType::Unknown
    }
}

/// One instruction call such as `MOV(Source,Dest)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    text: String,
    name: String,
    operands: Vec<Operand>,
    kind: InstructionType,
    /// Token index inside the owning rung.
    token_index: usize,
}

impl Instruction {
    /// Parse `NAME(arg{,arg})`. Parentheses must balance and close at the last character.
    pub fn parse(text: &str) -> L5xResult<Self> {
        let text = text.trim();
        let open = text
            .find('(')
            .ok_or_else(|| L5xError::structural(format!("instruction '{}' has no '('", text)))?;
        let name = &text[..open];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(L5xError::structural(format!(
                "instruction '{}' has an invalid mnemonic",
                text
            )));
        }

        let mut depth = 0i32;
        let mut close = None;
        for (idx, ch) in text[open..].char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + idx);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = match close {
            Some(close) if close == text.len() - 1 => close,
            Some(_) => {
                return Err(L5xError::structural(format!(
                    "instruction '{}' has trailing text after ')'",
                    text
                )))
            }
            None => {
                return Err(L5xError::structural(format!(
                    "instruction '{}' has unbalanced parentheses",
                    text
                )))
            }
        };

        let operands = split_operands(&text[open + 1..close])
            .into_iter()
            .enumerate()
            .map(|(idx, op)| Operand::new(op, idx))
            .collect();

        Ok(Self {
            text: text.to_string(),
            name: name.to_string(),
            operands,
            kind: classify(name),
            token_index: 0,
        })
    }

    pub(crate) fn at_token(mut self, token_index: usize) -> Self {
        self.token_index = token_index;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.operands.get(index)
    }

    pub fn kind(&self) -> InstructionType {
        self.kind
    }

    pub fn token_index(&self) -> usize {
        self.token_index
    }

    pub fn is_input(&self) -> bool {
        self.kind == InstructionType::Input
    }

    pub fn is_output(&self) -> bool {
        self.kind == InstructionType::Output
    }

    pub fn is_jsr(&self) -> bool {
        self.kind == InstructionType::Jsr
    }

    /// `JSR(name,...)` whose first operand is exactly `routine`.
    pub fn calls_routine(&self, routine: &str) -> bool {
        self.is_jsr() && self.operands.first().map(Operand::text) == Some(routine)
    }

    pub fn has_operand(&self, operand: &str) -> bool {
        self.operands.iter().any(|op| op.text() == operand)
    }

    /// Destination argument of an output instruction.
    pub fn destination_operand(&self) -> Option<&Operand> {
        let (_, index) = OUTPUT_INSTRUCTIONS.iter().find(|(n, _)| *n == self.name)?;
        if *index < 0 {
            self.operands.last()
        } else {
            self.operands.get(*index as usize)
        }
    }

    /// Classification once add-on instruction names are known; mnemonic only.
    pub fn classify_with(&self, is_aoi: impl Fn(&str) -> bool) -> InstructionType {
        match self.kind {
            InstructionType::Unknown if is_aoi(&self.name) => InstructionType::Aoi,
            other => other,
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split an argument list on top-level commas; commas inside `()` or `[]` stay in place.
pub fn split_operands(args: &str) -> Vec<String> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    let mut operands = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in args.chars() {
        match ch {
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                operands.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    operands.push(current.trim().to_string());
    operands
}
