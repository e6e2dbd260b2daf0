use serde::Serialize;

/// One argument of an instruction call, e.g. `Motor.Status.Run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operand {
    text: String,
    position: usize,
}

impl Operand {
    pub fn new(text: impl Into<String>, position: usize) -> Self {
        Self {
            text: text.into(),
            position,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Argument index within the owning instruction.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Text before the first `.`.
    pub fn base_name(&self) -> &str {
        match self.text.find('.') {
            Some(idx) => &self.text[..idx],
            None => &self.text,
        }
    }

    /// Remainder after the base name, including the leading `.` (empty when undotted).
    pub fn trailing_name(&self) -> &str {
        match self.text.find('.') {
            Some(idx) => &self.text[idx..],
            None => "",
        }
    }

    /// Progressively shortened dotted paths: `A.B.C` -> `[A.B.C, A.B, A]`.
    pub fn parents(&self) -> Vec<&str> {
        let mut parents = vec![self.text.as_str()];
        let mut current = self.text.as_str();
        while let Some(idx) = current.rfind('.') {
            current = &current[..idx];
            parents.push(current);
        }
        parents
    }

    /// Numeric literal arguments (`0`, `-1.5`, `16#FF`) reference no tag.
    pub fn is_literal(&self) -> bool {
        let text = self.text.trim();
        !text.is_empty()
            && (text.parse::<f64>().is_ok()
                || text.contains('#') && text.chars().next().is_some_and(|c| c.is_ascii_digit()))
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
