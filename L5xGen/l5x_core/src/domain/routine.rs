//! Routines and the routine-container behavior shared by programs and AOIs.

use log::debug;
use serde_json::Value;

use crate::domain::collection::NamedList;
use crate::domain::instruction::Instruction;
use crate::domain::meta::TreeObject;
use crate::domain::rung::Rung;
use crate::domain::tree::{self, Meta};
use crate::error::{L5xError, L5xResult};
use crate::ports::TemplateSource;

pub const ROUTINE_TEMPLATE: &str = "_routine.L5X";

#[derive(Debug, Clone)]
pub struct Routine {
    meta: Meta,
    rungs: Vec<Rung>,
}

impl TreeObject for Routine {
    const KEY_ORDER: &'static [&'static str] = &["@Name", "@Type", "Description", "RLLContent"];

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn meta_data(&self) -> Value {
        let mut meta = self.meta.clone();
        let rungs = self.rungs.iter().map(TreeObject::meta_data).collect();
        tree::put_list(&mut meta, "RLLContent", "Rung", rungs);
        Value::Object(meta)
    }
}

impl Routine {
    pub fn from_meta(mut meta: Meta) -> L5xResult<Self> {
        let rungs = tree::take_list(&mut meta, "RLLContent", "Rung")
            .into_iter()
            .map(Rung::from_value)
            .collect::<L5xResult<Vec<_>>>()?;
        let mut routine = Self { meta, rungs };
        routine.init_dict_order();
        Ok(routine)
    }

    pub fn from_value(value: Value) -> L5xResult<Self> {
        Self::from_meta(tree::into_meta(value, "routine")?)
    }

    pub fn from_template(templates: &dyn TemplateSource, name: &str) -> L5xResult<Self> {
        let value =
            tree::get_default_meta_data(None, templates, ROUTINE_TEMPLATE, Some("Routine"))?;
        let mut routine = Self::from_value(value)?;
        routine.set_name(name)?;
        Ok(routine)
    }

    pub fn routine_type(&self) -> &str {
        self.attr("@Type").unwrap_or("")
    }

    pub fn is_rll(&self) -> bool {
        self.routine_type() == "RLL"
    }

    pub fn rungs(&self) -> &[Rung] {
        &self.rungs
    }

    pub fn rung(&self, number: i64) -> Option<&Rung> {
        self.rungs.iter().find(|r| r.number() == number)
    }

    pub fn rung_mut(&mut self, number: i64) -> Option<&mut Rung> {
        self.rungs.iter_mut().find(|r| r.number() == number)
    }

    /// Inserts a rung (append when `index` is `None`) and renumbers every rung by position.
    pub fn add_rung(&mut self, rung: Rung, index: Option<usize>) -> L5xResult<()> {
        let index = index.unwrap_or(self.rungs.len());
        if index > self.rungs.len() {
            return Err(L5xError::structural(format!(
                "rung index {} out of range for {} rungs",
                index,
                self.rungs.len()
            )));
        }
        self.rungs.insert(index, rung);
        self.reassign_rung_numbers()
    }

    /// Parses `text` into a new rung at the end of the routine.
    pub fn add_rung_text(&mut self, text: &str, comment: Option<&str>) -> L5xResult<()> {
        let mut meta = Meta::new();
        tree::set_attr(&mut meta, "@Number", self.rungs.len().to_string());
        tree::set_attr(&mut meta, "@Type", "N");
        if let Some(comment) = comment {
            tree::set_attr(&mut meta, "Comment", comment);
        }
        tree::set_attr(&mut meta, "Text", text);
        let rung = Rung::from_meta(meta)?;
        self.add_rung(rung, None)
    }

    pub fn remove_rung(&mut self, number: i64) -> L5xResult<Rung> {
        let index = self
            .rungs
            .iter()
            .position(|r| r.number() == number)
            .ok_or_else(|| L5xError::lookup("rung", number.to_string()))?;
        self.remove_rung_at(index)
    }

    pub fn remove_rung_at(&mut self, index: usize) -> L5xResult<Rung> {
        if index >= self.rungs.len() {
            return Err(L5xError::lookup("rung", format!("index {}", index)));
        }
        let rung = self.rungs.remove(index);
        self.reassign_rung_numbers()?;
        Ok(rung)
    }

    pub fn clear_rungs(&mut self) {
        self.rungs.clear();
    }

    pub fn reassign_rung_numbers(&mut self) -> L5xResult<()> {
        for (number, rung) in self.rungs.iter_mut().enumerate() {
            if rung.number() != number as i64 {
                rung.set_number(number as i64)?;
            }
        }
        Ok(())
    }

    pub fn instructions(&self) -> Vec<&Instruction> {
        self.rungs.iter().flat_map(|r| r.instructions()).collect()
    }

    pub fn input_instructions(&self) -> Vec<&Instruction> {
        self.rungs.iter().flat_map(|r| r.input_instructions()).collect()
    }

    pub fn output_instructions(&self) -> Vec<&Instruction> {
        self.rungs.iter().flat_map(|r| r.output_instructions()).collect()
    }

    /// Exact mnemonic and exact operand filters; `None` matches everything.
    pub fn get_instructions(
        &self,
        instruction_filter: Option<&str>,
        operand_filter: Option<&str>,
    ) -> Vec<&Instruction> {
        self.rungs
            .iter()
            .flat_map(|r| r.instructions())
            .filter(|i| instruction_filter.map_or(true, |name| i.name() == name))
            .filter(|i| operand_filter.map_or(true, |op| i.has_operand(op)))
            .collect()
    }

    pub fn check_for_jsr(&self, routine: &str) -> bool {
        self.rungs
            .iter()
            .any(|r| r.instructions().iter().any(|i| i.calls_routine(routine)))
    }

    /// Prefixes `XIC(bit)` to each rung calling `routine`, unless already prefixed.
    /// Returns the number of rungs changed.
    pub fn block_jsr(&mut self, routine: &str, bit: &str) -> L5xResult<usize> {
        let prefix = blocking_prefix(bit)?;
        let staged = self.stage_call_edits(routine, |text| block_text(text, &prefix))?;
        let changed = self.commit(staged);
        if changed > 0 {
            debug!("{}: blocked {} call(s) to {} with {}", self.name(), changed, routine, bit);
        }
        Ok(changed)
    }

    /// Strips one `XIC(bit)` prefix from each rung calling `routine`.
    pub fn unblock_jsr(&mut self, routine: &str, bit: &str) -> L5xResult<usize> {
        let prefix = blocking_prefix(bit)?;
        let staged = self.stage_call_edits(routine, |text| unblock_text(text, &prefix))?;
        Ok(self.commit(staged))
    }

    /// Edited copies of the rungs calling `routine`; `edit` returns `None` to leave a rung as is.
    /// Nothing is stored, so a failing rung leaves the routine untouched.
    fn stage_call_edits<F>(&self, routine: &str, mut edit: F) -> L5xResult<Vec<(usize, Rung)>>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut staged = Vec::new();
        for (index, rung) in self.rungs.iter().enumerate() {
            if !rung.instructions().iter().any(|i| i.calls_routine(routine)) {
                continue;
            }
            let Some(text) = edit(rung.text()) else {
                continue;
            };
            let mut edited = rung.clone();
            edited.set_rung_text(&text)?;
            staged.push((index, edited));
        }
        Ok(staged)
    }

    fn commit(&mut self, staged: Vec<(usize, Rung)>) -> usize {
        let changed = staged.len();
        for (index, rung) in staged {
            self.rungs[index] = rung;
        }
        changed
    }
}

fn block_text(text: &str, prefix: &str) -> Option<String> {
    if text.starts_with(prefix) {
        None
    } else {
        Some(format!("{}{}", prefix, text))
    }
}

fn unblock_text(text: &str, prefix: &str) -> Option<String> {
    text.strip_prefix(prefix).map(str::to_string)
}

fn blocking_prefix(bit: &str) -> L5xResult<String> {
    let prefix = format!("XIC({})", bit);
    let instruction = Instruction::parse(&prefix)?;
    if bit.trim().is_empty() || instruction.operands().len() != 1 {
        return Err(L5xError::validation(
            "blocking bit",
            format!("'{}' is not a single operand", bit),
        ));
    }
    Ok(prefix)
}

/// Containers owning routines: programs and add-on instructions.
pub trait HasRoutines {
    fn routines(&self) -> &NamedList<Routine>;
    fn routines_mut(&mut self) -> &mut NamedList<Routine>;

    fn routine(&self, name: &str) -> Option<&Routine> {
        self.routines().get(name)
    }

    fn add_routine(&mut self, routine: Routine, index: Option<usize>) {
        self.routines_mut().add(routine, index);
    }

    fn remove_routine(&mut self, name: &str) -> Option<Routine> {
        self.routines_mut().remove(name)
    }

    fn instructions(&self) -> Vec<&Instruction> {
        self.routines().iter().flat_map(Routine::instructions).collect()
    }

    fn get_instructions(
        &self,
        instruction_filter: Option<&str>,
        operand_filter: Option<&str>,
    ) -> Vec<&Instruction> {
        self.routines()
            .iter()
            .flat_map(|r| r.get_instructions(instruction_filter, operand_filter))
            .collect()
    }

    fn check_for_jsr(&self, routine: &str) -> bool {
        self.routines().iter().any(|r| r.check_for_jsr(routine))
    }

    fn block_routine(&mut self, routine: &str, bit: &str) -> L5xResult<usize> {
        let prefix = blocking_prefix(bit)?;
        let staged = self
            .routines()
            .iter()
            .map(|r| r.stage_call_edits(routine, |text| block_text(text, &prefix)))
            .collect::<L5xResult<Vec<_>>>()?;
        Ok(commit_routines(self, staged))
    }

    fn unblock_routine(&mut self, routine: &str, bit: &str) -> L5xResult<usize> {
        let prefix = blocking_prefix(bit)?;
        let staged = self
            .routines()
            .iter()
            .map(|r| r.stage_call_edits(routine, |text| unblock_text(text, &prefix)))
            .collect::<L5xResult<Vec<_>>>()?;
        Ok(commit_routines(self, staged))
    }
}

fn commit_routines<H: HasRoutines + ?Sized>(owner: &mut H, staged: Vec<Vec<(usize, Rung)>>) -> usize {
    owner
        .routines_mut()
        .iter_mut()
        .zip(staged)
        .map(|(routine, edits)| routine.commit(edits))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn routine(rungs: &[&str]) -> Routine {
        let rungs: Vec<Value> = rungs
            .iter()
            .enumerate()
            .map(|(i, text)| json!({"@Number": i.to_string(), "@Type": "N", "Text": text}))
            .collect();
        Routine::from_value(json!({"@Name": "Main", "@Type": "RLL", "RLLContent": {"Rung": rungs}}))
            .unwrap()
    }

    #[test]
    fn block_unblock_round_trip() {
        let mut r = routine(&["JSR(Sub1,0,Ret);", "XIC(A)OTE(B);"]);
        assert_eq!(r.block_jsr("Sub1", "Bit1").unwrap(), 1);
        assert_eq!(r.rungs()[0].text(), "XIC(Bit1)JSR(Sub1,0,Ret);");
        assert_eq!(r.block_jsr("Sub1", "Bit1").unwrap(), 0);
        assert_eq!(r.rungs()[0].text(), "XIC(Bit1)JSR(Sub1,0,Ret);");
        assert_eq!(r.unblock_jsr("Sub1", "Bit1").unwrap(), 1);
        assert_eq!(r.rungs()[0].text(), "JSR(Sub1,0,Ret);");
        assert_eq!(r.rungs()[1].text(), "XIC(A)OTE(B);");
    }

    #[test]
    fn blocking_bit_is_validated_first() {
        let mut r = routine(&["JSR(Sub1,0,Ret);"]);
        assert!(r.block_jsr("Sub1", "").is_err());
        assert!(r.block_jsr("Sub1", "A,B").is_err());
        assert_eq!(r.rungs()[0].text(), "JSR(Sub1,0,Ret);");
    }

    #[test]
    fn failing_rung_edit_commits_nothing() {
        let mut r = routine(&["JSR(Sub1,0,Ret);", "XIC(A)JSR(Sub1,0,Ret);"]);
        let mut seen = 0;
        let result = r.stage_call_edits("Sub1", |text| {
            seen += 1;
            Some(if seen == 1 { format!("XIC(B){}", text) } else { "[XIC(A)".to_string() })
        });
        assert!(matches!(result, Err(L5xError::Structural(_))));
        assert_eq!(r.rungs()[0].text(), "JSR(Sub1,0,Ret);");
        assert_eq!(r.rungs()[1].text(), "XIC(A)JSR(Sub1,0,Ret);");
    }

    #[test]
    fn block_covers_every_calling_rung() {
        let mut r = routine(&["JSR(Sub1,0,Ret);", "XIC(A)OTE(B);", "XIC(C)JSR(Sub1,0,Ret);"]);
        assert_eq!(r.block_jsr("Sub1", "Bit1").unwrap(), 2);
        assert_eq!(r.rungs()[2].text(), "XIC(Bit1)XIC(C)JSR(Sub1,0,Ret);");
        assert_eq!(r.rungs()[2].number(), 2);
        assert_eq!(r.rungs()[1].text(), "XIC(A)OTE(B);");
    }

    #[test]
    fn instruction_filters_are_exact() {
        let r = routine(&["XIC(Motor)XIC(Motor_Run)OTE(Out);", "JSR(Sub1)JSR(Sub10);"]);
        assert_eq!(r.get_instructions(Some("XIC"), None).len(), 2);
        assert_eq!(r.get_instructions(None, Some("Motor")).len(), 1);
        assert_eq!(r.get_instructions(Some("OTE"), Some("Motor")).len(), 0);
        assert_eq!(r.get_instructions(None, None).len(), 5);
        assert!(r.check_for_jsr("Sub1"));
        assert!(!r.check_for_jsr("Sub"));
        assert_eq!(r.input_instructions().len(), 2);
        assert_eq!(r.output_instructions().len(), 1);
    }

    #[test]
    fn rung_numbers_follow_position() {
        let mut r = routine(&["XIC(A)OTE(B);", "XIC(C)OTE(D);"]);
        r.add_rung_text("NOP();", None).unwrap();
        let first = r.rungs()[2].clone();
        r.add_rung(first, Some(0)).unwrap();
        let numbers: Vec<i64> = r.rungs().iter().map(Rung::number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
        assert_eq!(r.rungs()[0].text(), "NOP();");

        r.remove_rung(1).unwrap();
        assert_eq!(r.rungs()[1].text(), "XIC(C)OTE(D);");
        assert_eq!(r.rungs()[1].number(), 1);
        assert!(r.remove_rung(7).is_err());
        assert!(r.remove_rung_at(3).is_err());
    }

    #[test]
    fn rungs_are_written_back() {
        let mut r = routine(&["XIC(A)OTE(B);"]);
        r.add_rung_text("XIC(C)OTE(D)", Some("second")).unwrap();
        let out = r.meta_data();
        assert_eq!(out["RLLContent"]["Rung"][1]["Text"], "XIC(C)OTE(D);");
        assert_eq!(out["RLLContent"]["Rung"][1]["Comment"], "second");
        assert_eq!(out["RLLContent"]["Rung"][1]["@Number"], "1");
    }

    #[test]
    fn empty_rll_content_reads_as_no_rungs() {
        let r = Routine::from_value(json!({"@Name": "Empty", "@Type": "RLL", "RLLContent": ""}))
            .unwrap();
        assert!(r.rungs().is_empty());
        assert!(r.is_rll());
    }
}
