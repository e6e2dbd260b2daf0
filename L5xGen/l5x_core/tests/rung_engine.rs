use l5x_core::domain::rung::sequence::derive_layout;
use l5x_core::domain::rung::tokenizer::{join, tokenize};
use l5x_core::domain::rung::RungElementType;
use l5x_core::{EmbeddedTemplates, L5xError, Rung, TreeObject};
use pretty_assertions::assert_eq;
use serde_json::json;

const RUNGS: &[&str] = &[
    "XIC(A)OTE(B);",
    "XIC(A)[XIO(B),XIC(C)]OTE(D);",
    "[XIC(A),XIC(B),XIC(C)]OTE(D);",
    "[XIC(A),XIC(B)[XIC(C),XIC(D)]]OTE(E);",
    "XIC(Arr[1,2])MOV(Src[0],Dst[Idx+1]);",
    "XIC(Motor.Run)[TON(T1,?,?),XIO(T1.DN)OTL(Alarm)]CPT(Out,(A+B)*C);",
    ";",
];

fn rung(text: &str) -> Rung {
    Rung::from_value(json!({"@Number": "0", "@Type": "N", "Text": text})).unwrap()
}

#[test]
fn tokens_join_back_to_the_text() {
    for text in RUNGS {
        let tokens = tokenize(text).unwrap();
        assert_eq!(format!("{};", join(&tokens)), *text);
        assert_eq!(rung(text).text(), *text);
    }
}

#[test]
fn documented_branch_rung() {
    let r = rung("XIC(A)[XIO(B),XIC(C)]OTE(D);");
    assert_eq!(
        r.tokens(),
        &["XIC(A)", "[", "XIO(B)", ",", "XIC(C)", "]", "OTE(D)"]
    );
    assert_eq!(r.instructions().len(), 4);
    assert!(r.validate_branch_structure());
    assert_eq!(r.get_max_branch_depth(), 1);
}

#[test]
fn max_depth_bounds_every_nesting_level() {
    for text in RUNGS {
        let r = rung(text);
        let max = r.get_max_branch_depth();
        for position in 0..r.tokens().len() {
            assert!(
                max >= r.get_branch_nesting_level(position),
                "{} at {}",
                text,
                position
            );
        }
        assert!(r.validate_branch_structure(), "{}", text);
    }
}

#[test]
fn array_subscripts_stay_inside_instruction_tokens() {
    let r = rung("XIC(Arr[1,2])MOV(Src[0],Dst[Idx+1]);");
    assert_eq!(r.tokens(), &["XIC(Arr[1,2])", "MOV(Src[0],Dst[Idx+1])"]);
    assert!(r.branches().is_empty());
    let mov = &r.instructions()[1];
    assert_eq!(mov.operands().len(), 2);
    assert_eq!(mov.operands()[1].text(), "Dst[Idx+1]");
}

#[test]
fn degenerate_branches_heal_on_construction() {
    assert_eq!(rung("XIC(A)[XIC(B)]OTE(C);").text(), "XIC(A)XIC(B)OTE(C);");
    assert_eq!(
        rung("[[XIC(A)],XIC(B)]OTE(C);").text(),
        "[XIC(A),XIC(B)]OTE(C);"
    );
    let layout = derive_layout("XIC(A)[XIC(B)]OTE(C)", 3).unwrap();
    assert_eq!(layout.body(), "XIC(A)XIC(B)OTE(C)");
    assert!(layout.branches.is_empty());
}

#[test]
fn branch_validation_on_raw_tokens() {
    use l5x_core::domain::rung::branches::validate_branch_structure;
    let tokens = |t: &str| tokenize(t).unwrap();
    assert!(validate_branch_structure(&tokens("")));
    assert!(validate_branch_structure(&tokens("[XIC(A),XIC(B)]")));
    assert!(!validate_branch_structure(&tokens("]XIC(A)[")));
    assert!(!validate_branch_structure(&tokens("[XIC(A),XIC(B)")));
}

#[test]
fn malformed_text_is_structural() {
    for text in ["XIC(A", "XIC A;", "XIC(A)]OTE(B);", "XIC(A)#;"] {
        let err = Rung::from_value(json!({"@Number": "0", "Text": text})).unwrap_err();
        assert!(matches!(err, L5xError::Structural(_)), "{}: {:?}", text, err);
    }
}

#[test]
fn nested_branch_ids_and_parents() {
    let r = rung("[XIC(A),XIC(B)[XIC(C),XIC(D)]]OTE(E);");
    let outer = r.branches().get("rung_0_branch_0").unwrap();
    assert_eq!(outer.start_position, 0);
    assert_eq!(outer.end_position, Some(9));
    let inner_start = r
        .sequence()
        .iter()
        .filter(|e| e.element_type == RungElementType::BranchStart)
        .nth(1)
        .unwrap();
    assert_eq!(inner_start.position, 4);
    assert_eq!(inner_start.branch_level, 1);
    assert_eq!(inner_start.root_branch_id, "rung_0_branch_0");
    assert_eq!(r.find_matching_branch_end(4).unwrap(), Some(8));
    assert_eq!(outer.nested_branches, vec!["rung_0_branch_0:1", "rung_0_branch_1"]);
    assert_eq!(r.get_branch_internal_nesting_level(0).unwrap(), 1);
}

#[test]
fn editing_session_from_template() {
    let mut r = Rung::from_template(&EmbeddedTemplates, "XIC(Start)OTE(Run);", 7, Some("Start/stop"))
        .unwrap();
    assert_eq!(r.number(), 7);
    assert_eq!(r.comment(), "Start/stop");

    r.add_instruction("XIO(Stop)", Some(1)).unwrap();
    assert_eq!(r.text(), "XIC(Start)XIO(Stop)OTE(Run);");

    r.insert_branch(0, 1).unwrap();
    assert_eq!(r.text(), "[XIC(Start),]XIO(Stop)OTE(Run);");
    r.add_instruction("XIC(Run)", Some(3)).unwrap();
    assert_eq!(r.text(), "[XIC(Start),XIC(Run)]XIO(Stop)OTE(Run);");
    assert_eq!(r.get_max_branch_depth(), 1);

    r.insert_branch_level(0).unwrap();
    assert_eq!(r.text(), "[XIC(Start),,XIC(Run)]XIO(Stop)OTE(Run);");

    r.replace_instruction("OTE(Run)", "OTL(Run)", 0).unwrap();
    r.move_instruction("XIO(Stop)", 0, 0).unwrap();
    assert_eq!(r.text(), "XIO(Stop)[XIC(Start),,XIC(Run)]OTL(Run);");

    r.remove_branch("rung_7_branch_0").unwrap();
    assert_eq!(r.text(), "XIO(Stop)OTL(Run);");
    assert_eq!(r.meta()["Text"], "XIO(Stop)OTL(Run);");

    let steps = r.get_execution_sequence();
    assert_eq!(steps.len(), 2);
    assert!(steps[0].instruction.as_ref().unwrap().is_input);
    assert!(steps[1].instruction.as_ref().unwrap().is_output);
}

#[test]
fn failed_edit_keeps_previous_state() {
    let mut r = rung("XIC(A)[XIO(B),XIC(C)]OTE(D);");
    let before = r.get_execution_sequence();
    assert!(r.move_instruction("OTE(D)", 40, 0).is_err());
    assert!(r.replace_instruction("OTE(D)", "OTE D", 0).is_err());
    assert!(r.remove_instruction(1usize, 0).is_err());
    assert_eq!(r.text(), "XIC(A)[XIO(B),XIC(C)]OTE(D);");
    assert_eq!(r.get_execution_sequence(), before);
}
