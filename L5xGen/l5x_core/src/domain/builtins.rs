//! Built-in datatype table, merged into every controller on compile and never exported.

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::domain::datatype::Datatype;
use crate::domain::tree;

const ATOMIC_BUILTINS: &[&str] = &[
    "BOOL", "BIT", "SINT", "INT", "DINT", "LINT", "USINT", "UINT", "UDINT", "ULINT", "REAL",
    "LREAL", "STRING",
];

const TIMER_MEMBERS: &[(&str, &str)] = &[
    ("PRE", "DINT"),
    ("ACC", "DINT"),
    ("EN", "BOOL"),
    ("TT", "BOOL"),
    ("DN", "BOOL"),
];

const COUNTER_MEMBERS: &[(&str, &str)] = &[
    ("PRE", "DINT"),
    ("ACC", "DINT"),
    ("CU", "BOOL"),
    ("CD", "BOOL"),
    ("DN", "BOOL"),
];

const CONTROL_MEMBERS: &[(&str, &str)] = &[
    ("LEN", "DINT"),
    ("POS", "DINT"),
    ("EN", "BOOL"),
    ("EU", "BOOL"),
    ("DN", "BOOL"),
    ("EM", "BOOL"),
    ("ER", "BOOL"),
    ("UL", "BOOL"),
    ("IN", "BOOL"),
    ("FD", "BOOL"),
];

fn structured(name: &str, members: &[(&str, &str)]) -> Value {
    let members: Vec<Value> = members
        .iter()
        .map(|(member, datatype)| {
            json!({
                "@Name": member,
                "@DataType": datatype,
                "@Dimension": "1",
                "@Hidden": "false",
            })
        })
        .collect();
    json!({"@Name": name, "Members": {"Member": members}})
}

fn build(value: Value) -> Option<Datatype> {
    let meta = tree::into_meta(value, "built-in datatype").ok()?;
    Datatype::builtin(meta).ok()
}

pub static BUILTIN_DATATYPES: Lazy<Vec<Datatype>> = Lazy::new(|| {
    let atomics = ATOMIC_BUILTINS.iter().map(|name| json!({ "@Name": name }));
    let structs = [
        structured("TIMER", TIMER_MEMBERS),
        structured("COUNTER", COUNTER_MEMBERS),
        structured("CONTROL", CONTROL_MEMBERS),
    ];
    atomics.chain(structs).filter_map(build).collect()
});

pub fn builtin_datatypes() -> &'static [Datatype] {
    &BUILTIN_DATATYPES
}

pub fn is_builtin_datatype(name: &str) -> bool {
    use crate::domain::meta::TreeObject;
    BUILTIN_DATATYPES.iter().any(|dt| dt.name() == name)
}
