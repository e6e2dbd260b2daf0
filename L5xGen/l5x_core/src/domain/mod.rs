//! Typed L5X project model and the ladder rung engine.

pub mod aoi;
pub mod builtins;
pub mod collection;
pub mod controller;
pub mod datatype;
pub mod factory;
pub mod instruction;
pub mod meta;
pub mod module;
pub mod operand;
pub mod program;
pub mod routine;
pub mod rung;
pub mod safety;
pub mod tag;
pub mod tree;
pub mod validation;
