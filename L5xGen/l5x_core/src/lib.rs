//! Typed Rockwell L5X project model and ladder rung engine.
//! Responsibilities: L5X XML to raw tree and back, typed controller/program/routine/tag/module
//! views over that tree, rung text tokenizing, branch analysis and editing.
//! Non-goals: Logix Designer automation, online communication with controllers (handled by upper layers).

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod application;

pub mod config;
pub mod error;

pub use domain::controller::{Controller, ImportSummary, RenameScope};
pub use domain::factory::{AssetKind, ControllerFactory, ControllerMatcher, PatternMatcher};
pub use domain::meta::TreeObject;
pub use domain::routine::{HasRoutines, Routine};
pub use domain::rung::Rung;
pub use application::service::{ProjectService, SharedController};
pub use ports::{ProjectCodec, TemplateSource};
pub use adapters::l5x::{DirTemplates, EmbeddedTemplates, L5xCodec};
pub use config::L5xConfig;
pub use error::{L5xError, L5xResult};
