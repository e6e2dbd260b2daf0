pub mod service;

pub use service::{share, ProjectService, SharedController};
