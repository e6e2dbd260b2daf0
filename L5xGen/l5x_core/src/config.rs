use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::l5x::WriterOptions;
use crate::domain::factory::{ControllerFactory, PatternMatcher, DEFAULT_MIN_SCORE};

/// Project service settings.
/// Collects the tunables of loading and saving in one place instead of scattering
/// them over the adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct L5xConfig {
    /// Directory with template overrides (`_tag.L5X`, ...); unset uses the embedded set.
    pub templates_dir: Option<PathBuf>,
    pub writer: WriterOptions,
    /// Minimum profile score for controller matching.
    pub min_match_score: f64,
    /// Controller profiles tried in order.
    pub profiles: Vec<PatternMatcher>,
    /// Name given to controllers created from the root template.
    pub default_controller_name: String,
}

impl Default for L5xConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl L5xConfig {
    /// Indented output, no profiles.
    pub fn standard() -> Self {
        Self {
            templates_dir: None,
            writer: WriterOptions::default(),
            min_match_score: DEFAULT_MIN_SCORE,
            profiles: Vec::new(),
            default_controller_name: "NewController".to_string(),
        }
    }

    /// Single-line output, e.g. for diffing or embedding in other documents.
    pub fn compact() -> Self {
        Self {
            writer: WriterOptions {
                indent: 0,
                ..WriterOptions::default()
            },
            ..Self::standard()
        }
    }

    /// JSON config; a missing file yields the standard settings.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read L5X config file from: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse L5X config JSON from: {}", path.display()))?;
        Ok(config)
    }

    pub fn controller_factory(&self) -> ControllerFactory {
        ControllerFactory::from_profiles(&self.profiles).with_min_score(self.min_match_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = L5xConfig::load_from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, L5xConfig::standard());
        assert_eq!(config.writer.indent, 2);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l5x.json");
        fs::write(
            &path,
            r#"{"min_match_score": 0.5, "writer": {"indent": 4},
                "profiles": [{"name": "gm", "program_patterns": ["MCP"]}]}"#,
        )
        .unwrap();
        let config = L5xConfig::load_from_file(&path).unwrap();
        assert_eq!(config.writer.indent, 4);
        assert!(config.writer.standalone);
        assert_eq!(config.profiles[0].program_patterns, vec!["MCP"]);
        assert!(config.profiles[0].tag_patterns.is_empty());
        assert_eq!(config.default_controller_name, "NewController");
        let factory = config.controller_factory();
        assert_eq!(factory.matcher_names(), vec!["gm"]);
        assert!((factory.min_score() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nope").unwrap();
        let err = L5xConfig::load_from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn compact_preset() {
        assert_eq!(L5xConfig::compact().writer.indent, 0);
    }
}
