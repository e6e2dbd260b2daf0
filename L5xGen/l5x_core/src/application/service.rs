use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use parking_lot::Mutex;

use crate::adapters::l5x::{DirTemplates, EmbeddedTemplates, L5xCodec};
use crate::config::L5xConfig;
use crate::domain::controller::{Controller, ImportSummary};
use crate::domain::factory::{AssetKind, ControllerFactory};
use crate::domain::meta::TreeObject;
use crate::ports::{ProjectCodec, TemplateSource};

/// One coarse lock per controller for multi-threaded hosts.
pub type SharedController = Arc<Mutex<Controller>>;

pub fn share(controller: Controller) -> SharedController {
    Arc::new(Mutex::new(controller))
}

/// Application layer use case wrapper around a `ProjectCodec`.
/// Keeps orchestration (file handling, profile matching, boundary checks) away from adapters.
pub struct ProjectService<C: ProjectCodec, T: TemplateSource> {
    codec: C,
    templates: T,
    factory: ControllerFactory,
    default_name: String,
}

impl ProjectService<L5xCodec, Box<dyn TemplateSource + Send + Sync>> {
    /// Service wired from config: L5X codec, template overrides, controller profiles.
    pub fn from_config(config: &L5xConfig) -> Self {
        let templates: Box<dyn TemplateSource + Send + Sync> = match &config.templates_dir {
            Some(dir) => Box::new(DirTemplates::new(dir)),
            None => Box::new(EmbeddedTemplates),
        };
        let mut service = ProjectService::new(L5xCodec::new(config.writer.clone()), templates)
            .with_factory(config.controller_factory());
        service.default_name = config.default_controller_name.clone();
        service
    }
}

impl<C: ProjectCodec, T: TemplateSource> ProjectService<C, T> {
    pub fn new(codec: C, templates: T) -> Self {
        Self {
            codec,
            templates,
            factory: ControllerFactory::new(),
            default_name: L5xConfig::standard().default_controller_name,
        }
    }

    pub fn with_factory(mut self, factory: ControllerFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn templates(&self) -> &T {
        &self.templates
    }

    pub fn factory(&self) -> &ControllerFactory {
        &self.factory
    }

    /// Parse project text and build the best matching controller.
    pub fn load_str(&self, text: &str) -> Result<Controller> {
        let document = self.codec.decode(text)?;
        let controller = self.factory.create_controller(document)?;
        Ok(controller)
    }

    pub fn load_file(&self, path: &Path) -> Result<Controller> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read project file: {}", path.display()))?;
        let controller = self
            .load_str(&text)
            .with_context(|| format!("Failed to load project file: {}", path.display()))?;
        info!(
            "loaded {} from {} (profile: {})",
            controller.name(),
            path.display(),
            controller.profile().unwrap_or("none")
        );
        Ok(controller)
    }

    /// Serialize after validation.
    pub fn save_string(&self, controller: &Controller) -> Result<String> {
        validate_controller(controller)?;
        self.codec.encode(&controller.meta_data())
    }

    /// Writes the project, appending the codec extension when the path lacks it.
    /// Returns the path written.
    pub fn save_file(&self, controller: &Controller, path: &Path) -> Result<PathBuf> {
        let path = with_extension(path, self.codec.extension());
        let text = self.save_string(controller)?;
        fs::write(&path, text)
            .with_context(|| format!("Failed to write project file: {}", path.display()))?;
        info!("saved {} to {}", controller.name(), path.display());
        Ok(path)
    }

    /// Empty controller from the root template.
    pub fn new_controller(&self, name: Option<&str>) -> Result<Controller> {
        let name = name.unwrap_or(&self.default_name);
        let controller = Controller::from_template(&self.templates, name)?;
        Ok(controller)
    }

    pub fn import_from_file(
        &self,
        controller: &mut Controller,
        path: &Path,
        asset_types: &[AssetKind],
    ) -> Result<ImportSummary> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read import file: {}", path.display()))?;
        let document = self
            .codec
            .decode(&text)
            .with_context(|| format!("Failed to parse import file: {}", path.display()))?;
        let summary = controller.import_assets_from_l5x_dict(&document, asset_types);
        info!(
            "imported {} asset(s) from {}, skipped {}",
            summary.imported,
            path.display(),
            summary.skipped
        );
        Ok(summary)
    }
}

fn validate_controller(controller: &Controller) -> Result<()> {
    if controller.name().trim().is_empty() {
        bail!("controller name is empty");
    }
    Ok(())
}

fn with_extension(path: &Path, extension: &str) -> PathBuf {
    let matches = path
        .extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false);
    if matches {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }
}
