//! Build Configuration - YAML Project Files
//!
//! ```yaml
//! base: .
//! target: build
//! theme: default
//! styles:
//!   variables: [less/core/variables.yml]
//!   mixins: [less/core/mixins.less]
//!   structure: [less/core/structure.less]
//! fonts:
//!   - lato-regular
//!   - id: icons
//!     family: Glyphicons
//!     files: { woff2: fonts/glyphicons.woff2 }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::category::Category;
use crate::error::PipelineError;
use crate::font::{FontCatalog, FontDescriptor};
use crate::pipeline::{StylesheetPipeline, DEFAULT_BREAKPOINT_VARIABLE};
use crate::toolchain::Toolchain;

/// A font entry: either a catalog id or an inline descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FontEntry {
    Catalog(String),
    Inline(FontDescriptor),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default = "default_base")]
    pub base: PathBuf,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_breakpoint")]
    pub breakpoint: String,
    #[serde(default)]
    pub cleanup_on_failure: bool,
    #[serde(default)]
    pub local_font_root: Option<PathBuf>,
    #[serde(default)]
    pub font_catalog: Option<PathBuf>,
    #[serde(default)]
    pub toolchain: Toolchain,
    /// Applied after every variable file, so these win.
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    #[serde(default)]
    pub styles: BTreeMap<Category, Vec<PathBuf>>,
    #[serde(default)]
    pub fonts: Vec<FontEntry>,
}

fn default_base() -> PathBuf { PathBuf::from(".") }
fn default_target() -> String { "build".to_string() }
fn default_theme() -> String { "default".to_string() }
fn default_breakpoint() -> String { DEFAULT_BREAKPOINT_VARIABLE.to_string() }

impl BuildConfig {
    pub fn from_yaml(content: &str) -> Result<Self, PipelineError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a config file, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut config = Self::from_yaml(&content)?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_relative_to(root);
        Ok(config)
    }

    pub fn resolve_relative_to(&mut self, root: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };

        anchor(&mut self.base);
        if let Some(p) = self.local_font_root.as_mut() {
            anchor(p);
        }
        if let Some(p) = self.font_catalog.as_mut() {
            anchor(p);
        }
        if let Some(p) = self.toolchain.bin_dir.as_mut() {
            anchor(p);
        }
        anchor(&mut self.toolchain.prefixer_config);
        for paths in self.styles.values_mut() {
            paths.iter_mut().for_each(anchor);
        }
        for entry in self.fonts.iter_mut() {
            if let FontEntry::Inline(descriptor) = entry {
                descriptor.files.values_mut().for_each(anchor);
                if let Some(theme) = descriptor.theme.as_mut() {
                    anchor(theme);
                }
            }
        }
    }

    /// Configure a pipeline and register every source this config names.
    pub fn into_pipeline(self, mut pipeline: StylesheetPipeline) -> Result<StylesheetPipeline, PipelineError> {
        pipeline
            .set_build_paths(&self.base, &self.target)?
            .set_breakpoint_variable(&self.breakpoint)
            .set_cleanup_on_failure(self.cleanup_on_failure)
            .set_toolchain(self.toolchain);
        if let Some(root) = &self.local_font_root {
            pipeline.set_local_font_root(root);
        }

        pipeline.register_categories(&self.styles);
        for (name, value) in &self.variables {
            pipeline.set_variable(name, value);
        }

        let catalog = match &self.font_catalog {
            Some(dir) => FontCatalog::load_from_dir(dir).map_err(|e| PipelineError::io(dir, e))?,
            None => FontCatalog::new(),
        };

        for entry in self.fonts {
            let descriptor = match entry {
                FontEntry::Inline(descriptor) => descriptor,
                FontEntry::Catalog(id) => match catalog.get(&id) {
                    Some(descriptor) => descriptor.clone(),
                    None => {
                        warn!(font = %id, "font not found in catalog");
                        continue;
                    }
                },
            };
            pipeline.register_font(descriptor)?;
        }

        Ok(pipeline)
    }
}
