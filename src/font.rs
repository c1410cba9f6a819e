//! Font Entries - `@font-face` Synthesis and Publish Manifests

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::PipelineError;

/// Variable interpolated by the stylesheet compiler into the public fonts URL.
pub const FONT_URL_PREFIX: &str = "@{PATH_FONTS}";

/// Format-map key carrying an optional stylesheet fragment for the font.
pub const THEME_FILE_KEY: &str = "less";

/// Recognized font formats. Declaration order is the `src` emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFormat {
    Ttf,
    Eot,
    Woff2,
    Woff,
    Svg,
}

impl FontFormat {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "ttf" => Some(FontFormat::Ttf),
            "eot" => Some(FontFormat::Eot),
            "woff2" => Some(FontFormat::Woff2),
            "woff" => Some(FontFormat::Woff),
            "svg" => Some(FontFormat::Svg),
            _ => None,
        }
    }

    fn src_clause(&self, filename: &str, family: &str) -> String {
        match self {
            FontFormat::Eot => {
                format!("url('{FONT_URL_PREFIX}{filename}?#iefix') format('embedded-opentype')")
            }
            FontFormat::Woff2 => format!("url('{FONT_URL_PREFIX}{filename}') format('woff2')"),
            FontFormat::Woff => format!("url('{FONT_URL_PREFIX}{filename}') format('woff')"),
            FontFormat::Ttf => format!("url('{FONT_URL_PREFIX}{filename}') format('truetype')"),
            FontFormat::Svg => format!(
                "url('{FONT_URL_PREFIX}{filename}#{}') format('svg')",
                family.replace(' ', "")
            ),
        }
    }
}

/// Caller-supplied font description, as found in build configs and font catalogs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub display: String,
    /// Format keyword to source file. Unknown keywords are ignored.
    #[serde(default)]
    pub files: HashMap<String, PathBuf>,
    #[serde(default)]
    pub theme: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishFile {
    pub source: PathBuf,
    pub filename: String,
}

#[derive(Debug, Clone)]
struct LoadedFormat {
    file: PublishFile,
    font_face: String,
}

#[derive(Debug, Clone)]
pub struct Font {
    id: String,
    family: String,
    style: String,
    weight: String,
    display: String,
    files: HashMap<String, PathBuf>,
    theme: Option<PathBuf>,
    formats: BTreeMap<FontFormat, LoadedFormat>,
}

impl Font {
    /// Validate a descriptor. `id`, `family` and `files` are required.
    pub fn new(descriptor: FontDescriptor) -> Result<Self, PipelineError> {
        let missing = if descriptor.id.trim().is_empty() {
            Some("id")
        } else if descriptor.family.trim().is_empty() {
            Some("family")
        } else if descriptor.files.is_empty() {
            Some("files")
        } else {
            None
        };

        if let Some(field) = missing {
            return Err(PipelineError::Configuration(format!(
                "font descriptor is missing required field `{field}`"
            )));
        }

        Ok(Self {
            id: descriptor.id,
            family: descriptor.family,
            style: descriptor.style,
            weight: descriptor.weight,
            display: descriptor.display,
            files: descriptor.files,
            theme: descriptor.theme,
            formats: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn weight(&self) -> &str {
        &self.weight
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// Resolve every recognized format entry into a target filename and `src` clause.
    pub fn load(&mut self) -> &mut Self {
        for (keyword, source) in &self.files {
            let Some(format) = FontFormat::from_keyword(keyword) else {
                continue;
            };
            let filename = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let font_face = format.src_clause(&filename, &self.family);
            self.formats.insert(
                format,
                LoadedFormat {
                    file: PublishFile {
                        source: source.clone(),
                        filename,
                    },
                    font_face,
                },
            );
        }

        if self.formats.is_empty() {
            warn!(font = %self.id, "no recognized font format files, @font-face has no src");
        }
        self
    }

    pub fn loaded_formats(&self) -> Vec<FontFormat> {
        self.formats.keys().copied().collect()
    }

    pub fn font_face_css(&self) -> String {
        let sources: Vec<&str> = self.formats.values().map(|f| f.font_face.as_str()).collect();

        let mut css = vec!["@font-face {".to_string()];
        if !self.display.is_empty() {
            css.push(format!("  font-display: {};", self.display));
        }
        css.push(format!("  font-family: '{}';", self.family));
        if !self.style.is_empty() {
            css.push(format!("  font-style: {};", self.style));
        }
        if !self.weight.is_empty() {
            css.push(format!("  font-weight: {};", self.weight));
        }
        if !sources.is_empty() {
            css.push(format!("  src: {};", sources.join(", ")));
        }
        css.push("}".to_string());

        css.join("\n")
    }

    pub fn publish_files(&self) -> Vec<PublishFile> {
        self.formats.values().map(|f| f.file.clone()).collect()
    }

    pub fn theme_file(&self) -> Option<&Path> {
        self.theme
            .as_deref()
            .or_else(|| self.files.get(THEME_FILE_KEY).map(PathBuf::as_path))
    }
}

/// Font registry - descriptors on disk, looked up by id
pub struct FontCatalog {
    fonts: HashMap<String, FontDescriptor>,
}

impl FontCatalog {
    pub fn new() -> Self {
        Self { fonts: HashMap::new() }
    }

    /// Load every `*.json`, `*.yml` and `*.yaml` descriptor in `dir`.
    /// Relative format paths are resolved against `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut catalog = Self::new();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();
                let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                    continue;
                };
                let content = match fs::read_to_string(&path) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                let parsed = match ext {
                    "json" => serde_json::from_str::<FontDescriptor>(&content).map_err(|e| e.to_string()),
                    "yml" | "yaml" => serde_yaml::from_str::<FontDescriptor>(&content).map_err(|e| e.to_string()),
                    _ => continue,
                };
                match parsed {
                    Ok(mut descriptor) => {
                        for source in descriptor.files.values_mut() {
                            if source.is_relative() {
                                *source = dir.join(&*source);
                            }
                        }
                        if let Some(theme) = descriptor.theme.as_mut() {
                            if theme.is_relative() {
                                *theme = dir.join(&*theme);
                            }
                        }
                        catalog.register(descriptor);
                    }
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "skipping unreadable font descriptor");
                    }
                }
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&FontDescriptor> {
        self.fonts.get(id)
    }

    pub fn list(&self) -> Vec<&FontDescriptor> {
        self.fonts.values().collect()
    }

    pub fn register(&mut self, descriptor: FontDescriptor) {
        self.fonts.insert(descriptor.id.clone(), descriptor);
    }
}

impl Default for FontCatalog {
    fn default() -> Self {
        Self::new()
    }
}
