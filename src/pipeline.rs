//! Stylesheet Pipeline - Single Entry Point
//!
//! Stages run strictly in order:
//! assemble -> compile -> clean -> prefix -> minify -> cleanup.
//! A failed stage aborts everything after it. Nothing is retried.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::category::{Category, MediaWrap, Placement, ASSEMBLY_ORDER};
use crate::cleaner::Cleaner;
use crate::error::PipelineError;
use crate::font::{Font, FontDescriptor};
use crate::hashing::{file_digest, short_fingerprint};
use crate::merger::MergeBuffer;
use crate::paths::{BuildDirs, PathAlias};
use crate::toolchain::{CommandRunner, SystemRunner, Toolchain};
use crate::variables::{LoadOutcome, VariableStore};

/// Basename prefix marking include-only partials that are never merged.
pub const EXCLUSION_MARKER: char = '_';

pub const DEFAULT_BREAKPOINT_VARIABLE: &str = "sm-max-width";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    Registered,
    Assembled,
    Compiled,
    Cleaned,
    Prefixed,
    Minified,
    Done,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub theme: String,
    pub less_path: PathBuf,
    pub css_path: PathBuf,
    pub min_path: PathBuf,
    pub min_size: u64,
    pub min_digest: String,
    /// Short digest prefix for cache-busting query strings.
    pub fingerprint: String,
    pub fonts: Vec<String>,
    pub completed_at: DateTime<Utc>,
    pub stage: BuildStage,
}

/// The stylesheet pipeline - owns registrations and drives every stage
pub struct StylesheetPipeline {
    dirs: BuildDirs,
    local_font_root: Option<PathBuf>,
    variables: VariableStore,
    files: BTreeMap<Category, Vec<PathBuf>>,
    fonts: IndexMap<String, Font>,
    tmp_files: Vec<PathBuf>,
    toolchain: Toolchain,
    runner: Box<dyn CommandRunner>,
    breakpoint_variable: String,
    cleanup_on_failure: bool,
    stage: BuildStage,
}

impl std::fmt::Debug for StylesheetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StylesheetPipeline")
            .field("dirs", &self.dirs)
            .field("local_font_root", &self.local_font_root)
            .field("variables", &self.variables)
            .field("files", &self.files)
            .field("fonts", &self.fonts)
            .field("tmp_files", &self.tmp_files)
            .field("toolchain", &self.toolchain)
            .field("breakpoint_variable", &self.breakpoint_variable)
            .field("cleanup_on_failure", &self.cleanup_on_failure)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

impl StylesheetPipeline {
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }

    pub fn with_runner(runner: impl CommandRunner + 'static) -> Self {
        Self {
            dirs: BuildDirs::default(),
            local_font_root: None,
            variables: VariableStore::new(),
            files: BTreeMap::new(),
            fonts: IndexMap::new(),
            tmp_files: vec![],
            toolchain: Toolchain::default(),
            runner: Box::new(runner),
            breakpoint_variable: DEFAULT_BREAKPOINT_VARIABLE.to_string(),
            cleanup_on_failure: false,
            stage: BuildStage::Registered,
        }
    }

    // --- Configuration ---

    /// Derive every directory from a project root:
    /// `base/`, `base/tmp/`, `base/<target>/css/`, `base/<target>/fonts/`.
    pub fn set_build_paths(&mut self, base: &Path, target: &str) -> Result<&mut Self, PipelineError> {
        self.set_base_dir(base)?;
        self.set_tmp_dir(&base.join("tmp"))?;
        self.set_target_css_dir(&base.join(target).join("css"))?;
        self.set_target_font_dir(&base.join(target).join("fonts"))?;
        self.set_dump_path(&base.join(target).join("dump.txt"));
        Ok(self)
    }

    pub fn set_base_dir(&mut self, dir: &Path) -> Result<&mut Self, PipelineError> {
        self.dirs.base = Some(BuildDirs::existing(dir, "Base")?);
        Ok(self)
    }

    pub fn set_tmp_dir(&mut self, dir: &Path) -> Result<&mut Self, PipelineError> {
        self.dirs.tmp = Some(BuildDirs::existing(dir, "Temporary")?);
        Ok(self)
    }

    pub fn set_target_css_dir(&mut self, dir: &Path) -> Result<&mut Self, PipelineError> {
        self.dirs.target_css = Some(BuildDirs::existing(dir, "Target CSS")?);
        Ok(self)
    }

    pub fn set_target_font_dir(&mut self, dir: &Path) -> Result<&mut Self, PipelineError> {
        self.dirs.target_fonts = Some(BuildDirs::existing(dir, "Target fonts")?);
        Ok(self)
    }

    pub fn set_dump_path(&mut self, path: &Path) -> &mut Self {
        self.dirs.dump = Some(path.to_path_buf());
        self
    }

    pub fn dump_path(&self) -> Option<&Path> {
        self.dirs.dump.as_deref()
    }

    pub fn target_css_dir(&self) -> Option<&Path> {
        self.dirs.target_css.as_deref()
    }

    /// Root of the local font sources, shown as `@FONTS/` in logs.
    pub fn set_local_font_root(&mut self, dir: &Path) -> &mut Self {
        self.local_font_root = Some(dir.to_path_buf());
        self
    }

    pub fn set_toolchain(&mut self, toolchain: Toolchain) -> &mut Self {
        self.toolchain = toolchain;
        self
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn set_breakpoint_variable(&mut self, name: &str) -> &mut Self {
        self.breakpoint_variable = name.trim_start_matches('@').to_string();
        self
    }

    pub fn breakpoint_variable(&self) -> &str {
        &self.breakpoint_variable
    }

    /// Whether `process()` removes temporaries when a stage fails.
    /// Off by default.
    pub fn set_cleanup_on_failure(&mut self, enabled: bool) -> &mut Self {
        self.cleanup_on_failure = enabled;
        self
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    fn alias(&self) -> PathAlias {
        PathAlias::from_dirs(&self.dirs, self.local_font_root.as_deref())
    }

    // --- Registration ---

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn set_variable(&mut self, name: &str, value: &str) -> &mut Self {
        self.variables.set(name, value);
        self
    }

    /// Bulk-load a variable document. A parse failure is logged and reported,
    /// never raised.
    pub fn load_variables(&mut self, path: &Path) -> LoadOutcome {
        let outcome = self.variables.load_from_file(path);
        match &outcome {
            LoadOutcome::Loaded(count) => {
                debug!(file = %self.alias().shorten(path), count, "loaded variables");
            }
            LoadOutcome::ParseFailed(reason) => {
                warn!(file = %self.alias().shorten(path), reason = %reason, "ignoring unparsable variables file");
            }
        }
        outcome
    }

    /// Register one fragment. Partials (`_name`) and missing files are dropped.
    /// Variable files are loaded into the store instead of being kept as fragments.
    pub fn register_file(&mut self, category: Category, path: &Path) -> bool {
        if category == Category::Variables {
            return matches!(self.load_variables(path), LoadOutcome::Loaded(_));
        }

        let excluded = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with(EXCLUSION_MARKER))
            .unwrap_or(true);
        if excluded || !path.exists() {
            trace!(stage = "register", category = %category, file = %self.alias().shorten(path), "skipping fragment");
            return false;
        }

        debug!(stage = "register", category = %category, file = %self.alias().shorten(path), "registered");
        self.files.entry(category).or_default().push(path.to_path_buf());
        true
    }

    pub fn register_files<P: AsRef<Path>>(&mut self, category: Category, paths: &[P]) -> usize {
        let mut accepted = 0;
        for path in paths {
            if self.register_file(category, path.as_ref()) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Register several categories at once, in category order.
    pub fn register_categories(&mut self, paths: &BTreeMap<Category, Vec<PathBuf>>) -> usize {
        let total: usize = paths.values().map(Vec::len).sum();
        info!(stage = "register", total, "registering stylesheet sources");

        paths
            .iter()
            .map(|(category, list)| self.register_files(*category, list))
            .sum()
    }

    pub fn files(&self, category: Category) -> &[PathBuf] {
        self.files.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Track a file for removal by `cleanup()`.
    pub fn add_tmp_file(&mut self, path: &Path) -> &mut Self {
        self.tmp_files.push(path.to_path_buf());
        self
    }

    pub fn tmp_files(&self) -> &[PathBuf] {
        &self.tmp_files
    }

    /// Register a font and publish its files. A repeated id is ignored.
    /// Returns whether the font was added.
    pub fn register_font(&mut self, descriptor: FontDescriptor) -> Result<bool, PipelineError> {
        if self.fonts.contains_key(&descriptor.id) {
            debug!(font = %descriptor.id, "font already registered");
            return Ok(false);
        }

        let target_fonts = self.dirs.target_fonts.clone().ok_or_else(|| {
            PipelineError::Configuration("target font directory must be set before adding fonts".into())
        })?;

        let mut font = Font::new(descriptor)?;
        font.load();
        debug!(font = %font.id(), family = %font.family(), "adding font");

        let alias = self.alias();
        for file in font.publish_files() {
            copy_font_file(&file.source, &target_fonts.join(&file.filename), &alias);
        }

        self.fonts.insert(font.id().to_string(), font);
        Ok(true)
    }

    pub fn font(&self, id: &str) -> Option<&Font> {
        self.fonts.get(id)
    }

    pub fn fonts(&self) -> impl Iterator<Item = &Font> {
        self.fonts.values()
    }

    // --- Stages ---

    /// Merge every registered source into one stylesheet source at `output`.
    pub fn assemble(&mut self, output: &Path) -> Result<(), PipelineError> {
        info!(stage = "assemble", "started");
        let result = self.assemble_inner(output);
        log_outcome("assemble", &result);
        if result.is_ok() {
            self.stage = BuildStage::Assembled;
        }
        result
    }

    fn assemble_inner(&mut self, output: &Path) -> Result<(), PipelineError> {
        let tmp_dir = self.dirs.resolve()?.tmp.to_path_buf();

        let variables_file = tmp_dir.join(format!("VARIABLES_{}.less", Uuid::new_v4().simple()));
        self.write_file(&variables_file, &self.variables.serialize())?;
        self.tmp_files.push(variables_file.clone());
        self.files.entry(Category::Variables).or_default().push(variables_file);

        let mut font_faces = String::new();
        let mut themes = vec![];
        for font in self.fonts.values() {
            font_faces.push_str(&font.font_face_css());
            font_faces.push_str("\n\n");
            if let Some(theme) = font.theme_file() {
                themes.push(theme.to_path_buf());
            }
        }
        for theme in themes {
            if !self.files(Category::Fonts).contains(&theme) {
                self.register_file(Category::Fonts, &theme);
            }
        }

        let mut buffer = MergeBuffer::new();
        buffer.set_variables(self.variables.iter());

        for (category, placement) in ASSEMBLY_ORDER {
            match placement {
                Placement::Mixin => {
                    buffer.set_mixins(self.files(*category));
                }
                Placement::Staged => {
                    buffer.set_files(self.files(*category));
                }
                Placement::Appended(wrap) => {
                    self.append_category(&mut buffer, *category, *wrap)?;
                }
            }
        }

        let mut source = buffer.finalize()?;
        if !font_faces.is_empty() {
            source = format!("{font_faces}\n\n{source}");
        }

        self.write_file(output, &source)
    }

    fn append_category(
        &self,
        buffer: &mut MergeBuffer,
        category: Category,
        wrap: MediaWrap,
    ) -> Result<(), PipelineError> {
        let files = self.files(category);
        if files.is_empty() {
            return Ok(());
        }

        debug!(stage = "assemble", category = %category, count = files.len(), "appending category");
        let opener = wrap.opener(&self.breakpoint_variable);
        if let Some(opener) = &opener {
            buffer.add_string(opener);
        }

        let alias = self.alias();
        for path in files {
            trace!(stage = "assemble", " - {:<10} {}", category.as_str().to_uppercase(), alias.shorten(path));
            buffer.add_file(path)?;
        }

        if opener.is_some() {
            buffer.add_string("}");
        }
        Ok(())
    }

    /// Run the external compiler on `source`, producing `output`.
    pub fn compile(&mut self, source: &Path, output: &Path) -> Result<(), PipelineError> {
        info!(stage = "compile", "started");
        let result = require_file("compile", source)
            .and_then(|_| {
                self.toolchain
                    .compile_invocation(source, output)
                    .execute(self.runner.as_ref(), &self.alias())
            })
            .and_then(|_| require_file("compile", output));
        log_outcome("compile", &result);
        if result.is_ok() {
            self.stage = BuildStage::Compiled;
        }
        result
    }

    /// Normalize line endings and strip block comments in place.
    pub fn post_compile_clean(&mut self, path: &Path) -> Result<(), PipelineError> {
        info!(stage = "clean", "started");
        let result = self.clean_inner(path);
        log_outcome("clean", &result);
        if result.is_ok() {
            self.stage = BuildStage::Cleaned;
        }
        result
    }

    fn clean_inner(&self, path: &Path) -> Result<(), PipelineError> {
        require_file("clean", path)?;
        let css = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;

        let mut cleaner = Cleaner::new(css);
        cleaner.remove_line_ending_variance().remove_block_comments()?;

        self.write_file(path, cleaner.css())
    }

    /// Run the vendor prefixer, which rewrites `path` in place.
    pub fn prefix(&mut self, path: &Path) -> Result<(), PipelineError> {
        info!(stage = "prefix", "started");
        let result = require_file("prefix", path).and_then(|_| {
            self.toolchain
                .prefix_invocation(path)
                .execute(self.runner.as_ref(), &self.alias())
        });
        log_outcome("prefix", &result);
        if result.is_ok() {
            self.stage = BuildStage::Prefixed;
        }
        result
    }

    /// Run the minifier. Returns the size of the minified file in bytes.
    pub fn minify(&mut self, source: &Path, dest: &Path) -> Result<u64, PipelineError> {
        info!(stage = "minify", "started");
        let result = require_file("minify", source)
            .and_then(|_| {
                self.toolchain
                    .minify_invocation(source, dest)
                    .execute(self.runner.as_ref(), &self.alias())
            })
            .and_then(|_| require_file("minify", dest))
            .and_then(|_| {
                fs::metadata(dest)
                    .map(|m| m.len())
                    .map_err(|e| PipelineError::io(dest, e))
            });

        if let Ok(size) = &result {
            info!(
                stage = "minify",
                file = %self.alias().shorten(dest),
                size_kb = *size as f64 / 1000.0,
                "minified"
            );
        }
        log_outcome("minify", &result);
        if result.is_ok() {
            self.stage = BuildStage::Minified;
        }
        result
    }

    /// Remove every tracked temporary. Failures are logged, never raised.
    pub fn cleanup(&mut self) {
        if self.tmp_files.is_empty() {
            return;
        }

        info!(stage = "cleanup", count = self.tmp_files.len(), "started");
        let alias = self.alias();
        for path in self.tmp_files.drain(..) {
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => trace!(stage = "cleanup", file = %alias.shorten(&path), "removed"),
                Err(e) => warn!(
                    stage = "cleanup",
                    file = %alias.shorten(&path),
                    error = %e,
                    "error removing file"
                ),
            }
        }
        info!(stage = "cleanup", "OK");
    }

    /// Build `<theme>.less`, `<theme>.css` and `<theme>.min.css` in the target CSS directory.
    pub fn process(&mut self, theme: &str) -> Result<BuildReport, PipelineError> {
        if theme.is_empty() || theme.contains(['/', '\\']) {
            return Err(PipelineError::Configuration(format!("invalid theme name: {theme:?}")));
        }

        let target_css = self.dirs.resolve()?.target_css.to_path_buf();
        let less_path = target_css.join(format!("{theme}.less"));
        let css_path = target_css.join(format!("{theme}.css"));
        let min_path = target_css.join(format!("{theme}.min.css"));

        let min_size = match self.run_stages(&less_path, &css_path, &min_path) {
            Ok(size) => size,
            Err(e) => {
                if self.cleanup_on_failure {
                    self.cleanup();
                }
                return Err(e);
            }
        };

        self.cleanup();
        self.stage = BuildStage::Done;

        let min_digest = file_digest(&min_path).map_err(|e| PipelineError::io(&min_path, e))?;
        Ok(BuildReport {
            theme: theme.to_string(),
            less_path,
            css_path,
            min_path,
            min_size,
            fingerprint: short_fingerprint(&min_digest).to_string(),
            min_digest,
            fonts: self.fonts.keys().cloned().collect(),
            completed_at: Utc::now(),
            stage: self.stage,
        })
    }

    fn run_stages(&mut self, less: &Path, css: &Path, min: &Path) -> Result<u64, PipelineError> {
        self.assemble(less)?;
        self.compile(less, css)?;
        self.post_compile_clean(css)?;
        self.prefix(css)?;
        self.minify(css, min)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<(), PipelineError> {
        fs::write(path, content).map_err(|e| PipelineError::io(path, e))?;
        trace!(
            file = %self.alias().shorten(path),
            size_kb = content.len() as f64 / 1000.0,
            "dumped content to file"
        );
        Ok(())
    }
}

impl Default for StylesheetPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn require_file(stage: &'static str, path: &Path) -> Result<(), PipelineError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::Build(format!(
            "{stage}: expected file is missing: {}",
            path.display()
        )))
    }
}

fn log_outcome<T>(stage: &'static str, result: &Result<T, PipelineError>) {
    match result {
        Ok(_) => info!(stage, "OK"),
        Err(e) => error!(stage, error = %e, "KO"),
    }
}

fn copy_font_file(source: &Path, target: &Path, alias: &PathAlias) {
    if !source.exists() {
        warn!(source = %alias.shorten(source), "font source file does not exist");
        return;
    }

    match fs::copy(source, target) {
        Ok(_) => trace!(source = %alias.shorten(source), target = %alias.shorten(target), "copied font file"),
        Err(e) => warn!(
            source = %alias.shorten(source),
            target = %alias.shorten(target),
            error = %e,
            "error copying font file"
        ),
    }
}
