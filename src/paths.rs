//! Build Directories and Display Aliases

use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// The four directories a build needs, plus the optional log dump location.
#[derive(Debug, Clone, Default)]
pub struct BuildDirs {
    pub base: Option<PathBuf>,
    pub tmp: Option<PathBuf>,
    pub target_css: Option<PathBuf>,
    pub target_fonts: Option<PathBuf>,
    pub dump: Option<PathBuf>,
}

/// Borrowed view of a fully configured `BuildDirs`.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDirs<'a> {
    pub base: &'a Path,
    pub tmp: &'a Path,
    pub target_css: &'a Path,
    pub target_fonts: &'a Path,
}

impl BuildDirs {
    /// Fail with a configuration error unless `path` is an existing directory.
    pub fn existing(path: impl Into<PathBuf>, what: &str) -> Result<PathBuf, PipelineError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(PipelineError::Configuration(format!(
                "{what} directory does not exist: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// All four directories, or a build error if any is unset or has vanished.
    pub fn resolve(&self) -> Result<ResolvedDirs<'_>, PipelineError> {
        match (&self.base, &self.tmp, &self.target_css, &self.target_fonts) {
            (Some(base), Some(tmp), Some(target_css), Some(target_fonts))
                if [base, tmp, target_css, target_fonts].iter().all(|p| p.is_dir()) =>
            {
                Ok(ResolvedDirs {
                    base,
                    tmp,
                    target_css,
                    target_fonts,
                })
            }
            _ => Err(PipelineError::Build(
                "base, tmp, target CSS or target font paths are not set".to_string(),
            )),
        }
    }
}

/// Rewrites absolute paths to `@TMP/`, `@FONTS/` or `@BASE/` for log output.
#[derive(Debug, Clone, Default)]
pub struct PathAlias {
    roots: Vec<(&'static str, PathBuf)>,
}

impl PathAlias {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dirs(dirs: &BuildDirs, local_fonts: Option<&Path>) -> Self {
        let mut alias = Self::new();
        if let Some(tmp) = &dirs.tmp {
            alias.register("@TMP", tmp);
        }
        if let Some(fonts) = local_fonts {
            alias.register("@FONTS", fonts);
        }
        if let Some(base) = &dirs.base {
            alias.register("@BASE", base);
        }
        alias
    }

    pub fn register(&mut self, prefix: &'static str, root: &Path) -> &mut Self {
        self.roots.retain(|(p, _)| *p != prefix);
        self.roots.push((prefix, root.to_path_buf()));
        self
    }

    /// Longest matching root wins; unmatched paths are returned unchanged.
    pub fn shorten(&self, path: &Path) -> String {
        let best = self
            .roots
            .iter()
            .filter_map(|(prefix, root)| {
                path.strip_prefix(root)
                    .ok()
                    .map(|rest| (root.components().count(), *prefix, rest))
            })
            .max_by_key(|(depth, _, _)| *depth);

        match best {
            Some((_, prefix, rest)) => {
                let parts: Vec<String> = rest
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                format!("{}/{}", prefix, parts.join("/"))
            }
            None => path.display().to_string(),
        }
    }
}
