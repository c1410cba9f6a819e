//! Merge Buffer - Ordered Fragment Accumulation
//!
//! Two phases: staging (variables, mixins, plain files) plus immediate appends to
//! the tail, then a single consuming `finalize()` that renders
//! `variables + mixins + files + tail`.

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::PipelineError;
use crate::variables::declaration;

#[derive(Debug, Default)]
pub struct MergeBuffer {
    variables: IndexMap<String, String>,
    mixins: Vec<PathBuf>,
    files: Vec<PathBuf>,
    tail: String,
}

impl MergeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variables<'a, I>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in variables {
            self.set_variable(name, value);
        }
        self
    }

    pub fn set_variable(&mut self, name: &str, value: &str) -> &mut Self {
        self.variables.insert(name.to_string(), value.to_string());
        self
    }

    pub fn set_mixins<P: AsRef<Path>>(&mut self, paths: &[P]) -> &mut Self {
        for path in paths {
            self.set_mixin(path.as_ref());
        }
        self
    }

    /// Stage a mixin file. Existence is checked now, not at finalize time.
    pub fn set_mixin(&mut self, path: &Path) -> &mut Self {
        if path.exists() {
            self.mixins.push(path.to_path_buf());
        }
        self
    }

    pub fn set_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> &mut Self {
        for path in paths {
            self.set_file(path.as_ref());
        }
        self
    }

    pub fn set_file(&mut self, path: &Path) -> &mut Self {
        if path.exists() {
            self.files.push(path.to_path_buf());
        }
        self
    }

    /// Append a file's trimmed content to the tail, headed by a source comment.
    /// Missing or blank files contribute nothing.
    pub fn add_file(&mut self, path: &Path) -> Result<&mut Self, PipelineError> {
        append_file(&mut self.tail, path)?;
        Ok(self)
    }

    pub fn add_string(&mut self, text: &str) -> &mut Self {
        append_string(&mut self.tail, text);
        self
    }

    pub fn staged_mixins(&self) -> &[PathBuf] {
        &self.mixins
    }

    pub fn staged_files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Render the merged source. Consumes the buffer, so staging after
    /// finalization is impossible.
    pub fn finalize(self) -> Result<String, PipelineError> {
        let mut head = String::new();

        for (name, value) in &self.variables {
            append_string(&mut head, &declaration(name, value));
        }
        for mixin in &self.mixins {
            append_file(&mut head, mixin)?;
        }
        for file in &self.files {
            append_file(&mut head, file)?;
        }

        head.push_str(&self.tail);
        Ok(head)
    }
}

fn append_file(out: &mut String, path: &Path) -> Result<(), PipelineError> {
    if !path.exists() {
        return Ok(());
    }

    let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(file = %path.display(), "fragment is not valid UTF-8, replacing invalid bytes");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    let content = content.trim();
    if content.is_empty() {
        return Ok(());
    }

    out.push_str("// ");
    out.push_str(&path.display().to_string());
    out.push('\n');
    out.push_str(content);
    out.push_str("\n\n");
    Ok(())
}

fn append_string(out: &mut String, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        out.push_str(text);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_empty_buffer_finalizes_to_empty() {
        assert_eq!(MergeBuffer::new().finalize().unwrap(), "");
    }

    #[test]
    fn test_variables_dedup_last_write_wins() {
        let mut buffer = MergeBuffer::new();
        buffer
            .set_variable("primary", "#000")
            .set_variable("empty", "")
            .set_variable("primary", "#fff");
        let content = buffer.finalize().unwrap();
        assert_eq!(content, "@primary: #fff;\n@empty: \"\";\n");
    }

    #[test]
    fn test_add_file_format() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "button.less", "\n  .button { padding: 10px; }  \n");

        let mut buffer = MergeBuffer::new();
        buffer.add_file(&path).unwrap();
        let content = buffer.finalize().unwrap();
        assert_eq!(
            content,
            format!("// {}\n.button {{ padding: 10px; }}\n\n", path.display())
        );
    }

    #[test]
    fn test_non_utf8_fragment_is_merged_lossily() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.less");
        fs::write(&path, b".a{content:'\xe9'}").unwrap();

        let mut buffer = MergeBuffer::new();
        buffer.set_file(&path).add_file(&path).unwrap();
        let content = buffer.finalize().unwrap();
        assert_eq!(content.matches(".a{content:'\u{fffd}'}").count(), 2);
    }

    #[test]
    fn test_blank_file_contributes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "blank.less", "   \n\t\n");

        let mut buffer = MergeBuffer::new();
        buffer.add_file(&path).unwrap();
        assert_eq!(buffer.finalize().unwrap(), "");
    }

    #[test]
    fn test_add_string_trims_and_skips_blank() {
        let mut buffer = MergeBuffer::new();
        buffer.add_string("   ").add_string("  @media print {  ").add_string("}");
        assert_eq!(buffer.finalize().unwrap(), "@media print {\n}\n");
    }

    #[test]
    fn test_missing_staged_files_are_dropped() {
        let mut buffer = MergeBuffer::new();
        buffer
            .set_mixin(Path::new("/nonexistent/mixins.less"))
            .set_file(Path::new("/nonexistent/normalize.less"));
        assert!(buffer.staged_mixins().is_empty());
        assert!(buffer.staged_files().is_empty());
        assert_eq!(buffer.finalize().unwrap(), "");
    }

    #[test]
    fn test_staged_content_precedes_tail() {
        let dir = TempDir::new().unwrap();
        let mixin = write(&dir, "mixins.less", ".m(){color:red;}");
        let normalize = write(&dir, "normalize.less", "html{margin:0;}");
        let structure = write(&dir, "structure.less", ".a{.m();}");

        let mut buffer = MergeBuffer::new();
        buffer.add_file(&structure).unwrap();
        buffer
            .set_variables([("primary", "#07f")])
            .set_mixins(&[&mixin])
            .set_files(&[&normalize]);
        let content = buffer.finalize().unwrap();

        let v = content.find("@primary: #07f;").unwrap();
        let m = content.find(".m(){color:red;}").unwrap();
        let n = content.find("html{margin:0;}").unwrap();
        let s = content.find(".a{.m();}").unwrap();
        assert!(v < m && m < n && n < s);
    }
}
