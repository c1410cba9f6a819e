//! Text Cleaner - Post-Compile Normalization

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::PipelineError;

// Leading whitespace is consumed with the comment; trailing whitespace is kept.
static BLOCK_COMMENT: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    RegexBuilder::new(r"\s*/\*+.*?\*+/")
        .dot_matches_new_line(true)
        .multi_line(true)
        .build()
});

#[derive(Debug, Clone)]
pub struct Cleaner {
    css: String,
}

impl Cleaner {
    pub fn new(css: impl Into<String>) -> Self {
        Self { css: css.into() }
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn into_css(self) -> String {
        self.css
    }

    /// Unify `\r\n` and `\r` to `\n`, then trim the whole text.
    pub fn remove_line_ending_variance(&mut self) -> &mut Self {
        let unified = self.css.replace("\r\n", "\n").replace('\r', "\n");
        self.css = unified.trim().to_string();
        self
    }

    /// Replace every `/* ... */` block with a single space.
    pub fn remove_block_comments(&mut self) -> Result<&mut Self, PipelineError> {
        let pattern = (*BLOCK_COMMENT)
            .as_ref()
            .map_err(|e| PipelineError::processing("clean", Some(regex_error_code(e)), e.to_string()))?;

        let stripped = pattern.replace_all(&self.css, " ").into_owned();
        self.css = stripped;
        Ok(self)
    }
}

fn regex_error_code(err: &regex::Error) -> String {
    match err {
        regex::Error::Syntax(_) => "regex-syntax".to_string(),
        regex::Error::CompiledTooBig(limit) => format!("regex-size-limit-{limit}"),
        _ => "regex-unknown".to_string(),
    }
}
