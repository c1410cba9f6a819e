//! Error Taxonomy
//!
//! Configuration errors surface at setup time, build and processing errors abort
//! the pipeline. Soft failures never reach this type; they are logged instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Build error: {0}")]
    Build(String),

    #[error("Processing error in {stage}: {message}{}", code_suffix(.code))]
    Processing {
        stage: &'static str,
        code: Option<String>,
        message: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid build configuration: {0}")]
    Config(#[from] serde_yaml::Error),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

/// Coarse classification used by callers deciding how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Build,
    Processing,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_) | PipelineError::Config(_) => ErrorKind::Configuration,
            PipelineError::Build(_) | PipelineError::Io { .. } => ErrorKind::Build,
            PipelineError::Processing { .. } => ErrorKind::Processing,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn processing(stage: &'static str, code: Option<String>, message: impl Into<String>) -> Self {
        PipelineError::Processing {
            stage,
            code,
            message: message.into(),
        }
    }
}
