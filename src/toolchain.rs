//! External Tools - Compiler, Prefixer, Minifier
//!
//! Every tool is a blocking subprocess whose exit code is the only success
//! signal. `CommandRunner` is the seam tests use to avoid spawning anything.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::PipelineError;
use crate::paths::PathAlias;

/// What a finished subprocess reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub code: Option<i32>,
    pub stderr: String,
}

impl RunOutcome {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> std::io::Result<RunOutcome>;
}

/// Spawns real processes and waits for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> std::io::Result<RunOutcome> {
        let output = Command::new(program).args(args).output()?;
        Ok(RunOutcome {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Program names and options for the three external stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toolchain {
    /// Directory prepended to each program, e.g. `node_modules/.bin`.
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
    #[serde(default = "default_compiler")]
    pub compiler: String,
    #[serde(default = "default_prefixer")]
    pub prefixer: String,
    #[serde(default = "default_prefixer_config")]
    pub prefixer_config: PathBuf,
    #[serde(default = "default_minifier")]
    pub minifier: String,
}

fn default_compiler() -> String { "lessc".to_string() }
fn default_prefixer() -> String { "postcss".to_string() }
fn default_prefixer_config() -> PathBuf { PathBuf::from("postcss.json") }
fn default_minifier() -> String { "css-minify".to_string() }

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            bin_dir: None,
            compiler: default_compiler(),
            prefixer: default_prefixer(),
            prefixer_config: default_prefixer_config(),
            minifier: default_minifier(),
        }
    }
}

/// A fully built invocation, ready for a `CommandRunner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub stage: &'static str,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Toolchain {
    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    pub fn compile_invocation(&self, source: &Path, output: &Path) -> Invocation {
        Invocation {
            stage: "compile",
            program: self.program(&self.compiler),
            args: vec![source.into(), output.into()],
        }
    }

    pub fn prefix_invocation(&self, target: &Path) -> Invocation {
        Invocation {
            stage: "prefix",
            program: self.program(&self.prefixer),
            args: vec![
                "--replace".into(),
                "--verbose".into(),
                "--config".into(),
                self.prefixer_config.clone().into(),
                "--no-map".into(),
                target.into(),
            ],
        }
    }

    /// The minifier writes `<stem>.min.css` into the destination's directory.
    pub fn minify_invocation(&self, source: &Path, dest: &Path) -> Invocation {
        let dest_dir = dest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Invocation {
            stage: "minify",
            program: self.program(&self.minifier),
            args: vec!["-f".into(), source.into(), "-o".into(), dest_dir.into()],
        }
    }
}

impl Invocation {
    /// The command line with paths shortened for log output.
    pub fn describe(&self, alias: &PathAlias) -> String {
        std::iter::once(alias.shorten(&self.program))
            .chain(self.args.iter().map(|arg| alias.shorten(Path::new(arg))))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion. Spawn failures and non-zero exits are fatal.
    pub fn execute(&self, runner: &dyn CommandRunner, alias: &PathAlias) -> Result<(), PipelineError> {
        tracing::debug!(stage = self.stage, command = %self.describe(alias), "spawning");

        let outcome = runner.run(&self.program, &self.args).map_err(|e| {
            PipelineError::processing(
                self.stage,
                e.raw_os_error().map(|c| format!("os-{c}")),
                format!("failed to run {}: {}", self.program.display(), e),
            )
        })?;

        if !outcome.is_success() {
            let code = match outcome.code {
                Some(c) => format!("exit-{c}"),
                None => "signal".to_string(),
            };
            let stderr = outcome.stderr.trim();
            let mut message = format!("{} exited unsuccessfully", self.program.display());
            if !stderr.is_empty() {
                message.push_str(": ");
                message.push_str(stderr);
            }
            return Err(PipelineError::processing(self.stage, Some(code), message));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        outcome: RunOutcome,
        calls: RefCell<Vec<(PathBuf, Vec<OsString>)>>,
    }

    impl CommandRunner for Scripted {
        fn run(&self, program: &Path, args: &[OsString]) -> std::io::Result<RunOutcome> {
            self.calls.borrow_mut().push((program.to_path_buf(), args.to_vec()));
            Ok(self.outcome.clone())
        }
    }

    #[test]
    fn test_prefix_arguments() {
        let toolchain = Toolchain::default();
        let inv = toolchain.prefix_invocation(Path::new("/out/theme.css"));
        assert_eq!(inv.program, PathBuf::from("postcss"));
        let args: Vec<String> = inv.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["--replace", "--verbose", "--config", "postcss.json", "--no-map", "/out/theme.css"]
        );
    }

    #[test]
    fn test_bin_dir_prefixes_program() {
        let toolchain = Toolchain {
            bin_dir: Some(PathBuf::from("/node_modules/.bin")),
            ..Toolchain::default()
        };
        let inv = toolchain.compile_invocation(Path::new("a.less"), Path::new("a.css"));
        assert_eq!(inv.program, PathBuf::from("/node_modules/.bin/lessc"));
        assert_eq!(inv.args, vec![OsString::from("a.less"), OsString::from("a.css")]);
    }

    #[test]
    fn test_minify_targets_destination_directory() {
        let inv = Toolchain::default()
            .minify_invocation(Path::new("/out/css/theme.css"), Path::new("/out/css/theme.min.css"));
        assert_eq!(inv.args[3], OsString::from("/out/css"));
    }

    #[test]
    fn test_describe_shortens_paths() {
        let mut alias = PathAlias::new();
        alias.register("@BASE", Path::new("/project"));
        let inv = Toolchain::default().prefix_invocation(Path::new("/project/build/css/theme.css"));
        assert_eq!(
            inv.describe(&alias),
            "postcss --replace --verbose --config postcss.json --no-map @BASE/build/css/theme.css"
        );
    }

    #[test]
    fn test_non_zero_exit_is_processing_error() {
        let runner = Scripted {
            outcome: RunOutcome {
                code: Some(2),
                stderr: "ParseError: unrecognised input\n".to_string(),
            },
            calls: RefCell::new(vec![]),
        };
        let inv = Toolchain::default().compile_invocation(Path::new("a.less"), Path::new("a.css"));
        let err = inv.execute(&runner, &PathAlias::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Processing);
        let text = err.to_string();
        assert!(text.contains("compile"));
        assert!(text.contains("unrecognised input"));
        assert!(text.contains("[exit-2]"));
        assert_eq!(runner.calls.borrow().len(), 1);
    }
}
