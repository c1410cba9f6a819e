//! SheetForge CLI - Build driver
//!
//! Commands: build, assemble, stages
//! Outputs JSON to stdout
//! Returns non-zero on pipeline failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use sheetforge_core::{config::BuildConfig, BuildReport, StylesheetPipeline, ASSEMBLY_ORDER};

#[derive(Parser)]
#[command(name = "sheetforge-cli")]
#[command(about = "SheetForge CLI - Stylesheet Assembly Pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the build configuration
    #[arg(short, long, default_value = "sheetforge.yml")]
    config: PathBuf,

    /// Write the full build log to this file
    #[arg(long)]
    dump: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble, compile, clean, prefix and minify a theme
    Build {
        /// Theme name (overrides the configuration)
        #[arg(short, long)]
        theme: Option<String>,
    },

    /// Only write the merged stylesheet source
    Assemble {
        /// Theme name (overrides the configuration)
        #[arg(short, long)]
        theme: Option<String>,

        /// Output file (defaults to `<target css>/<theme>.less`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the category assembly order
    Stages,
}

fn init_logging(dump: Option<&Path>) {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "sheetforge_core=info".into()));

    let file = dump.and_then(|path| match File::create(path) {
        Ok(f) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(f))
                .with_filter(EnvFilter::new("sheetforge_core=trace")),
        ),
        Err(e) => {
            eprintln!("cannot open dump file {}: {}", path.display(), e);
            None
        }
    });

    tracing_subscriber::registry().with(console).with(file).init();
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}

fn failure(error: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({ "success": false, "error": error.to_string() })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Stages = cli.command {
        let stages: Vec<_> = ASSEMBLY_ORDER
            .iter()
            .map(|(category, placement)| serde_json::json!({
                "category": category,
                "placement": placement,
            }))
            .collect();
        print_json(&stages);
        return ExitCode::SUCCESS;
    }

    let config = match BuildConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            print_json(&failure(format!("Failed to load configuration: {}", e)));
            return ExitCode::FAILURE;
        }
    };

    let default_dump = config.base.join(&config.target).join("dump.txt");
    let dump = cli
        .dump
        .clone()
        .or_else(|| default_dump.parent().filter(|d| d.is_dir()).map(|_| default_dump.clone()));
    init_logging(dump.as_deref());

    let theme = config.theme.clone();
    let mut pipeline = match config.into_pipeline(StylesheetPipeline::new()) {
        Ok(p) => p,
        Err(e) => {
            print_json(&failure(e));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Build { theme: requested } => {
            let theme = requested.unwrap_or(theme);
            match pipeline.process(&theme) {
                Ok(report) => {
                    print_json(&build_output(&report));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_json(&failure(e));
                    ExitCode::from(2)
                }
            }
        }

        Commands::Assemble { theme: requested, output } => {
            let theme = requested.unwrap_or(theme);
            let output = match output.or_else(|| {
                pipeline
                    .target_css_dir()
                    .map(|dir| dir.join(format!("{}.less", theme)))
            }) {
                Some(o) => o,
                None => {
                    print_json(&failure("no output path and no target CSS directory"));
                    return ExitCode::FAILURE;
                }
            };

            let result = pipeline.assemble(&output);
            pipeline.cleanup();
            match result {
                Ok(()) => {
                    print_json(&serde_json::json!({ "success": true, "output": output }));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_json(&failure(e));
                    ExitCode::from(2)
                }
            }
        }

        Commands::Stages => ExitCode::SUCCESS,
    }
}

fn build_output(report: &BuildReport) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "build": report,
    })
}
