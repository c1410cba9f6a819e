//! SheetForge Core - Stylesheet Assembly Pipeline
//!
//! # Guarantees
//! 1. Assembly Order Is Fixed (variables, mixins, staged, appended categories)
//! 2. Partials Never Merge (`_name` fragments are dropped at registration)
//! 3. Media Wrapping Is Per Category
//! 4. First Font Registration Wins
//! 5. External Tools Succeed Or The Build Stops

pub mod category;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod font;
pub mod hashing;
pub mod merger;
pub mod paths;
pub mod pipeline;
pub mod toolchain;
pub mod variables;

pub use category::{Category, MediaWrap, Placement, ASSEMBLY_ORDER};
pub use cleaner::Cleaner;
pub use error::{ErrorKind, PipelineError};
pub use font::{Font, FontCatalog, FontDescriptor, FontFormat, PublishFile};
pub use hashing::{file_digest, sha256_hex};
pub use merger::MergeBuffer;
pub use paths::{BuildDirs, PathAlias};
pub use pipeline::{BuildReport, BuildStage, StylesheetPipeline};
pub use toolchain::{CommandRunner, RunOutcome, SystemRunner, Toolchain};
pub use variables::{LoadOutcome, VariableStore};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
