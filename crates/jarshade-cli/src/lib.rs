//! jarshade - multi-target mod artifact composer
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Composes one distributable archive per declared target from a shared
//! core, a platform adapter, and a set of bundled libraries. Bundled
//! packages are relocated out of the host's namespace, symbols are remapped
//! for obfuscated hosts, unreachable classes are dropped, and the resulting
//! archive is byte-reproducible.
//!
//! # Configuration
//!
//! One `jarshade.toml` at the project root:
//!
//! ```text
//! [project]
//! name = "example"
//! version = "1.0.0"
//! core = "build/core.jar"
//!
//! [[target]]
//! name = "fabric"
//! family = "fabric"
//! adapter = "build/fabric-adapter.jar"
//! ```

pub mod cmd;

pub use jarshade_core::{BuildOutcome, TargetBuild, TargetFailure};
pub use jarshade_schema::CONFIG_FILE;
pub use jarshade_schema::profile::ProjectConfig;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "jarshade")]
#[command(author, version, about = "jarshade - multi-target mod artifact composer")]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build target archives
    Build {
        /// Target name(s) to build (all declared targets if empty)
        #[arg(long = "target")]
        targets: Vec<String>,
        /// Project directory containing jarshade.toml
        #[arg(long, default_value = ".")]
        project: PathBuf,
        /// Maximum targets built concurrently
        #[arg(long)]
        jobs: Option<usize>,
        /// Emit a machine-readable JSON report instead of the summary table
        #[arg(long)]
        json: bool,
    },
    /// Validate configuration and resolve every target without building
    Check {
        /// Project directory containing jarshade.toml
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },
    /// List an archive's entries, or its classes with reference counts
    Inspect {
        /// Archive to inspect
        archive: PathBuf,
        /// Parse class entries and list declared names with reference counts
        #[arg(long)]
        classes: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
