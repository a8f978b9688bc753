//! CLI argument parsing for the archive workflow.
//!
//! The CLI stays thin: it resolves paths and flags, then hands ordered records
//! and capabilities to the core passes.
use crate::config::MediaProfile;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint for the clip archive workflow.
#[derive(Parser, Debug)]
#[command(
    name = "clipkeeper",
    version,
    about = "Catalog-driven clip archive reconciliation and acquisition",
    after_help = "Commands:\n  sync    Lint the catalog and acquire missing media\n  check   Reconcile the output store against the catalog\n  render  Render the published metadata document\n  diff    Diff the current and previous published documents\n\nExamples:\n  clipkeeper sync --catalog music.csv --source-dir /srv/sources --output-dir /srv/store\n  clipkeeper sync --check-only --catalog music.csv --output-dir /srv/store\n  clipkeeper check --catalog music.csv --output-dir /srv/store\n  clipkeeper render --catalog music.csv --output-dir /srv/store --rotate\n  clipkeeper diff --output-dir /srv/store",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level workflow commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Sync(SyncArgs),
    Check(CheckArgs),
    Render(RenderArgs),
    Diff(DiffArgs),
}

/// Sync command inputs: catalog checks plus acquisition.
#[derive(Parser, Debug)]
#[command(about = "Lint the catalog, then download and transcode missing clips")]
pub struct SyncArgs {
    /// Catalog CSV (falls back to CATALOG_PATH)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Directory holding downloaded source media (falls back to SOURCE_DIR)
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Output store directory (falls back to OUTPUT_DIR)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Media profiles to acquire, in order
    #[arg(long, value_enum, value_delimiter = ',', default_value = "audio-opus")]
    pub profile: Vec<MediaProfile>,

    /// Run the catalog checks only; skip acquisition
    #[arg(long)]
    pub check_only: bool,

    /// Never prompt; warnings are logged and the run continues
    #[arg(long)]
    pub non_interactive: bool,

    /// Write sources that failed to fetch to this file, one TYPE:id per line
    #[arg(long, value_name = "FILE")]
    pub export_failed: Option<PathBuf>,
}

/// Check command inputs for store reconciliation.
#[derive(Parser, Debug)]
#[command(about = "Report orphaned store files and missing published artifacts")]
pub struct CheckArgs {
    /// Catalog CSV (falls back to CATALOG_PATH)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Output store directory (falls back to OUTPUT_DIR)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Reconcile against legacy source-hash filenames (pre-migration stores)
    #[arg(long)]
    pub legacy_keys: bool,
}

/// Render command inputs for the published metadata document.
#[derive(Parser, Debug)]
#[command(about = "Render meta.json from the publish-visible catalog slice")]
pub struct RenderArgs {
    /// Catalog CSV (falls back to CATALOG_PATH)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Output store directory (falls back to OUTPUT_DIR)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Media profile whose artifacts the document links to
    #[arg(long, value_enum, default_value = "audio-opus")]
    pub profile: MediaProfile,

    /// Keep the previous document as meta.last.json for diffing
    #[arg(long)]
    pub rotate: bool,
}

/// Diff command inputs for incremental publishing.
#[derive(Parser, Debug)]
#[command(about = "Write diff.json comparing meta.json against meta.last.json")]
pub struct DiffArgs {
    /// Output store directory (falls back to OUTPUT_DIR)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}
