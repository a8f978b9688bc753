use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod action;
mod catalog;
mod cli;
mod config;
mod fuzzy;
mod gate;
mod identity;
mod lint;
mod pipeline;
mod publish;
mod snapshot;
mod store;
mod tools;

use cli::{CheckArgs, Command, DiffArgs, RenderArgs, RootArgs, SyncArgs};
use config::ArchiveConfig;
use identity::IdentityHasher;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Sync(args) => cmd_sync(args),
        Command::Check(args) => cmd_check(args),
        Command::Render(args) => cmd_render(args),
        Command::Diff(args) => cmd_diff(args),
    }
}

fn cmd_sync(args: SyncArgs) -> Result<()> {
    let config = if args.check_only {
        ArchiveConfig::resolve_output_only(args.catalog, args.output_dir)?
    } else {
        ArchiveConfig::resolve(args.catalog, args.source_dir, args.output_dir)?
    };
    let records = catalog::load_catalog(&config.catalog_path, &IdentityHasher::default())?;
    info!(records = records.len(), catalog = %config.catalog_path.display(), "loaded catalog");

    let mut linter = lint::MetadataLinter::new(gate::for_mode(args.non_interactive));
    action::run_pass(&mut linter, &records)?;
    let mut detector = fuzzy::FuzzyDuplicateDetector::new();
    action::run_pass(&mut detector, &records)?;
    info!(
        relationship_warnings = linter.warning_count(),
        similarity_warnings = detector.warning_count(),
        "catalog checks finished"
    );

    if args.check_only {
        return Ok(());
    }

    config.ensure_dirs()?;
    let fetcher = tools::CommandFetcher::from_env()?;
    let transcoder = tools::CommandTranscoder::from_env()?;
    let mut blacklist = pipeline::Blacklist::default();

    let mut run_result = Ok(());
    for profile in &args.profile {
        let mut pass = pipeline::AcquisitionPipeline::new(
            *profile,
            &config.source_dir,
            &config.output_dir,
            &fetcher,
            &transcoder,
            &mut blacklist,
        );
        run_result = action::run_pass(&mut pass, &records);
        let stats = pass.stats;
        info!(
            profile = ?profile,
            skipped = stats.skipped,
            fetched = stats.fetched,
            fetch_failed = stats.fetch_failed,
            transcoded = stats.transcoded,
            "acquisition pass finished"
        );
        if run_result.is_err() {
            break;
        }
    }

    // Exported before any fatal error is surfaced, so the file reflects every
    // source that failed up to the abort point.
    if let Some(path) = &args.export_failed {
        blacklist
            .export_to(path)
            .with_context(|| format!("export failed sources to {}", path.display()))?;
        info!(sources = blacklist.len(), path = %path.display(), "exported failed sources");
    } else if !blacklist.is_empty() {
        warn!(sources = blacklist.len(), "some sources failed to fetch this run");
    }

    run_result
}

fn cmd_check(args: CheckArgs) -> Result<()> {
    let config = ArchiveConfig::resolve_output_only(args.catalog, args.output_dir)?;
    let hasher = if args.legacy_keys {
        IdentityHasher::legacy_source()
    } else {
        IdentityHasher::default()
    };
    let records = catalog::load_catalog(&config.catalog_path, &hasher)?;
    let listing = store::store_listing(&config.output_dir)?;

    let orphans = store::reconcile(&records, &listing);
    for orphan in &orphans {
        warn!(file = %orphan, "orphaned store file matches no publish-eligible record");
    }

    let meta_path = config.meta_path();
    let mut missing = Vec::new();
    if meta_path.is_file() {
        let published = publish::read_document(&meta_path)?;
        missing = store::missing_artifacts(&published, &config.output_dir);
        for file in &missing {
            warn!(file = %file, "published artifact missing from the store");
        }
    } else {
        error!(path = %meta_path.display(), "metadata document doesn't exist, skipping completeness check");
    }
    info!(
        store_files = listing.len(),
        orphans = orphans.len(),
        missing = missing.len(),
        "store check finished"
    );
    Ok(())
}

fn cmd_render(args: RenderArgs) -> Result<()> {
    let config = ArchiveConfig::resolve_output_only(args.catalog, args.output_dir)?;
    let records = catalog::load_catalog(&config.catalog_path, &IdentityHasher::default())?;
    let published = publish::render_published(&records, args.profile, &config::public_base_url());

    let meta_path = config.meta_path();
    if args.rotate && meta_path.is_file() {
        let previous = config.meta_previous_path();
        std::fs::rename(&meta_path, &previous)
            .with_context(|| format!("rotate {} to {}", meta_path.display(), previous.display()))?;
    }
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("create {}", config.output_dir.display()))?;
    publish::write_document(&meta_path, &published)?;
    info!(records = published.len(), path = %meta_path.display(), "wrote metadata document");
    Ok(())
}

fn cmd_diff(args: DiffArgs) -> Result<()> {
    let output_dir = config::resolve_output_dir(args.output_dir)?;
    let current_path = output_dir.join(config::META_CURRENT);
    let previous_path = output_dir.join(config::META_PREVIOUS);

    // A missing snapshot is reported and skipped; downstream state is left
    // untouched rather than producing a misleading full-catalog diff.
    let mut prerequisites_ok = true;
    if !previous_path.is_file() {
        error!(path = %previous_path.display(), "old metadata doesn't exist, skipping");
        prerequisites_ok = false;
    }
    if !current_path.is_file() {
        error!(path = %current_path.display(), "new metadata doesn't exist, skipping");
        prerequisites_ok = false;
    }
    if !prerequisites_ok {
        return Ok(());
    }

    let previous = publish::read_document(&previous_path)?;
    let current = publish::read_document(&current_path)?;
    let diff = snapshot::diff_snapshots(&previous, &current);
    write_diff_document(&output_dir.join(config::DIFF_DOCUMENT), &diff)?;
    Ok(())
}

fn write_diff_document(path: &Path, diff: &snapshot::DiffDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(diff).context("serialize diff document")?;
    std::fs::write(path, json)
        .with_context(|| format!("write diff document {}", path.display()))?;
    info!(
        added = diff.added.len(),
        removed = diff.removed.len(),
        path = %path.display(),
        "wrote diff document"
    );
    Ok(())
}
