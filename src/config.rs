//! Run configuration: directory layout and media profiles.
//!
//! Paths resolve from CLI flags first, then environment variables (a `.env` file
//! is loaded at startup), so cron jobs and interactive use share one setup.
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use std::env;
use std::path::{Path, PathBuf};

pub const CATALOG_ENV: &str = "CATALOG_PATH";
pub const SOURCE_DIR_ENV: &str = "SOURCE_DIR";
pub const OUTPUT_DIR_ENV: &str = "OUTPUT_DIR";
pub const BASE_URL_ENV: &str = "PUBLIC_BASE_URL";

/// Published metadata document names inside the output store.
pub const META_CURRENT: &str = "meta.json";
pub const META_PREVIOUS: &str = "meta.last.json";
pub const DIFF_DOCUMENT: &str = "diff.json";

/// Encoding profile: pairs a fetch format selector with the container extensions
/// on both sides of the transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaProfile {
    /// Opus audio (format 251), webm source, ogg artifact.
    AudioOpus,
    /// AAC audio (format 140), mp4 source, m4a artifact.
    AudioAac,
}

impl MediaProfile {
    pub fn format_code(&self) -> u32 {
        match self {
            MediaProfile::AudioOpus => 251,
            MediaProfile::AudioAac => 140,
        }
    }

    pub fn source_ext(&self) -> &'static str {
        match self {
            MediaProfile::AudioOpus => "webm",
            MediaProfile::AudioAac => "mp4",
        }
    }

    pub fn output_ext(&self) -> &'static str {
        match self {
            MediaProfile::AudioOpus => "ogg",
            MediaProfile::AudioAac => "m4a",
        }
    }
}

/// Resolved filesystem layout for one run.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub catalog_path: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl ArchiveConfig {
    pub fn resolve(
        catalog: Option<PathBuf>,
        source_dir: Option<PathBuf>,
        output_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let catalog_path = resolve_path(catalog, CATALOG_ENV)?;
        let source_dir = resolve_path(source_dir, SOURCE_DIR_ENV)?;
        let output_dir = resolve_path(output_dir, OUTPUT_DIR_ENV)?;
        if !catalog_path.is_file() {
            return Err(anyhow!("catalog not found at {}", catalog_path.display()));
        }
        Ok(ArchiveConfig {
            catalog_path,
            source_dir,
            output_dir,
        })
    }

    /// Layout for commands that never touch the source directory.
    pub fn resolve_output_only(catalog: Option<PathBuf>, output_dir: Option<PathBuf>) -> Result<Self> {
        let catalog_path = resolve_path(catalog, CATALOG_ENV)?;
        let output_dir = resolve_path(output_dir, OUTPUT_DIR_ENV)?;
        if !catalog_path.is_file() {
            return Err(anyhow!("catalog not found at {}", catalog_path.display()));
        }
        Ok(ArchiveConfig {
            catalog_path,
            source_dir: PathBuf::new(),
            output_dir,
        })
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.source_dir, &self.output_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn meta_path(&self) -> PathBuf {
        self.output_dir.join(META_CURRENT)
    }

    pub fn meta_previous_path(&self) -> PathBuf {
        self.output_dir.join(META_PREVIOUS)
    }

    pub fn diff_path(&self) -> PathBuf {
        self.output_dir.join(DIFF_DOCUMENT)
    }
}

/// Resolve just the output store directory (for commands that need nothing else).
pub fn resolve_output_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    resolve_path(flag, OUTPUT_DIR_ENV)
}

fn resolve_path(flag: Option<PathBuf>, env_key: &str) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    match env::var_os(env_key) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(anyhow!("missing {env_key} (flag or environment)")),
    }
}

/// Base URL prefix for published artifact links; empty means bare filenames.
pub fn public_base_url() -> String {
    env::var(BASE_URL_ENV)
        .map(|value| value.trim_end_matches('/').to_string())
        .unwrap_or_default()
}

/// Join the base URL with an artifact filename.
pub fn artifact_url(base_url: &str, file_name: &str) -> String {
    if base_url.is_empty() {
        file_name.to_string()
    } else {
        format!("{base_url}/{file_name}")
    }
}

/// Expected artifact path for an identity key under a profile.
pub fn artifact_path(output_dir: &Path, identity_key: &str, profile: MediaProfile) -> PathBuf {
    output_dir.join(format!("{identity_key}.{}", profile.output_ext()))
}

/// Expected local source media path for a record under a profile.
pub fn source_media_path(source_dir: &Path, source_id: &str, profile: MediaProfile) -> PathBuf {
    source_dir.join(format!(
        "{source_id}.{}.{}",
        profile.format_code(),
        profile.source_ext()
    ))
}
