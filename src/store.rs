//! Output store reconciliation.
//!
//! The store is a flat directory of `{identityKey}.{ext}` artifacts plus the
//! published metadata documents. Reconciliation compares the key set implied by
//! the publish-eligible catalog records against the store listing and reports
//! mismatches; it never deletes anything.
use crate::catalog::ClipRecord;
use crate::publish::PublishedRecord;
use crate::snapshot::file_name_from_url;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// One media file in the output store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub file_name: String,
    /// Filename stem, expected to equal some record's identity key.
    pub stem: String,
}

/// List media artifacts in the store. Metadata documents (`*.json`), download
/// sentinels and dotfiles are not artifacts and are left out.
pub fn store_listing(output_dir: &Path) -> Result<Vec<StoreEntry>> {
    let mut entries = Vec::new();
    if !output_dir.is_dir() {
        return Ok(entries);
    }
    for entry in fs::read_dir(output_dir)
        .with_context(|| format!("read store {}", output_dir.display()))?
    {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.starts_with('.')
            || file_name.ends_with(".json")
            || file_name.ends_with(".part")
        {
            continue;
        }
        let stem = file_name
            .split_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&file_name)
            .to_string();
        entries.push(StoreEntry { file_name, stem });
    }
    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(entries)
}

/// Report store files whose stem matches no publish-eligible record's key.
/// Pure given its inputs; each orphan is reported exactly once.
pub fn reconcile(records: &[ClipRecord], listing: &[StoreEntry]) -> Vec<String> {
    let keys: BTreeSet<&str> = records
        .iter()
        .filter(|record| record.publish_eligible())
        .map(|record| record.identity_key.as_str())
        .collect();
    listing
        .iter()
        .filter(|entry| !keys.contains(entry.stem.as_str()))
        .map(|entry| entry.file_name.clone())
        .collect()
}

/// Published URLs whose artifact is missing from the store (the inverse check:
/// every file the document promises must exist).
pub fn missing_artifacts(published: &[PublishedRecord], output_dir: &Path) -> Vec<String> {
    let mut missing = Vec::new();
    for record in published {
        let file_name = file_name_from_url(&record.url);
        if file_name.is_empty() {
            continue;
        }
        if !output_dir.join(&file_name).is_file() {
            missing.push(file_name);
        }
    }
    missing.sort();
    missing.dedup();
    missing
}
