//! Rendering of the published metadata document.
//!
//! The document is a JSON array of the publish-visible slice of the catalog:
//! artifact URL, publish datetime, display metadata, status, and a source link
//! back to the original video (with a `?t=` jump when the clip has a start
//! trim). The snapshot diff engine consumes two generations of this document.
use crate::catalog::ClipRecord;
use crate::config::{artifact_url, MediaProfile};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One entry of the published metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedRecord {
    pub url: String,
    pub datetime: String,
    pub title: String,
    pub artist: String,
    pub performer: String,
    pub status: u32,
    pub source: String,
}

/// Source link back to the original video.
pub fn source_link(record: &ClipRecord) -> String {
    let mut url = record.source_type.watch_url(&record.source_id);
    if let Some(start) = record.clip_start.as_deref() {
        url.push_str(&format!("?t={start}"));
    }
    url
}

/// Render the publish-visible records in catalog order.
pub fn render_published(
    records: &[ClipRecord],
    profile: MediaProfile,
    base_url: &str,
) -> Vec<PublishedRecord> {
    records
        .iter()
        .filter(|record| record.publish_eligible())
        .map(|record| PublishedRecord {
            url: artifact_url(
                base_url,
                &format!("{}.{}", record.identity_key, profile.output_ext()),
            ),
            datetime: record.publish_date.clone(),
            title: record.title.clone(),
            artist: record.artist.clone(),
            performer: record.performer.clone(),
            status: record.status,
            source: source_link(record),
        })
        .collect()
}

pub fn read_document(path: &Path) -> Result<Vec<PublishedRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("read metadata document {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parse metadata document {}", path.display()))
}

pub fn write_document(path: &Path, records: &[PublishedRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("serialize metadata document")?;
    fs::write(path, json)
        .with_context(|| format!("write metadata document {}", path.display()))?;
    Ok(())
}
