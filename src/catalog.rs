//! Catalog records and CSV loading.
//!
//! A catalog row describes one clip of one source video. Records are constructed
//! once per load, get their identity key attached immediately, and are never
//! mutated afterwards: everything downstream reads records and produces actions.
use crate::identity::{IdentityHasher, KeyFields};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Status bit marking a draft entry, excluded from the published document.
pub const STATUS_DRAFT: u32 = 1 << 1;

/// Status bit marking a member-only source; never fetched or transcoded.
pub const STATUS_MEMBER_ONLY: u32 = 1 << 3;

/// Provider of the source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceType {
    Youtube,
    Twitter,
    Bilibili,
}

impl SourceType {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "YOUTUBE" => Ok(SourceType::Youtube),
            "TWITTER" => Ok(SourceType::Twitter),
            "BILIBILI" => Ok(SourceType::Bilibili),
            other => Err(anyhow!("unknown source type: {other}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Youtube => "YOUTUBE",
            SourceType::Twitter => "TWITTER",
            SourceType::Bilibili => "BILIBILI",
        }
    }

    /// Public watch URL for a video id on this provider.
    pub fn watch_url(&self, source_id: &str) -> String {
        match self {
            SourceType::Youtube => format!("https://www.youtube.com/watch?v={source_id}"),
            SourceType::Twitter => format!("https://twitter.com/i/status/{source_id}"),
            SourceType::Bilibili => format!("https://www.bilibili.com/video/{source_id}"),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw CSV row; header names follow the catalog file, older exports used
/// `datetime`/`done` for the first and status columns.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(alias = "datetime")]
    date: String,
    video_type: String,
    video_id: String,
    #[serde(default)]
    clip_start: String,
    #[serde(default)]
    clip_end: String,
    #[serde(default, alias = "done")]
    status: String,
    title: String,
    artist: String,
    performer: String,
}

/// One immutable catalog entry with its derived identity key.
#[derive(Debug, Clone)]
pub struct ClipRecord {
    pub publish_date: String,
    pub source_type: SourceType,
    pub source_id: String,
    /// Trim points in decimal seconds, kept in the catalog's canonical text form
    /// because they feed both the identity hash and the transcoder verbatim.
    pub clip_start: Option<String>,
    pub clip_end: Option<String>,
    /// Visibility bitmask; zero means not ready for transcoding or publishing.
    pub status: u32,
    pub title: String,
    pub artist: String,
    pub performer: String,
    pub identity_key: String,
}

impl ClipRecord {
    fn from_row(row: CatalogRow, hasher: &IdentityHasher) -> Result<Self> {
        let source_type = SourceType::parse(&row.video_type)
            .with_context(|| format!("record {}", row.video_id))?;
        let status = parse_status(&row.status)
            .with_context(|| format!("record {}", row.video_id))?;
        let clip_start = optional_seconds(&row.clip_start)
            .with_context(|| format!("clip_start of record {}", row.video_id))?;
        let clip_end = optional_seconds(&row.clip_end)
            .with_context(|| format!("clip_end of record {}", row.video_id))?;

        let identity_key = hasher.key(&KeyFields {
            source_type: source_type.as_str(),
            source_id: &row.video_id,
            clip_start: clip_start.as_deref().unwrap_or(""),
            clip_end: clip_end.as_deref().unwrap_or(""),
            title: &row.title,
            artist: &row.artist,
            performer: &row.performer,
        });

        Ok(ClipRecord {
            publish_date: row.date,
            source_type,
            source_id: row.video_id,
            clip_start,
            clip_end,
            status,
            title: row.title,
            artist: row.artist,
            performer: row.performer,
            identity_key,
        })
    }

    /// True when the record may be transcoded at all.
    pub fn ready(&self) -> bool {
        self.status != 0
    }

    pub fn member_only(&self) -> bool {
        self.status & STATUS_MEMBER_ONLY != 0
    }

    /// Visibility predicate for the published metadata document: ready, not a
    /// draft, not member-only. The store reconciler keys off the same predicate.
    pub fn publish_eligible(&self) -> bool {
        self.ready() && self.status & (STATUS_DRAFT | STATUS_MEMBER_ONLY) == 0
    }

    pub fn clip_start_secs(&self) -> Option<f64> {
        self.clip_start.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn clip_end_secs(&self) -> Option<f64> {
        self.clip_end.as_deref().and_then(|s| s.parse().ok())
    }

    /// Short display form for log lines and warnings.
    pub fn describe(&self) -> String {
        format!("{}:{} '{}' ({})", self.source_type, self.source_id, self.title, self.identity_key)
    }
}

fn parse_status(raw: &str) -> Result<u32> {
    match raw.trim() {
        "" | "FALSE" => Ok(0),
        "TRUE" => Ok(1),
        other => other
            .parse::<u32>()
            .map_err(|_| anyhow!("unparseable status value: {other}")),
    }
}

fn optional_seconds(raw: &str) -> Result<Option<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| anyhow!("not a decimal seconds value: {trimmed}"))?;
    Ok(Some(trimmed.to_string()))
}

/// Load the catalog in file order and attach identity keys.
pub fn load_catalog(path: &Path, hasher: &IdentityHasher) -> Result<Vec<ClipRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open catalog {}", path.display()))?;
    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<CatalogRow>().enumerate() {
        let row = row.with_context(|| format!("parse catalog row {}", index + 2))?;
        records.push(ClipRecord::from_row(row, hasher)?);
    }
    Ok(records)
}

#[cfg(test)]
pub(crate) fn test_record(source_id: &str, title: &str, artist: &str) -> ClipRecord {
    let hasher = IdentityHasher::default();
    let identity_key = hasher.key(&KeyFields {
        source_type: "YOUTUBE",
        source_id,
        clip_start: "",
        clip_end: "",
        title,
        artist,
        performer: "",
    });
    ClipRecord {
        publish_date: "2024-01-01T00:00:00+09:00".to_string(),
        source_type: SourceType::Youtube,
        source_id: source_id.to_string(),
        clip_start: None,
        clip_end: None,
        status: 1,
        title: title.to_string(),
        artist: artist.to_string(),
        performer: String::new(),
        identity_key,
    }
}
