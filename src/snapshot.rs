//! Snapshot diffing between two published metadata documents.
//!
//! Diffing is keyed, not content-sensitive: a published record is identified by
//! the filename stem of its artifact URL (the identity key), and a record whose
//! key is unchanged counts as neither added nor removed even if its other fields
//! were edited. Both snapshots are materialized fully before comparison.
use crate::publish::PublishedRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Changelog between two snapshot generations.
#[derive(Debug, Serialize, Deserialize)]
pub struct DiffDocument {
    pub added: Vec<PublishedRecord>,
    pub removed: Vec<PublishedRecord>,
    /// Generation timestamp, RFC 3339.
    pub last_updated: String,
}

/// Identity key of a published record: the stem of its URL's filename.
pub fn key_from_url(url: &str) -> String {
    let file_name = file_name_from_url(url);
    file_name
        .split_once('.')
        .map(|(stem, _)| stem.to_string())
        .unwrap_or(file_name)
}

/// Last path segment of a URL, query and fragment stripped.
pub fn file_name_from_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    without_query
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}

/// Key-based set difference: `added = current - previous`,
/// `removed = previous - current`. Order within each list follows the source
/// document; duplicate keys within one document collapse to their first entry.
pub fn diff_snapshots(previous: &[PublishedRecord], current: &[PublishedRecord]) -> DiffDocument {
    let previous_keys: BTreeSet<String> =
        previous.iter().map(|record| key_from_url(&record.url)).collect();
    let current_keys: BTreeSet<String> =
        current.iter().map(|record| key_from_url(&record.url)).collect();

    DiffDocument {
        added: pick_by_keys(current, &previous_keys),
        removed: pick_by_keys(previous, &current_keys),
        last_updated: Utc::now().to_rfc3339(),
    }
}

fn pick_by_keys(records: &[PublishedRecord], exclude: &BTreeSet<String>) -> Vec<PublishedRecord> {
    let mut taken = BTreeSet::new();
    records
        .iter()
        .filter(|record| {
            let key = key_from_url(&record.url);
            !exclude.contains(&key) && taken.insert(key)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published(key: &str, title: &str) -> PublishedRecord {
        PublishedRecord {
            url: format!("https://cdn.example/assets/{key}.ogg"),
            datetime: "2024-01-01T00:00:00+09:00".to_string(),
            title: title.to_string(),
            artist: "Artist".to_string(),
            performer: String::new(),
            status: 1,
            source: "https://www.youtube.com/watch?v=x".to_string(),
        }
    }

    #[test]
    fn url_key_extraction_strips_path_query_and_extension() {
        assert_eq!(key_from_url("https://cdn.example/a/b/00ff.ogg?x=1#frag"), "00ff");
        assert_eq!(key_from_url("00ff.ogg"), "00ff");
        assert_eq!(file_name_from_url("https://cdn.example/a/00ff.ogg"), "00ff.ogg");
    }

    #[test]
    fn added_and_removed_are_key_set_differences() {
        let previous = vec![published("aaaa", "A"), published("bbbb", "B")];
        let current = vec![published("bbbb", "B"), published("cccc", "C")];
        let diff = diff_snapshots(&previous, &current);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(key_from_url(&diff.added[0].url), "cccc");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(key_from_url(&diff.removed[0].url), "aaaa");
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let snapshot = vec![published("aaaa", "A"), published("bbbb", "B")];
        let diff = diff_snapshots(&snapshot, &snapshot);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert!(!diff.last_updated.is_empty());
    }

    #[test]
    fn metadata_edits_under_a_stable_key_are_invisible() {
        let previous = vec![published("aaaa", "Old Title")];
        let current = vec![published("aaaa", "New Title")];
        let diff = diff_snapshots(&previous, &current);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn duplicate_keys_within_a_snapshot_collapse() {
        let previous = vec![];
        let current = vec![published("aaaa", "A"), published("aaaa", "A again")];
        let diff = diff_snapshots(&previous, &current);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].title, "A");
    }
}
