//! Near-duplicate detection for catalog strings.
//!
//! Catches typos that the exact-match lint cannot: a new title, artist token, or
//! performer token that sits above the similarity threshold against an already
//! seen string is flagged with both records named. The detector only flags; it
//! never merges or rewrites anything. Quadratic in distinct strings per family,
//! which is fine for catalogs in the low thousands.
use crate::action::CatalogAction;
use crate::catalog::ClipRecord;
use anyhow::Result;
use tracing::warn;

/// Normalized Levenshtein ratio strictly above this flags a pair.
pub const SIMILARITY_THRESHOLD: f64 = 0.75;

struct Family {
    label: &'static str,
    /// Distinct strings seen so far, each with the record that introduced it.
    seen: Vec<(String, String)>,
}

impl Family {
    fn new(label: &'static str) -> Self {
        Self { label, seen: Vec::new() }
    }

    fn observe(&mut self, value: &str, record: &ClipRecord) -> usize {
        if value.is_empty() || self.seen.iter().any(|(seen, _)| seen == value) {
            return 0;
        }
        let mut warnings = 0;
        for (seen, owner) in &self.seen {
            let ratio = strsim::normalized_levenshtein(value, seen);
            if ratio > SIMILARITY_THRESHOLD {
                warn!(
                    family = self.label,
                    new = %value,
                    seen = %seen,
                    new_record = %record.describe(),
                    seen_record = %owner,
                    ratio,
                    "suspiciously similar metadata strings"
                );
                warnings += 1;
            }
        }
        self.seen.push((value.to_string(), record.describe()));
        warnings
    }
}

pub struct FuzzyDuplicateDetector {
    titles: Family,
    artists: Family,
    performers: Family,
    warning_count: usize,
}

impl Default for FuzzyDuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyDuplicateDetector {
    pub fn new() -> Self {
        Self {
            titles: Family::new("title"),
            artists: Family::new("artist"),
            performers: Family::new("performer"),
            warning_count: 0,
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }
}

impl CatalogAction for FuzzyDuplicateDetector {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn matches(&self, _record: &ClipRecord) -> bool {
        true
    }

    fn apply(&mut self, record: &ClipRecord) -> Result<()> {
        self.warning_count += self.titles.observe(&record.title, record);
        // Artist and performer cells hold comma-separated credit lists; each
        // token is compared within its own family.
        for token in record.artist.split(',') {
            self.warning_count += self.artists.observe(token.trim(), record);
        }
        for token in record.performer.split(',') {
            self.warning_count += self.performers.observe(token.trim(), record);
        }
        Ok(())
    }
}
