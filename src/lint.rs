//! Catalog metadata lint pass.
//!
//! Two checks are fatal: incidental whitespace in any published string, and a
//! clip window that ends before it starts. The relationship check (one title,
//! two artists) only warns; an interactive operator can accept the new pairing,
//! which updates the map later records are measured against.
use crate::action::CatalogAction;
use crate::catalog::ClipRecord;
use crate::gate::ConfirmGate;
use anyhow::{bail, Result};
use std::collections::HashMap;
use tracing::warn;

pub struct MetadataLinter {
    gate: Box<dyn ConfirmGate>,
    /// title -> artist first seen (or last operator-accepted) for that title.
    /// Catalog order matters: "previously seen" is defined by walk order.
    title_artist: HashMap<String, String>,
    warning_count: usize,
}

impl MetadataLinter {
    pub fn new(gate: Box<dyn ConfirmGate>) -> Self {
        Self {
            gate,
            title_artist: HashMap::new(),
            warning_count: 0,
        }
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }
}

impl CatalogAction for MetadataLinter {
    fn name(&self) -> &'static str {
        "lint"
    }

    fn matches(&self, _record: &ClipRecord) -> bool {
        true
    }

    fn apply(&mut self, record: &ClipRecord) -> Result<()> {
        for (field, value) in [
            ("title", &record.title),
            ("artist", &record.artist),
            ("performer", &record.performer),
        ] {
            if value.trim() != value {
                bail!("whitespace around {field} of {}", record.describe());
            }
        }

        if let (Some(start), Some(end)) = (record.clip_start_secs(), record.clip_end_secs()) {
            if start > end {
                bail!(
                    "clip window {start}..{end} is inverted on {}",
                    record.describe()
                );
            }
        }

        match self.title_artist.get(&record.title) {
            Some(seen) if seen != &record.artist => {
                warn!(
                    title = %record.title,
                    seen_artist = %seen,
                    new_artist = %record.artist,
                    record = %record.describe(),
                    "inconsistent title/artist relationship"
                );
                self.warning_count += 1;
                let prompt = format!(
                    "accept '{}' by '{}' (previously '{}')?",
                    record.title, record.artist, seen
                );
                if self.gate.confirm(&prompt) {
                    self.title_artist
                        .insert(record.title.clone(), record.artist.clone());
                }
            }
            Some(_) => {}
            None => {
                self.title_artist
                    .insert(record.title.clone(), record.artist.clone());
            }
        }
        Ok(())
    }
}
