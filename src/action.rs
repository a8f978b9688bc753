//! The filter+effect seam shared by every catalog pass.
//!
//! A pass declares which records it cares about and what it does to each one; the
//! driver walks the catalog in order and applies the effect where the filter
//! holds. Errors from `apply` abort the pass, which is how the fatal lint checks
//! and transcode failures stop a run.
use crate::catalog::ClipRecord;
use anyhow::Result;
use tracing::debug;

pub trait CatalogAction {
    fn name(&self) -> &'static str;

    fn matches(&self, record: &ClipRecord) -> bool;

    fn apply(&mut self, record: &ClipRecord) -> Result<()>;
}

/// Run one pass over the catalog in order.
pub fn run_pass<A: CatalogAction + ?Sized>(action: &mut A, records: &[ClipRecord]) -> Result<()> {
    for record in records {
        if !action.matches(record) {
            continue;
        }
        debug!(pass = action.name(), record = %record.describe(), "process");
        action.apply(record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_record;
    use anyhow::bail;

    struct EvenOnly {
        applied: Vec<String>,
        fail_on: Option<String>,
    }

    impl CatalogAction for EvenOnly {
        fn name(&self) -> &'static str {
            "even-only"
        }

        fn matches(&self, record: &ClipRecord) -> bool {
            record.source_id.len() % 2 == 0
        }

        fn apply(&mut self, record: &ClipRecord) -> Result<()> {
            if self.fail_on.as_deref() == Some(record.source_id.as_str()) {
                bail!("boom");
            }
            self.applied.push(record.source_id.clone());
            Ok(())
        }
    }

    #[test]
    fn driver_applies_only_matching_records_in_order() {
        let records = vec![
            test_record("aa", "One", "X"),
            test_record("bbb", "Two", "X"),
            test_record("cccc", "Three", "X"),
        ];
        let mut pass = EvenOnly { applied: Vec::new(), fail_on: None };
        run_pass(&mut pass, &records).expect("pass");
        assert_eq!(pass.applied, vec!["aa", "cccc"]);
    }

    #[test]
    fn driver_stops_on_the_first_error() {
        let records = vec![
            test_record("aa", "One", "X"),
            test_record("bb", "Two", "X"),
            test_record("cc", "Three", "X"),
        ];
        let mut pass = EvenOnly { applied: Vec::new(), fail_on: Some("bb".to_string()) };
        assert!(run_pass(&mut pass, &records).is_err());
        assert_eq!(pass.applied, vec!["aa"]);
    }
}
