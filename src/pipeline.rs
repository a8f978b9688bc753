//! Acquisition pipeline: ensure source media exists locally, then ensure the
//! derived artifact exists in the output store.
//!
//! All state is re-derived from filesystem presence on every run, so re-running
//! against a populated store performs no fetch or transcode calls. The only
//! carried state is the run-scoped blacklist of sources that failed to fetch;
//! records sharing a blacklisted source are skipped instead of retried, and the
//! list can be exported at end of run. A transcode failure is different: it
//! means the local tooling is broken, so it aborts the run instead of being
//! isolated to one source.
use crate::action::CatalogAction;
use crate::catalog::{ClipRecord, SourceType};
use crate::config::{artifact_path, source_media_path, MediaProfile};
use crate::tools::{MediaFetcher, TranscodeJob, Transcoder};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed poll interval while another fetch of the same source is in flight.
pub const SENTINEL_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Terminal state of one record within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    /// Source acquisition failed; the source is blacklisted for this run.
    FetchFailed,
    /// Source present (fetched or pre-existing) but the record is not ready
    /// for transcoding.
    SourceReady,
    Transcoded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MemberOnly,
    EmptySource,
    ArtifactPresent,
    Blacklisted,
}

/// Run-scoped set of sources that failed acquisition.
#[derive(Debug, Default)]
pub struct Blacklist {
    entries: BTreeSet<(SourceType, String)>,
}

impl Blacklist {
    pub fn insert(&mut self, source_type: SourceType, source_id: &str) {
        self.entries.insert((source_type, source_id.to_string()));
    }

    pub fn contains(&self, source_type: SourceType, source_id: &str) -> bool {
        self.entries
            .contains(&(source_type, source_id.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Flat `sourceType:sourceId` lines for external persistence. Each failed
    /// source appears exactly once no matter how many records referenced it.
    pub fn export_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(source_type, source_id)| format!("{source_type}:{source_id}"))
            .collect()
    }

    pub fn export_to(&self, path: &Path) -> Result<()> {
        let mut text = self.export_lines().join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(path, text).with_context(|| format!("write blacklist {}", path.display()))?;
        Ok(())
    }
}

/// Counters reported at end of pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    pub skipped: usize,
    pub fetched: usize,
    pub fetch_failed: usize,
    pub transcoded: usize,
}

pub struct AcquisitionPipeline<'a, F, T> {
    profile: MediaProfile,
    source_dir: &'a Path,
    output_dir: &'a Path,
    fetcher: &'a F,
    transcoder: &'a T,
    blacklist: &'a mut Blacklist,
    poll_interval: Duration,
    pub stats: PassStats,
}

impl<'a, F: MediaFetcher, T: Transcoder> AcquisitionPipeline<'a, F, T> {
    pub fn new(
        profile: MediaProfile,
        source_dir: &'a Path,
        output_dir: &'a Path,
        fetcher: &'a F,
        transcoder: &'a T,
        blacklist: &'a mut Blacklist,
    ) -> Self {
        Self {
            profile,
            source_dir,
            output_dir,
            fetcher,
            transcoder,
            blacklist,
            poll_interval: SENTINEL_POLL_INTERVAL,
            stats: PassStats::default(),
        }
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn process(&mut self, record: &ClipRecord) -> Result<Outcome> {
        let artifact = artifact_path(self.output_dir, &record.identity_key, self.profile);
        if artifact.exists() {
            debug!(artifact = %artifact.display(), "artifact present, skipping");
            return Ok(Outcome::Skipped(SkipReason::ArtifactPresent));
        }

        if self
            .blacklist
            .contains(record.source_type, &record.source_id)
        {
            debug!(record = %record.describe(), "source blacklisted earlier in this run");
            return Ok(Outcome::Skipped(SkipReason::Blacklisted));
        }

        let source = source_media_path(self.source_dir, &record.source_id, self.profile);
        self.wait_for_concurrent_fetch(&source);

        if !source.exists() {
            info!(source = %source.display(), record = %record.describe(), "download source");
            if let Err(err) = self.fetcher.fetch(
                record.source_type,
                &record.source_id,
                self.profile.format_code(),
                &source,
            ) {
                warn!(
                    record = %record.describe(),
                    error = format!("{err:#}"),
                    "fetch failed, blacklisting source for this run"
                );
                self.blacklist.insert(record.source_type, &record.source_id);
                return Ok(Outcome::FetchFailed);
            }
        }

        if !record.ready() {
            return Ok(Outcome::SourceReady);
        }

        info!(artifact = %artifact.display(), record = %record.describe(), "transcode clip");
        self.transcoder
            .transcode(&TranscodeJob {
                source: &source,
                output: &artifact,
                trim_start: record.clip_start.as_deref(),
                trim_end: record.clip_end.as_deref(),
                title: &record.title,
                artist: &record.artist,
                performer: &record.performer,
            })
            .with_context(|| format!("transcode {}", record.describe()))?;
        Ok(Outcome::Transcoded)
    }

    /// Block while a partial-download sentinel for this source exists. Another
    /// process (or an earlier record of the same source) may be mid-fetch; the
    /// loop polls on a fixed interval and has no timeout, so a stale sentinel
    /// parks the run until an operator removes it.
    fn wait_for_concurrent_fetch(&self, source: &Path) {
        let sentinel = partial_sentinel(source);
        while sentinel.exists() {
            info!(sentinel = %sentinel.display(), "source download in progress, waiting");
            std::thread::sleep(self.poll_interval);
        }
    }
}

/// Sentinel path a fetch in progress leaves next to its destination.
pub fn partial_sentinel(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

impl<F: MediaFetcher, T: Transcoder> CatalogAction for AcquisitionPipeline<'_, F, T> {
    fn name(&self) -> &'static str {
        "acquire"
    }

    fn matches(&self, record: &ClipRecord) -> bool {
        !record.member_only() && !record.source_id.is_empty()
    }

    fn apply(&mut self, record: &ClipRecord) -> Result<()> {
        match self.process(record)? {
            Outcome::Skipped(_) => self.stats.skipped += 1,
            Outcome::FetchFailed => self.stats.fetch_failed += 1,
            Outcome::SourceReady => self.stats.fetched += 1,
            Outcome::Transcoded => self.stats.transcoded += 1,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::run_pass;
    use crate::catalog::{test_record, STATUS_MEMBER_ONLY};
    use anyhow::bail;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeFetcher {
        calls: RefCell<Vec<String>>,
        fail_ids: Vec<String>,
    }

    impl MediaFetcher for FakeFetcher {
        fn fetch(
            &self,
            _source_type: SourceType,
            source_id: &str,
            _format_code: u32,
            dest: &Path,
        ) -> Result<()> {
            self.calls.borrow_mut().push(source_id.to_string());
            if self.fail_ids.iter().any(|id| id == source_id) {
                bail!("simulated fetch failure");
            }
            fs::write(dest, b"source").expect("write fake source");
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTranscoder {
        calls: RefCell<Vec<PathBuf>>,
        fail: bool,
    }

    impl Transcoder for FakeTranscoder {
        fn transcode(&self, job: &TranscodeJob<'_>) -> Result<()> {
            self.calls.borrow_mut().push(job.output.to_path_buf());
            if self.fail {
                bail!("simulated transcode failure");
            }
            fs::write(job.output, b"artifact").expect("write fake artifact");
            Ok(())
        }
    }

    struct Fixture {
        _root: TempDir,
        source_dir: PathBuf,
        output_dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().expect("tempdir");
            let source_dir = root.path().join("sources");
            let output_dir = root.path().join("store");
            fs::create_dir_all(&source_dir).expect("mkdir");
            fs::create_dir_all(&output_dir).expect("mkdir");
            Self { _root: root, source_dir, output_dir }
        }

        fn run(
            &self,
            records: &[ClipRecord],
            fetcher: &FakeFetcher,
            transcoder: &FakeTranscoder,
            blacklist: &mut Blacklist,
        ) -> Result<PassStats> {
            let mut pipeline = AcquisitionPipeline::new(
                MediaProfile::AudioOpus,
                &self.source_dir,
                &self.output_dir,
                fetcher,
                transcoder,
                blacklist,
            );
            run_pass(&mut pipeline, records)?;
            Ok(pipeline.stats)
        }
    }

    #[test]
    fn fetches_and_transcodes_a_ready_record() {
        let fixture = Fixture::new();
        let records = vec![test_record("v1", "Song", "Artist")];
        let fetcher = FakeFetcher::default();
        let transcoder = FakeTranscoder::default();
        let mut blacklist = Blacklist::default();
        let stats = fixture
            .run(&records, &fetcher, &transcoder, &mut blacklist)
            .expect("run");
        assert_eq!(stats.transcoded, 1);
        let artifact =
            artifact_path(&fixture.output_dir, &records[0].identity_key, MediaProfile::AudioOpus);
        assert!(artifact.is_file());
    }

    #[test]
    fn second_run_is_idempotent() {
        let fixture = Fixture::new();
        let records = vec![
            test_record("v1", "Song A", "Artist"),
            test_record("v2", "Song B", "Artist"),
        ];
        let fetcher = FakeFetcher::default();
        let transcoder = FakeTranscoder::default();
        let mut blacklist = Blacklist::default();
        fixture
            .run(&records, &fetcher, &transcoder, &mut blacklist)
            .expect("first run");
        assert_eq!(fetcher.calls.borrow().len(), 2);
        assert_eq!(transcoder.calls.borrow().len(), 2);

        let fetcher2 = FakeFetcher::default();
        let transcoder2 = FakeTranscoder::default();
        let mut blacklist2 = Blacklist::default();
        let stats = fixture
            .run(&records, &fetcher2, &transcoder2, &mut blacklist2)
            .expect("second run");
        assert_eq!(fetcher2.calls.borrow().len(), 0);
        assert_eq!(transcoder2.calls.borrow().len(), 0);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn fetch_failure_blacklists_the_source_for_the_whole_run() {
        let fixture = Fixture::new();
        // Three records, two of them sharing the failing source.
        let records = vec![
            test_record("bad", "Song A", "Artist"),
            test_record("ok", "Song B", "Artist"),
            test_record("bad", "Song C", "Artist"),
        ];
        let fetcher = FakeFetcher { fail_ids: vec!["bad".to_string()], ..Default::default() };
        let transcoder = FakeTranscoder::default();
        let mut blacklist = Blacklist::default();
        let stats = fixture
            .run(&records, &fetcher, &transcoder, &mut blacklist)
            .expect("run continues past fetch failures");
        assert_eq!(stats.fetch_failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.transcoded, 1);
        // Only the first record of the failing source reaches the fetcher.
        assert_eq!(*fetcher.calls.borrow(), ["bad", "ok"]);
        assert_eq!(blacklist.export_lines(), vec!["YOUTUBE:bad".to_string()]);
    }

    #[test]
    fn transcode_failure_aborts_the_run() {
        let fixture = Fixture::new();
        let records = vec![
            test_record("v1", "Song A", "Artist"),
            test_record("v2", "Song B", "Artist"),
        ];
        let fetcher = FakeFetcher::default();
        let transcoder = FakeTranscoder { fail: true, ..Default::default() };
        let mut blacklist = Blacklist::default();
        let result = fixture.run(&records, &fetcher, &transcoder, &mut blacklist);
        assert!(result.is_err());
        assert_eq!(transcoder.calls.borrow().len(), 1);
        assert!(blacklist.is_empty());
    }

    #[test]
    fn member_only_and_sourceless_records_never_match() {
        let fixture = Fixture::new();
        let mut member_only = test_record("v1", "Song A", "Artist");
        member_only.status |= STATUS_MEMBER_ONLY;
        let mut sourceless = test_record("", "Song B", "Artist");
        sourceless.source_id.clear();
        let fetcher = FakeFetcher::default();
        let transcoder = FakeTranscoder::default();
        let mut blacklist = Blacklist::default();
        let stats = fixture
            .run(&[member_only, sourceless], &fetcher, &transcoder, &mut blacklist)
            .expect("run");
        assert_eq!(fetcher.calls.borrow().len(), 0);
        assert_eq!(stats.transcoded, 0);
    }

    #[test]
    fn unready_record_fetches_but_does_not_transcode() {
        let fixture = Fixture::new();
        let mut record = test_record("v1", "Song", "Artist");
        record.status = 0;
        let fetcher = FakeFetcher::default();
        let transcoder = FakeTranscoder::default();
        let mut blacklist = Blacklist::default();
        let stats = fixture
            .run(&[record], &fetcher, &transcoder, &mut blacklist)
            .expect("run");
        assert_eq!(fetcher.calls.borrow().len(), 1);
        assert_eq!(transcoder.calls.borrow().len(), 0);
        assert_eq!(stats.fetched, 1);
    }

    #[test]
    fn waits_for_a_partial_download_sentinel_to_clear() {
        let fixture = Fixture::new();
        let record = test_record("v1", "Song", "Artist");
        let source = source_media_path(&fixture.source_dir, "v1", MediaProfile::AudioOpus);
        fs::write(&source, b"source").expect("pre-seed source");
        let sentinel = partial_sentinel(&source);
        fs::write(&sentinel, b"").expect("create sentinel");

        let remover = {
            let sentinel = sentinel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                fs::remove_file(&sentinel).expect("remove sentinel");
            })
        };

        let fetcher = FakeFetcher::default();
        let transcoder = FakeTranscoder::default();
        let mut blacklist = Blacklist::default();
        let mut pipeline = AcquisitionPipeline::new(
            MediaProfile::AudioOpus,
            &fixture.source_dir,
            &fixture.output_dir,
            &fetcher,
            &transcoder,
            &mut blacklist,
        )
        .with_poll_interval(Duration::from_millis(5));
        run_pass(&mut pipeline, std::slice::from_ref(&record)).expect("run");
        remover.join().expect("join remover");

        // Source was pre-seeded, so after the wait nothing is fetched.
        assert_eq!(fetcher.calls.borrow().len(), 0);
        assert_eq!(transcoder.calls.borrow().len(), 1);
    }

    #[test]
    fn blacklist_export_writes_one_line_per_source() {
        let mut blacklist = Blacklist::default();
        blacklist.insert(SourceType::Youtube, "v1");
        blacklist.insert(SourceType::Youtube, "v1");
        blacklist.insert(SourceType::Bilibili, "BV1");
        assert_eq!(blacklist.len(), 2);
        let file = TempDir::new().expect("tempdir");
        let path = file.path().join("failed.txt");
        blacklist.export_to(&path).expect("export");
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(text, "BILIBILI:BV1\nYOUTUBE:v1\n");
    }
}
