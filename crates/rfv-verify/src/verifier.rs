use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rfv_store::ObjectStore;
use rfv_types::{KeyPrefix, RelativePath};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::comparator::DigestComparator;
use crate::config::VerifierConfig;
use crate::enumerator::PathEnumerator;
use crate::error::{VerifyError, VerifyResult};
use crate::fetcher::{ContentFetcher, FetchOutcome};
use crate::lister::ObjectLister;
use crate::phase::VerifyPhase;
use crate::report::{preview, ContentMismatch, VerificationReport};

/// Outcome of comparing one shared path.
enum FileOutcome {
    Match,
    Mismatch(ContentMismatch),
    Vanished(RelativePath),
}

/// Everything one content-comparison task needs, detached from the verifier.
#[derive(Clone)]
struct CompareJob {
    fetcher: ContentFetcher,
    comparator: DigestComparator,
    local_root: PathBuf,
    bucket: String,
    prefix: KeyPrefix,
    preview_bytes: usize,
}

impl CompareJob {
    async fn run(self, path: RelativePath) -> VerifyResult<FileOutcome> {
        let data = match self.fetcher.fetch(&self.bucket, &self.prefix, &path).await? {
            FetchOutcome::Found(data) => data,
            FetchOutcome::NotFound => {
                warn!(path = %path, "object listed but not found on fetch");
                return Ok(FileOutcome::Vanished(path));
            }
        };

        let local = path.to_local_path(&self.local_root);
        let comparator = self.comparator;
        let remote = data.clone();
        let task_local = local.clone();
        let digests =
            tokio::task::spawn_blocking(move || comparator.compare_file(&task_local, &remote))
                .await
                .map_err(|e| VerifyError::Task(e.to_string()))?
                .map_err(|source| VerifyError::LocalIo { path: local, source })?;

        if digests.matches() {
            return Ok(FileOutcome::Match);
        }
        debug!(
            path = %path,
            expected = %digests.expected,
            actual = %digests.actual,
            "content mismatch"
        );
        let (remote_preview, preview_truncated) = preview(&data, self.preview_bytes);
        Ok(FileOutcome::Mismatch(ContentMismatch {
            key: self.prefix.key_for(&path),
            path,
            digests,
            remote_size: data.len() as u64,
            remote_preview,
            preview_truncated,
        }))
    }
}

/// Proves a remote object-store copy of a repository matches a local copy.
///
/// A run first compares the two file *sets* and then the *content* of every
/// file present on both sides, so "this file is missing" and "this file
/// differs" are reported separately. Mismatches are accumulated and returned
/// together in a [`VerificationReport`]; only configuration, transport, and
/// local I/O failures abort the run.
pub struct RepositoryVerifier {
    store: Arc<dyn ObjectStore>,
    config: VerifierConfig,
}

impl RepositoryVerifier {
    pub fn new(store: Arc<dyn ObjectStore>, config: VerifierConfig) -> VerifyResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    fn lister(&self) -> ObjectLister {
        ObjectLister::new(self.store.clone()).with_page_size(self.config.page_size)
    }

    /// The expected file set: every non-excluded regular file under `local_root`.
    pub async fn expected_paths(&self, local_root: &Path) -> VerifyResult<BTreeSet<RelativePath>> {
        let root = local_root.to_path_buf();
        let exclusions = self.config.exclusions.clone();
        tokio::task::spawn_blocking(move || PathEnumerator::new(root, &exclusions)?.collect_set())
            .await
            .map_err(|e| VerifyError::Task(e.to_string()))?
    }

    /// The actual object set: every non-excluded key under `prefix`, stripped.
    pub async fn actual_paths(
        &self,
        bucket: &str,
        prefix: &KeyPrefix,
    ) -> VerifyResult<BTreeSet<RelativePath>> {
        self.lister()
            .list(bucket, prefix, &self.config.exclusions)
            .await
    }

    /// Verify without external cancellation.
    pub async fn verify(
        &self,
        local_root: &Path,
        bucket: &str,
        prefix: &KeyPrefix,
    ) -> VerifyResult<VerificationReport> {
        self.verify_with_cancellation(local_root, bucket, prefix, CancellationToken::new())
            .await
    }

    /// Verify, aborting all in-flight work once `cancel` fires.
    pub async fn verify_with_cancellation(
        &self,
        local_root: &Path,
        bucket: &str,
        prefix: &KeyPrefix,
        cancel: CancellationToken,
    ) -> VerifyResult<VerificationReport> {
        if bucket.is_empty() {
            return Err(VerifyError::Configuration("bucket name is empty".into()));
        }
        let started = Instant::now();

        info!(
            phase = %VerifyPhase::Enumerating,
            local_root = %local_root.display(),
            bucket,
            prefix = %prefix,
            "verifying repository copy"
        );
        let enumerate = async {
            tokio::try_join!(
                self.expected_paths(local_root),
                self.actual_paths(bucket, prefix)
            )
        };
        let (expected, actual) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(VerifyError::Cancelled { phase: VerifyPhase::Enumerating });
            }
            sets = enumerate => sets?,
        };

        debug!(
            phase = %VerifyPhase::SetComparing,
            expected = expected.len(),
            actual = actual.len(),
            "comparing file sets"
        );
        let missing_remotely: Vec<RelativePath> = expected.difference(&actual).cloned().collect();
        let unexpected_remotely: Vec<RelativePath> =
            actual.difference(&expected).cloned().collect();
        let shared: Vec<RelativePath> = expected.intersection(&actual).cloned().collect();
        for path in &missing_remotely {
            warn!(path = %path, "missing remotely");
        }
        for path in &unexpected_remotely {
            warn!(path = %path, "unexpected remote object");
        }

        debug!(
            phase = %VerifyPhase::ContentComparing,
            files = shared.len(),
            concurrency = self.config.concurrency,
            "comparing file contents"
        );
        let job = CompareJob {
            fetcher: ContentFetcher::new(self.store.clone()),
            comparator: DigestComparator::new(self.config.algorithm),
            local_root: local_root.to_path_buf(),
            bucket: bucket.to_string(),
            prefix: prefix.clone(),
            preview_bytes: self.config.preview_bytes,
        };
        let files_compared = shared.len();
        let outcomes = self.compare_contents(job, shared, &cancel).await?;

        let mut vanished = Vec::new();
        let mut content_mismatches = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Match => {}
                FileOutcome::Mismatch(m) => content_mismatches.push(m),
                FileOutcome::Vanished(path) => vanished.push(path),
            }
        }
        vanished.sort();
        content_mismatches.sort_by(|a, b| a.path.cmp(&b.path));

        let report = VerificationReport {
            local_root: local_root.to_path_buf(),
            bucket: bucket.to_string(),
            prefix: prefix.clone(),
            algorithm: self.config.algorithm,
            expected_count: expected.len(),
            actual_count: actual.len(),
            missing_remotely,
            unexpected_remotely,
            vanished,
            content_mismatches,
            files_compared,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        let phase = if report.is_success() {
            VerifyPhase::Done
        } else {
            VerifyPhase::Failed
        };
        info!(
            phase = %phase,
            verdict = %report.verdict(),
            mismatches = report.mismatch_count(),
            elapsed_ms = report.elapsed_ms,
            "verification finished"
        );
        Ok(report)
    }

    /// Fetch and compare every shared path, task per path, bounded by a
    /// semaphore of `config.concurrency` permits.
    async fn compare_contents(
        &self,
        job: CompareJob,
        shared: Vec<RelativePath>,
        cancel: &CancellationToken,
    ) -> VerifyResult<Vec<FileOutcome>> {
        let cancelled = || VerifyError::Cancelled {
            phase: VerifyPhase::ContentComparing,
        };
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        let mut outcomes = Vec::with_capacity(shared.len());

        for path in shared {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(cancelled());
                }
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|e| VerifyError::Task(format!("semaphore closed: {e}")))?
                }
            };
            // Surface fatal errors from finished tasks before spawning more.
            while let Some(joined) = tasks.try_join_next() {
                match Self::unpack(joined) {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        tasks.abort_all();
                        return Err(e);
                    }
                }
            }
            let job = job.clone();
            tasks.spawn(async move {
                let _permit = permit;
                job.run(path).await
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(cancelled());
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };
            match Self::unpack(joined) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    fn unpack(
        joined: Result<VerifyResult<FileOutcome>, tokio::task::JoinError>,
    ) -> VerifyResult<FileOutcome> {
        joined.map_err(|e| VerifyError::Task(format!("task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use rfv_crypto::DigestAlgorithm;
    use rfv_store::{InMemoryObjectStore, ListPage, ListRequest, StoreError, StoreResult};
    use rfv_types::ExclusionSet;

    use crate::report::Verdict;

    fn write(root: &Path, rel: &str, data: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn rp(s: &str) -> RelativePath {
        RelativePath::parse(s).unwrap()
    }

    fn verifier(store: Arc<dyn ObjectStore>) -> RepositoryVerifier {
        RepositoryVerifier::new(store, VerifierConfig::default()).unwrap()
    }

    /// Local fixture plus an identical remote copy under `prefix`.
    fn mirrored(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<InMemoryObjectStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::new());
        store.create_bucket("bucket");
        for (path, data) in files {
            write(dir.path(), path, data);
            store.put_object("bucket", &format!("prefix/{path}"), data.to_string());
        }
        (dir, store)
    }

    #[tokio::test]
    async fn identical_copy_passes_with_excluded_marker() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "hi");
        write(dir.path(), ".gitkeep", "");
        let store = Arc::new(InMemoryObjectStore::new());
        store.put_object("bucket", "prefix/a.txt", "hi");

        let report = verifier(store)
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Pass);
        assert_eq!(report.mismatch_count(), 0);
        assert_eq!(report.files_compared, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn filesystem_copy_with_backslash_names_passes() {
        let local = tempfile::tempdir().unwrap();
        let buckets = tempfile::tempdir().unwrap();
        for root in [local.path().to_path_buf(), buckets.path().join("bucket/repo")] {
            write(&root, "a\\b.txt", "hi");
            write(&root, "v1/content/c.txt", "bye");
        }
        let store = Arc::new(rfv_store::FsObjectStore::new(buckets.path()));
        let report = verifier(store)
            .verify(local.path(), "bucket", &KeyPrefix::new("repo"))
            .await
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Pass, "{report}");
        assert!(report.vanished.is_empty());
        assert_eq!(report.files_compared, 2);
    }

    #[tokio::test]
    async fn empty_remote_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "hi");
        let store = Arc::new(InMemoryObjectStore::new());
        store.create_bucket("bucket");

        let report = verifier(store)
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Fail);
        assert_eq!(report.missing_remotely, vec![rp("a.txt")]);
        assert!(report.content_mismatches.is_empty());
        assert_eq!(report.files_compared, 0);
    }

    #[tokio::test]
    async fn differing_content_reports_digests() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "hi");
        let store = Arc::new(InMemoryObjectStore::new());
        store.put_object("bucket", "prefix/a.txt", "bye");

        let report = verifier(store)
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Fail);
        assert!(!report.has_structural_mismatches());
        assert_eq!(report.content_mismatches.len(), 1);
        let m = &report.content_mismatches[0];
        assert_eq!(m.path, rp("a.txt"));
        assert_eq!(m.key, "prefix/a.txt");
        assert_eq!(m.digests.expected.as_str(), "49f68a5c8493ec2c0bf489821c21fc3b");
        assert_eq!(m.digests.actual.as_str(), "bfa99df33b137bc8fb5f5407d7e58da8");
        assert_eq!(m.remote_preview.as_deref(), Some("bye"));
    }

    #[tokio::test]
    async fn every_mismatch_is_reported_in_order() {
        let (dir, store) = mirrored(&[
            ("v1/a.txt", "a"),
            ("v1/b.txt", "b"),
            ("v1/c.txt", "c"),
            ("v2/d.txt", "d"),
        ]);
        store.put_object("bucket", "prefix/v1/c.txt", "changed");
        store.put_object("bucket", "prefix/v1/a.txt", "changed too");
        store.remove_object("bucket", "prefix/v2/d.txt");
        store.put_object("bucket", "prefix/v3/stray.txt", "x");
        write(dir.path(), "v2/e.txt", "e");

        let report = verifier(store)
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert_eq!(report.missing_remotely, vec![rp("v2/d.txt"), rp("v2/e.txt")]);
        assert_eq!(report.unexpected_remotely, vec![rp("v3/stray.txt")]);
        let mismatched: Vec<_> = report.content_mismatches.iter().map(|m| m.path.clone()).collect();
        assert_eq!(mismatched, vec![rp("v1/a.txt"), rp("v1/c.txt")]);
        assert_eq!(report.mismatch_count(), 5);
    }

    #[tokio::test]
    async fn excluded_files_never_change_the_verdict() {
        let (dir, store) = mirrored(&[("a.txt", "hi"), ("obj/v1/content/b.bin", "bytes")]);
        let v = verifier(store.clone());
        let prefix = KeyPrefix::new("prefix");
        assert!(v.verify(dir.path(), "bucket", &prefix).await.unwrap().is_success());

        write(dir.path(), "ocfl_1.1.md", "# spec");
        write(dir.path(), "obj/.gitkeep", "");
        assert!(v.verify(dir.path(), "bucket", &prefix).await.unwrap().is_success());

        store.put_object("bucket", "prefix/ocfl_1.0.txt", "old spec");
        store.put_object("bucket", "prefix/obj/v1/.gitkeep", "");
        assert!(v.verify(dir.path(), "bucket", &prefix).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn multi_page_listing_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::with_page_size(3));
        for i in 0..10 {
            let data = format!("file {i}");
            write(dir.path(), &format!("obj/f{i:02}.txt"), &data);
            store.put_object("bucket", &format!("prefix/obj/f{i:02}.txt"), data);
        }
        let report = verifier(store.clone())
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert!(report.is_success(), "{report}");
        assert_eq!(report.actual_count, 10);
        assert!(store.list_calls() >= 4);
    }

    #[tokio::test]
    async fn trailing_separator_prefix_is_equivalent() {
        let (dir, store) = mirrored(&[("a/b.txt", "x")]);
        let report = verifier(store)
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix/"))
            .await
            .unwrap();
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn algorithm_is_configurable() {
        let (dir, store) = mirrored(&[("a.txt", "hi")]);
        store.put_object("bucket", "prefix/a.txt", "bye");
        let config = VerifierConfig {
            algorithm: DigestAlgorithm::Sha256,
            exclusions: ExclusionSet::empty(),
            ..Default::default()
        };
        let report = RepositoryVerifier::new(store, config)
            .unwrap()
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert_eq!(report.algorithm, DigestAlgorithm::Sha256);
        assert_eq!(report.content_mismatches[0].digests.expected.as_str().len(), 64);
    }

    #[tokio::test]
    async fn transport_failure_aborts_the_run() {
        let (dir, store) = mirrored(&[("a.txt", "hi"), ("b.txt", "yo")]);
        store.fail_key("prefix/b.txt");
        let err = verifier(store)
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Transport { .. }));
    }

    #[tokio::test]
    async fn unreadable_root_and_bad_bucket_are_configuration_errors() {
        let (dir, store) = mirrored(&[("a.txt", "hi")]);
        let v = verifier(store);
        let prefix = KeyPrefix::new("prefix");

        let err = v.verify(&dir.path().join("absent"), "bucket", &prefix).await.unwrap_err();
        assert!(matches!(err, VerifyError::Configuration(_)));

        let err = v.verify(dir.path(), "ghost", &prefix).await.unwrap_err();
        assert!(matches!(err, VerifyError::Configuration(_)));

        let err = v.verify(dir.path(), "", &prefix).await.unwrap_err();
        assert!(matches!(err, VerifyError::Configuration(_)));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let store = Arc::new(InMemoryObjectStore::new());
        let config = VerifierConfig { concurrency: 0, ..Default::default() };
        assert!(RepositoryVerifier::new(store, config).is_err());
    }

    #[tokio::test]
    async fn empty_tree_and_empty_prefix_pass() {
        let (dir, store) = mirrored(&[]);
        let report = verifier(store)
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert_eq!(report.verdict(), Verdict::Pass);
        assert_eq!(report.files_compared, 0);
    }

    /// Lists from an inner store but answers every read with `NotFound`.
    struct VanishingStore(InMemoryObjectStore);

    #[async_trait]
    impl ObjectStore for VanishingStore {
        async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage> {
            self.0.list_objects(request).await
        }

        async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
            Err(StoreError::NotFound { bucket: bucket.into(), key: key.into() })
        }
    }

    #[tokio::test]
    async fn objects_gone_at_fetch_time_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "hi");
        let inner = InMemoryObjectStore::new();
        inner.put_object("bucket", "prefix/a.txt", "hi");

        let report = verifier(Arc::new(VanishingStore(inner)))
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert_eq!(report.vanished, vec![rp("a.txt")]);
        assert_eq!(report.verdict(), Verdict::Fail);
    }

    /// Delays every read and records peak read concurrency.
    struct SlowStore {
        inner: InMemoryObjectStore,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowStore {
        fn new(inner: InMemoryObjectStore, delay: Duration) -> Self {
            Self { inner, delay, in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ObjectStore for SlowStore {
        async fn list_objects(&self, request: &ListRequest) -> StoreResult<ListPage> {
            self.inner.list_objects(request).await
        }

        async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.get_object(bucket, key).await
        }
    }

    #[tokio::test]
    async fn fetches_are_bounded_by_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let inner = InMemoryObjectStore::new();
        for i in 0..12 {
            write(dir.path(), &format!("f{i}.txt"), "x");
            inner.put_object("bucket", &format!("prefix/f{i}.txt"), "x");
        }
        let store = Arc::new(SlowStore::new(inner, Duration::from_millis(20)));
        let config = VerifierConfig { concurrency: 3, ..Default::default() };
        let report = RepositoryVerifier::new(store.clone(), config)
            .unwrap()
            .verify(dir.path(), "bucket", &KeyPrefix::new("prefix"))
            .await
            .unwrap();
        assert!(report.is_success());
        let peak = store.peak.load(Ordering::SeqCst);
        assert_eq!(peak, 3, "peak concurrency {peak}");
    }

    #[tokio::test]
    async fn cancellation_before_start_stops_enumeration() {
        let (dir, store) = mirrored(&[("a.txt", "hi")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = verifier(store)
            .verify_with_cancellation(dir.path(), "bucket", &KeyPrefix::new("prefix"), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Cancelled { phase: VerifyPhase::Enumerating }));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let inner = InMemoryObjectStore::new();
        for i in 0..4 {
            write(dir.path(), &format!("f{i}.txt"), "x");
            inner.put_object("bucket", &format!("prefix/f{i}.txt"), "x");
        }
        let store = Arc::new(SlowStore::new(inner, Duration::from_secs(60)));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = verifier(store)
            .verify_with_cancellation(dir.path(), "bucket", &KeyPrefix::new("prefix"), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Cancelled { phase: VerifyPhase::ContentComparing }));
    }

    #[tokio::test]
    async fn set_accessors_match_enumerations() {
        let (dir, store) = mirrored(&[("x/y.txt", "1"), ("z.txt", "2")]);
        let v = verifier(store);
        let expected = v.expected_paths(dir.path()).await.unwrap();
        let actual = v.actual_paths("bucket", &KeyPrefix::new("prefix")).await.unwrap();
        assert_eq!(expected, actual);
    }
}
