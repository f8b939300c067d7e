//! Upload execution
//!
//! [`TransferExecutor`] runs a [`Plan`] against an [`ObjectStore`]. Upload
//! entries are queued and drained by a fixed pool of workers. A request
//! semaphore of the same size bounds every single-request upload and every
//! multipart part in flight, so a few large files cannot multiply the load.
//!
//! A failing file is recorded in the report and the run carries on.
//! Progress counters are atomics; the report is aggregated by the calling
//! task only.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::config::TransferSettings;
use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprinter, Md5Fingerprinter};
use crate::multipart::{
    calculate_parts, effective_part_size, part_ranges, MAX_PART_SIZE, MIN_PART_SIZE,
};
use crate::plan::{Plan, PlanAction, PlanEntry};
use crate::traits::{
    CompletedPart, ObjectStore, PartUpload, UploadTarget, FINGERPRINT_METADATA_KEY,
};

const MIB: u64 = 1024 * 1024;

/// Transfer tuning applied to every upload of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Files of at least this many bytes are uploaded in parts
    pub multipart_threshold_bytes: u64,
    /// Size of each part
    pub multipart_chunk_bytes: u64,
    /// Upper bound on uploads and parts in flight
    pub max_concurrent_transfers: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold_bytes: 25 * MIB,
            multipart_chunk_bytes: 25 * MIB,
            max_concurrent_transfers: 10,
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted settings, applying the builder limits
    pub fn from_settings(settings: &TransferSettings) -> Self {
        Self::new()
            .multipart_threshold(settings.multipart_threshold)
            .multipart_chunk(settings.multipart_chunk_size)
            .max_concurrent_transfers(settings.max_concurrency)
    }

    pub fn multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold_bytes = bytes.max(1);
        self
    }

    /// Set the part size, clamped to S3's 5 MiB..5 GiB
    pub fn multipart_chunk(mut self, bytes: u64) -> Self {
        self.multipart_chunk_bytes = bytes.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
        self
    }

    pub fn max_concurrent_transfers(mut self, n: usize) -> Self {
        self.max_concurrent_transfers = n.max(1);
        self
    }

    /// Whether a file of `size` bytes goes through multipart upload
    ///
    /// The threshold is inclusive. Empty files always go in one request.
    pub fn is_multipart(&self, size: u64) -> bool {
        size > 0 && size >= self.multipart_threshold_bytes
    }

    /// Number of store requests carrying data for a file of `size` bytes
    pub fn part_count(&self, size: u64) -> u64 {
        if self.is_multipart(size) {
            calculate_parts(size, effective_part_size(size, self.multipart_chunk_bytes))
        } else {
            1
        }
    }
}

/// A file that did not transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFailure {
    pub key: String,
    pub error: String,
}

/// Totals of an executed plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    pub uploaded_count: u64,
    pub uploaded_bytes: u64,
    pub skipped_count: u64,
    pub skipped_bytes: u64,
    pub failures: Vec<TransferFailure>,
    /// Run stopped early; files not started are in no total
    pub cancelled: bool,
}

impl TransferReport {
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Final state of a plan entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded,
    Skipped,
    Failed,
}

/// Phase of a sync pass, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scanning,
    Listing,
    Planning,
    /// Transfer starts; `total_bytes` counts uploads and skips
    Transferring { total_bytes: u64 },
}

/// Receives progress events; every method defaults to doing nothing
///
/// Events arrive from several tasks at once.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, _stage: Stage) {}

    /// Bytes of a skipped file, a finished single upload, or a finished part
    fn bytes_transferred(&self, _bytes: u64) {}

    fn file_finished(&self, _key: &str, _outcome: FileOutcome) {}
}

/// Progress sink that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Shared flag that stops a run between files and between parts
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Live counters, readable while a run is in progress
#[derive(Debug, Default)]
pub struct TransferCounters {
    uploaded_files: AtomicU64,
    uploaded_bytes: AtomicU64,
    skipped_files: AtomicU64,
    skipped_bytes: AtomicU64,
    failed_files: AtomicU64,
}

impl TransferCounters {
    pub fn uploaded_files(&self) -> u64 {
        self.uploaded_files.load(Ordering::Relaxed)
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes.load(Ordering::Relaxed)
    }

    pub fn skipped_files(&self) -> u64 {
        self.skipped_files.load(Ordering::Relaxed)
    }

    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes.load(Ordering::Relaxed)
    }

    pub fn failed_files(&self) -> u64 {
        self.failed_files.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        for counter in [
            &self.uploaded_files,
            &self.uploaded_bytes,
            &self.skipped_files,
            &self.skipped_bytes,
            &self.failed_files,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn record_upload(&self, bytes: u64) {
        self.uploaded_files.fetch_add(1, Ordering::Relaxed);
        self.uploaded_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_skip(&self, bytes: u64) {
        self.skipped_files.fetch_add(1, Ordering::Relaxed);
        self.skipped_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }
}

/// Executes upload plans against an object store
pub struct TransferExecutor {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    config: TransferConfig,
    storage_class: Option<String>,
    fingerprinter: Arc<dyn Fingerprinter>,
    cancel: CancelFlag,
    counters: Arc<TransferCounters>,
}

impl TransferExecutor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        config: TransferConfig,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            config,
            storage_class: None,
            fingerprinter: Arc::new(Md5Fingerprinter),
            cancel: CancelFlag::new(),
            counters: Arc::new(TransferCounters::default()),
        }
    }

    pub fn storage_class(mut self, storage_class: Option<String>) -> Self {
        self.storage_class = storage_class;
        self
    }

    pub fn fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Counters of the current (or last) run
    pub fn counters(&self) -> Arc<TransferCounters> {
        Arc::clone(&self.counters)
    }

    /// Execute a plan
    ///
    /// Never fails as a whole: per-file problems land in
    /// [`TransferReport::failures`].
    pub async fn execute(&self, plan: Plan, progress: Arc<dyn ProgressSink>) -> TransferReport {
        self.counters.reset();
        let Plan {
            entries,
            mut failures,
        } = plan;
        self.counters
            .failed_files
            .fetch_add(failures.len() as u64, Ordering::Relaxed);

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel::<PlanEntry>();
        let mut queued = 0usize;
        for entry in entries {
            match entry.action {
                PlanAction::Skip => {
                    self.counters.record_skip(entry.size_bytes());
                    progress.bytes_transferred(entry.size_bytes());
                    progress.file_finished(entry.key(), FileOutcome::Skipped);
                }
                PlanAction::Upload => {
                    // The receiver is held below, so the send cannot fail
                    let _ = jobs_tx.send(entry);
                    queued += 1;
                }
            }
        }
        drop(jobs_tx);

        let workers = self.config.max_concurrent_transfers.max(1).min(queued.max(1));
        tracing::info!(queued, workers, bucket = %self.bucket, "starting transfers");

        let context = Arc::new(WorkerContext {
            store: Arc::clone(&self.store),
            bucket: self.bucket.clone(),
            config: self.config,
            storage_class: self.storage_class.clone(),
            fingerprinter: Arc::clone(&self.fingerprinter),
            cancel: self.cancel.clone(),
            counters: Arc::clone(&self.counters),
            requests: Arc::new(Semaphore::new(self.config.max_concurrent_transfers.max(1))),
            progress,
        });

        let queue = Arc::new(Mutex::new(jobs_rx));
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<JobOutcome>();
        let mut pool = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(worker_loop(
                Arc::clone(&context),
                Arc::clone(&queue),
                results_tx.clone(),
            ));
        }
        drop(results_tx);

        let mut cancelled = false;
        while let Some(outcome) = results_rx.recv().await {
            match outcome {
                JobOutcome::Uploaded => {}
                JobOutcome::Failed(failure) => failures.push(failure),
                JobOutcome::Cancelled => cancelled = true,
            }
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "transfer worker stopped unexpectedly");
                failures.push(TransferFailure {
                    key: String::from("<worker>"),
                    error: format!("transfer worker stopped unexpectedly: {e}"),
                });
            }
        }

        TransferReport {
            uploaded_count: self.counters.uploaded_files(),
            uploaded_bytes: self.counters.uploaded_bytes(),
            skipped_count: self.counters.skipped_files(),
            skipped_bytes: self.counters.skipped_bytes(),
            failures,
            cancelled: cancelled || self.cancel.is_cancelled(),
        }
    }
}

enum JobOutcome {
    Uploaded,
    Failed(TransferFailure),
    Cancelled,
}

struct WorkerContext {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    config: TransferConfig,
    storage_class: Option<String>,
    fingerprinter: Arc<dyn Fingerprinter>,
    cancel: CancelFlag,
    counters: Arc<TransferCounters>,
    requests: Arc<Semaphore>,
    progress: Arc<dyn ProgressSink>,
}

async fn worker_loop(
    context: Arc<WorkerContext>,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<PlanEntry>>>,
    results: mpsc::UnboundedSender<JobOutcome>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(entry) = next else {
            break;
        };
        let outcome = context.run(entry).await;
        if results.send(outcome).is_err() {
            break;
        }
    }
}

impl WorkerContext {
    async fn run(&self, entry: PlanEntry) -> JobOutcome {
        if self.cancel.is_cancelled() {
            return JobOutcome::Cancelled;
        }

        let key = entry.key().to_string();
        let size = entry.size_bytes();
        tracing::debug!(key = %key, size, reason = %entry.reason, "uploading");

        match self.upload(&entry).await {
            Ok(()) => {
                self.counters.record_upload(size);
                self.progress.file_finished(&key, FileOutcome::Uploaded);
                JobOutcome::Uploaded
            }
            Err(Error::Interrupted) => {
                tracing::debug!(key = %key, "upload interrupted");
                JobOutcome::Cancelled
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "upload failed");
                self.counters.record_failure();
                self.progress.file_finished(&key, FileOutcome::Failed);
                JobOutcome::Failed(TransferFailure {
                    key,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn upload(&self, entry: &PlanEntry) -> Result<()> {
        let file = &entry.local_file;
        let fingerprint = match &entry.fingerprint {
            Some(fp) => fp.clone(),
            None => self.fingerprint(&file.absolute_path).await?,
        };

        let target = UploadTarget {
            bucket: self.bucket.clone(),
            key: file.relative_key.clone(),
            metadata: HashMap::from([(FINGERPRINT_METADATA_KEY.to_string(), fingerprint)]),
            storage_class: self.storage_class.clone(),
        };

        if self.config.is_multipart(file.size_bytes) {
            return self
                .upload_multipart(&target, &file.absolute_path, file.size_bytes)
                .await;
        }

        let _permit = self.request_slot().await?;
        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }
        self.store.put_object(&target, &file.absolute_path).await?;
        self.progress.bytes_transferred(file.size_bytes);
        Ok(())
    }

    async fn fingerprint(&self, path: &Path) -> Result<String> {
        let fingerprinter = Arc::clone(&self.fingerprinter);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || fingerprinter.fingerprint(&path))
            .await
            .map_err(|e| Error::General(format!("hashing task failed: {e}")))?
    }

    async fn request_slot(&self) -> Result<OwnedSemaphorePermit> {
        acquire(&self.requests).await
    }

    async fn upload_multipart(&self, target: &UploadTarget, path: &Path, size: u64) -> Result<()> {
        let upload_id = {
            let _permit = self.request_slot().await?;
            self.store.create_multipart(target).await?
        };

        let part_size = effective_part_size(size, self.config.multipart_chunk_bytes);
        let ranges = part_ranges(size, part_size);
        tracing::debug!(
            key = %target.key,
            upload_id = %upload_id,
            parts = ranges.len(),
            part_size,
            "multipart upload started"
        );

        let mut parts = JoinSet::new();
        for range in ranges {
            let part = PartUpload {
                bucket: target.bucket.clone(),
                key: target.key.clone(),
                upload_id: upload_id.clone(),
                part_number: range.part_number,
                path: path.to_path_buf(),
                offset: range.offset,
                length: range.length,
            };
            parts.spawn(upload_one_part(
                Arc::clone(&self.store),
                Arc::clone(&self.requests),
                Arc::clone(&self.progress),
                self.cancel.clone(),
                part,
            ));
        }

        let mut completed: Vec<CompletedPart> = Vec::with_capacity(parts.len());
        let mut failure: Option<Error> = None;
        while let Some(joined) = parts.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Err(Error::General(format!("part task failed: {e}"))),
            };
            match result {
                Ok(part) => completed.push(part),
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                        parts.abort_all();
                    }
                }
            }
        }

        if let Some(e) = failure {
            self.abort_multipart(target, &upload_id).await;
            return Err(e);
        }

        completed.sort_by_key(|p| p.part_number);
        let completion = {
            let _permit = self.request_slot().await?;
            self.store
                .complete_multipart(&target.bucket, &target.key, &upload_id, completed)
                .await
        };
        if let Err(e) = completion {
            self.abort_multipart(target, &upload_id).await;
            return Err(e);
        }

        tracing::debug!(key = %target.key, upload_id = %upload_id, "multipart upload completed");
        Ok(())
    }

    async fn abort_multipart(&self, target: &UploadTarget, upload_id: &str) {
        match self
            .store
            .abort_multipart(&target.bucket, &target.key, upload_id)
            .await
        {
            Ok(()) => tracing::debug!(key = %target.key, upload_id, "multipart upload aborted"),
            Err(e) => tracing::warn!(
                key = %target.key,
                upload_id,
                error = %e,
                "failed to abort multipart upload"
            ),
        }
    }
}

async fn acquire(slots: &Arc<Semaphore>) -> Result<OwnedSemaphorePermit> {
    Arc::clone(slots)
        .acquire_owned()
        .await
        .map_err(|_| Error::General("transfer slots closed".into()))
}

async fn upload_one_part(
    store: Arc<dyn ObjectStore>,
    requests: Arc<Semaphore>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelFlag,
    part: PartUpload,
) -> Result<CompletedPart> {
    let _permit = acquire(&requests).await?;
    if cancel.is_cancelled() {
        return Err(Error::Interrupted);
    }
    let completed = store.upload_part(&part).await?;
    progress.bytes_transferred(part.length);
    Ok(completed)
}
