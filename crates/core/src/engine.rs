//! One sync pass: walk, list, plan, transfer

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ConfigStore, KEY_BUCKET_NAME, KEY_STORAGE_CLASS};
use crate::error::{Error, Result};
use crate::filter::ExtensionFilter;
use crate::fingerprint::{Fingerprinter, Md5Fingerprinter};
use crate::path::key_prefix;
use crate::plan::{Plan, PlanSummary, SyncPlanner};
use crate::traits::ObjectStore;
use crate::transfer::{
    CancelFlag, ProgressSink, Stage, TransferConfig, TransferExecutor, TransferFailure,
    TransferReport,
};
use crate::walk::DirectoryWalker;

/// What to sync
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub root: PathBuf,
    pub filter: ExtensionFilter,
    /// Plan only, upload nothing
    pub dry_run: bool,
}

impl SyncRequest {
    pub fn new(root: impl Into<PathBuf>, filter: ExtensionFilter) -> Self {
        Self {
            root: root.into(),
            filter,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Result of [`SyncEngine::run`]
#[derive(Debug)]
pub enum SyncOutcome {
    /// No bucket configured; nothing was touched
    NotConfigured,
    /// Plan of a dry run
    DryRun(Plan),
    Completed {
        plan_summary: PlanSummary,
        report: TransferReport,
    },
}

/// Wires configuration, walker, store, planner and executor together
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    transfer: TransferConfig,
    storage_class: Option<String>,
    fingerprinter: Arc<dyn Fingerprinter>,
    cancel: CancelFlag,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            transfer: TransferConfig::default(),
            storage_class: None,
            fingerprinter: Arc::new(Md5Fingerprinter),
            cancel: CancelFlag::new(),
        }
    }

    pub fn transfer_config(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    /// Storage class override; the configured one is used otherwise
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

    /// Run one sync pass
    ///
    /// Only structural problems return `Err`: an unreadable configuration,
    /// an invalid root or a failed listing. Everything per file ends up in
    /// the report.
    pub async fn run(
        &self,
        config: &dyn ConfigStore,
        request: SyncRequest,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<SyncOutcome> {
        let Some(bucket) = config
            .get(KEY_BUCKET_NAME)?
            .filter(|name| !name.trim().is_empty())
        else {
            tracing::info!("no bucket configured");
            return Ok(SyncOutcome::NotConfigured);
        };
        let storage_class = match &self.storage_class {
            Some(class) => Some(class.clone()),
            None => config.get(KEY_STORAGE_CLASS)?,
        };

        progress.stage(Stage::Scanning);
        let walker = DirectoryWalker::new(&request.root, request.filter)?;
        let prefix = key_prefix(walker.root())?;
        tracing::info!(root = %walker.root().display(), bucket = %bucket, "scanning");

        let cancel = self.cancel.clone();
        let (files, skipped) = tokio::task::spawn_blocking(move || walker.collect(&cancel))
            .await
            .map_err(|e| Error::General(format!("walk task failed: {e}")))??;
        let walk_failures: Vec<TransferFailure> = skipped
            .into_iter()
            .map(|entry| TransferFailure {
                key: entry.path.display().to_string(),
                error: entry.error.to_string(),
            })
            .collect();

        self.check_cancelled()?;
        progress.stage(Stage::Listing);
        let snapshot = self.store.list_all(&bucket, &prefix).await?;
        tracing::info!(prefix = %prefix, objects = snapshot.len(), "remote snapshot taken");

        progress.stage(Stage::Planning);
        let planner = SyncPlanner::new(Arc::clone(&self.fingerprinter))
            .cancel_flag(self.cancel.clone());
        let mut plan = tokio::task::spawn_blocking(move || planner.plan(files, &snapshot))
            .await
            .map_err(|e| Error::General(format!("planning task failed: {e}")))??;
        plan.failures.splice(0..0, walk_failures);

        if request.dry_run {
            self.check_cancelled()?;
            return Ok(SyncOutcome::DryRun(plan));
        }

        let plan_summary = plan.summary();
        progress.stage(Stage::Transferring {
            total_bytes: plan.total_bytes(),
        });

        let executor = TransferExecutor::new(Arc::clone(&self.store), bucket, self.transfer)
            .storage_class(storage_class)
            .fingerprinter(Arc::clone(&self.fingerprinter))
            .cancel_flag(self.cancel.clone());
        let report = executor.execute(plan, progress).await;

        tracing::info!(
            uploaded = report.uploaded_count,
            skipped = report.skipped_count,
            failed = report.failed_count(),
            cancelled = report.cancelled,
            "sync finished"
        );
        Ok(SyncOutcome::Completed {
            plan_summary,
            report,
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}
