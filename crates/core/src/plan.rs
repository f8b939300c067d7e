//! Upload planning
//!
//! Planning runs in two phases so the expensive part stays visible:
//!
//! 1. [`SyncPlanner::classify`] compares keys only. A file whose key is not
//!    in the remote snapshot is new and is never hashed here.
//! 2. [`SyncPlanner::resolve`] hashes the files whose key exists remotely
//!    with a stored fingerprint and decides upload or skip.
//!
//! Fingerprints computed in phase 2 travel on the plan entry so the
//! executor does not hash the same file twice.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprinter, Md5Fingerprinter};
use crate::traits::RemoteSnapshot;
use crate::transfer::{CancelFlag, TransferFailure};
use crate::walk::LocalFile;

/// What to do with a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    Upload,
    Skip,
}

/// Why the action was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanReason {
    /// Key absent remotely
    New,
    /// Remote fingerprint differs or is missing
    Changed,
    /// Remote fingerprint matches byte for byte
    Unchanged,
}

impl fmt::Display for PlanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanReason::New => "new",
            PlanReason::Changed => "changed",
            PlanReason::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// Per-file decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub local_file: LocalFile,
    pub action: PlanAction,
    pub reason: PlanReason,
    /// Local fingerprint, when phase 2 computed it
    pub fingerprint: Option<String>,
}

impl PlanEntry {
    pub fn key(&self) -> &str {
        &self.local_file.relative_key
    }

    pub fn size_bytes(&self) -> u64 {
        self.local_file.size_bytes
    }
}

/// Result of phase 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Not present remotely
    New(LocalFile),
    /// Present with a stored fingerprint to compare against
    Candidate { file: LocalFile, remote: String },
    /// Present but the store has no fingerprint for it
    Unverifiable(LocalFile),
}

/// Output of planning
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    /// Files that could not be planned (unreadable while hashing)
    pub failures: Vec<TransferFailure>,
}

/// Counts and byte totals of a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub upload_count: u64,
    pub upload_bytes: u64,
    pub skip_count: u64,
    pub skip_bytes: u64,
    pub failed_count: u64,
}

impl Plan {
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            failed_count: self.failures.len() as u64,
            ..Default::default()
        };
        for entry in &self.entries {
            match entry.action {
                PlanAction::Upload => {
                    summary.upload_count += 1;
                    summary.upload_bytes += entry.size_bytes();
                }
                PlanAction::Skip => {
                    summary.skip_count += 1;
                    summary.skip_bytes += entry.size_bytes();
                }
            }
        }
        summary
    }

    /// Total bytes of every planned file, uploaded or skipped
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(PlanEntry::size_bytes).sum()
    }

    pub fn uploads(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries
            .iter()
            .filter(|e| e.action == PlanAction::Upload)
    }
}

/// Decides which files need uploading
#[derive(Clone)]
pub struct SyncPlanner {
    fingerprinter: Arc<dyn Fingerprinter>,
    cancel: CancelFlag,
}

impl Default for SyncPlanner {
    fn default() -> Self {
        Self::new(Arc::new(Md5Fingerprinter))
    }
}

impl SyncPlanner {
    pub fn new(fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        Self {
            fingerprinter,
            cancel: CancelFlag::new(),
        }
    }

    /// Flag checked before each file is hashed
    pub fn cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Phase 1: key comparison, no file I/O
    pub fn classify(files: Vec<LocalFile>, snapshot: &RemoteSnapshot) -> Vec<Classified> {
        files
            .into_iter()
            .map(|file| match snapshot.fingerprint(&file.relative_key) {
                None => Classified::New(file),
                Some(None) => Classified::Unverifiable(file),
                Some(Some(remote)) => Classified::Candidate {
                    remote: remote.to_string(),
                    file,
                },
            })
            .collect()
    }

    /// Phase 2: hash candidates and produce entries in input order
    ///
    /// Returns [`Error::Interrupted`] as soon as the cancel flag is seen.
    pub fn resolve(&self, classified: Vec<Classified>) -> Result<Plan> {
        let mut plan = Plan::default();

        for item in classified {
            if self.cancel.is_cancelled() {
                tracing::debug!(planned = plan.entries.len(), "planning interrupted");
                return Err(Error::Interrupted);
            }
            match item {
                Classified::New(file) => plan.entries.push(PlanEntry {
                    local_file: file,
                    action: PlanAction::Upload,
                    reason: PlanReason::New,
                    fingerprint: None,
                }),
                Classified::Unverifiable(file) => plan.entries.push(PlanEntry {
                    local_file: file,
                    action: PlanAction::Upload,
                    reason: PlanReason::Changed,
                    fingerprint: None,
                }),
                Classified::Candidate { file, remote } => {
                    match self.fingerprinter.fingerprint(&file.absolute_path) {
                        Ok(local) => {
                            let (action, reason) = if local == remote {
                                (PlanAction::Skip, PlanReason::Unchanged)
                            } else {
                                (PlanAction::Upload, PlanReason::Changed)
                            };
                            plan.entries.push(PlanEntry {
                                local_file: file,
                                action,
                                reason,
                                fingerprint: Some(local),
                            });
                        }
                        Err(e) => {
                            tracing::warn!(key = %file.relative_key, error = %e, "cannot fingerprint file");
                            plan.failures.push(TransferFailure {
                                key: file.relative_key,
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        let summary = plan.summary();
        tracing::info!(
            upload = summary.upload_count,
            skip = summary.skip_count,
            failed = summary.failed_count,
            "plan ready"
        );
        Ok(plan)
    }

    /// Both phases in one call
    pub fn plan(&self, files: Vec<LocalFile>, snapshot: &RemoteSnapshot) -> Result<Plan> {
        self.resolve(Self::classify(files, snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::MockFingerprinter;
    use std::path::{Path, PathBuf};

    fn local(key: &str, size: u64) -> LocalFile {
        LocalFile {
            absolute_path: PathBuf::from("/src").join(key),
            relative_key: key.to_string(),
            size_bytes: size,
        }
    }

    #[test]
    fn test_classify_does_not_hash() {
        let snapshot: RemoteSnapshot = vec![
            ("project/b.txt".to_string(), Some("\"bbb\"".to_string())),
            ("project/c.txt".to_string(), None),
        ]
        .into_iter()
        .collect();

        let classified = SyncPlanner::classify(
            vec![
                local("project/a.txt", 10),
                local("project/b.txt", 20),
                local("project/c.txt", 30),
            ],
            &snapshot,
        );

        assert!(matches!(classified[0], Classified::New(_)));
        assert!(
            matches!(&classified[1], Classified::Candidate { remote, .. } if remote == "bbb")
        );
        assert!(matches!(classified[2], Classified::Unverifiable(_)));
    }

    #[test]
    fn test_new_and_unchanged_scenario() {
        let snapshot: RemoteSnapshot =
            vec![("project/b.txt".to_string(), Some("bbb".to_string()))]
                .into_iter()
                .collect();

        let mut fingerprinter = MockFingerprinter::new();
        fingerprinter
            .expect_fingerprint()
            .withf(|path| path.ends_with("project/b.txt"))
            .times(1)
            .returning(|_| Ok("bbb".to_string()));

        let planner = SyncPlanner::new(Arc::new(fingerprinter));
        let plan = planner
            .plan(
                vec![local("project/a.txt", 10), local("project/b.txt", 20)],
                &snapshot,
            )
            .unwrap();

        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].key(), "project/a.txt");
        assert_eq!(plan.entries[0].action, PlanAction::Upload);
        assert_eq!(plan.entries[0].reason, PlanReason::New);
        assert_eq!(plan.entries[0].fingerprint, None);
        assert_eq!(plan.entries[1].action, PlanAction::Skip);
        assert_eq!(plan.entries[1].reason, PlanReason::Unchanged);

        let summary = plan.summary();
        assert_eq!(summary.upload_count, 1);
        assert_eq!(summary.upload_bytes, 10);
        assert_eq!(summary.skip_count, 1);
        assert_eq!(summary.skip_bytes, 20);
    }

    #[test]
    fn test_changed_file_keeps_fingerprint() {
        let snapshot: RemoteSnapshot = vec![("p/x".to_string(), Some("\"old\"".to_string()))]
            .into_iter()
            .collect();

        let mut fingerprinter = MockFingerprinter::new();
        fingerprinter
            .expect_fingerprint()
            .times(1)
            .returning(|_| Ok("new".to_string()));

        let plan = SyncPlanner::new(Arc::new(fingerprinter))
            .plan(vec![local("p/x", 1)], &snapshot)
            .unwrap();
        assert_eq!(plan.entries[0].action, PlanAction::Upload);
        assert_eq!(plan.entries[0].reason, PlanReason::Changed);
        assert_eq!(plan.entries[0].fingerprint.as_deref(), Some("new"));
    }

    #[test]
    fn test_fingerprint_comparison_is_case_sensitive() {
        let snapshot: RemoteSnapshot = vec![("p/x".to_string(), Some("ABC".to_string()))]
            .into_iter()
            .collect();

        let mut fingerprinter = MockFingerprinter::new();
        fingerprinter
            .expect_fingerprint()
            .returning(|_| Ok("abc".to_string()));

        let plan = SyncPlanner::new(Arc::new(fingerprinter))
            .plan(vec![local("p/x", 1)], &snapshot)
            .unwrap();
        assert_eq!(plan.entries[0].action, PlanAction::Upload);
    }

    #[test]
    fn test_new_files_are_never_hashed() {
        let mut fingerprinter = MockFingerprinter::new();
        fingerprinter.expect_fingerprint().times(0);

        let plan = SyncPlanner::new(Arc::new(fingerprinter))
            .plan(vec![local("p/a", 1), local("p/b", 2)], &RemoteSnapshot::new())
            .unwrap();
        assert_eq!(plan.summary().upload_count, 2);
    }

    #[test]
    fn test_unreadable_candidate_becomes_failure() {
        let snapshot: RemoteSnapshot = vec![("p/x".to_string(), Some("f".to_string()))]
            .into_iter()
            .collect();

        let mut fingerprinter = MockFingerprinter::new();
        fingerprinter.expect_fingerprint().returning(|path: &Path| {
            Err(Error::Fingerprint {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        });

        let plan = SyncPlanner::new(Arc::new(fingerprinter))
            .plan(vec![local("p/x", 1), local("p/y", 2)], &snapshot)
            .unwrap();

        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].key(), "p/y");
        assert_eq!(plan.failures.len(), 1);
        assert_eq!(plan.failures[0].key, "p/x");
        assert!(plan.failures[0].error.contains("denied"));
    }

    #[test]
    fn test_cancelled_planning_hashes_nothing() {
        let snapshot: RemoteSnapshot = vec![
            ("p/x".to_string(), Some("f".to_string())),
            ("p/y".to_string(), Some("f".to_string())),
        ]
        .into_iter()
        .collect();

        let mut fingerprinter = MockFingerprinter::new();
        fingerprinter.expect_fingerprint().times(0);

        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = SyncPlanner::new(Arc::new(fingerprinter))
            .cancel_flag(cancel)
            .plan(vec![local("p/x", 1), local("p/y", 2)], &snapshot);
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(PlanReason::New.to_string(), "new");
        assert_eq!(PlanReason::Changed.to_string(), "changed");
        assert_eq!(PlanReason::Unchanged.to_string(), "unchanged");
    }
}
