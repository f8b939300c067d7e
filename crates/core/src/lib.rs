//! sync-core: incremental folder-to-bucket sync engine
//!
//! This crate holds everything that does not depend on a particular object
//! store SDK:
//! - Configuration management
//! - Directory walking and extension filtering
//! - Content fingerprinting and two-phase upload planning
//! - Bounded-concurrency transfer execution
//! - The ObjectStore trait the S3 adapter implements

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod inspect;
pub mod multipart;
pub mod path;
pub mod plan;
pub mod traits;
pub mod transfer;
pub mod walk;

pub use config::{Config, ConfigManager, ConfigStore, MemoryConfigStore, TransferSettings};
pub use engine::{SyncEngine, SyncOutcome, SyncRequest};
pub use error::{Error, Result};
pub use filter::ExtensionFilter;
pub use fingerprint::{Fingerprinter, Md5Fingerprinter};
pub use inspect::{SizeEntry, inspect_top, sort_by_size_desc};
pub use plan::{Plan, PlanAction, PlanEntry, PlanReason, PlanSummary, SyncPlanner};
pub use traits::{CompletedPart, ObjectStore, PartUpload, RemoteSnapshot, UploadTarget};
pub use transfer::{
    CancelFlag, FileOutcome, NoProgress, ProgressSink, Stage, TransferConfig, TransferExecutor,
    TransferFailure, TransferReport,
};
pub use walk::{DirectoryWalker, LocalFile};
