//! upload command - Sync a folder into the configured bucket
//!
//! Files whose MD5 fingerprint matches the stored one are skipped. Ctrl+C
//! stops the run between files and parts; unfinished multipart uploads are
//! aborted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use sync_core::{
    CancelFlag, ConfigManager, Error, Plan, PlanAction, PlanReason, PlanSummary, SyncEngine,
    SyncOutcome, SyncRequest, TransferConfig, TransferFailure, TransferReport,
};
use sync_s3::{S3Client, S3Settings};

use super::FilterArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, SyncProgress, format_bytes};

const NOT_CONFIGURED: &str = "No configuration found. Please run 'sync-tool configure'.";

/// Upload new and changed files
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Folder to upload; its name becomes the first segment of every key
    pub path: PathBuf,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Show what would be uploaded without uploading anything
    #[arg(long)]
    pub dry_run: bool,

    /// Storage class for uploaded objects (overrides the configured one)
    #[arg(long)]
    pub storage_class: Option<String>,

    /// Maximum uploads and parts in flight
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PlannedUpload {
    key: String,
    action: PlanAction,
    reason: PlanReason,
    size_bytes: u64,
}

/// Output structure for a dry run (JSON format)
#[derive(Debug, Serialize)]
struct DryRunOutput {
    dry_run: bool,
    entries: Vec<PlannedUpload>,
    failures: Vec<TransferFailure>,
    summary: PlanSummary,
}

impl From<Plan> for DryRunOutput {
    fn from(plan: Plan) -> Self {
        let summary = plan.summary();
        Self {
            dry_run: true,
            entries: plan
                .entries
                .iter()
                .map(|entry| PlannedUpload {
                    key: entry.key().to_string(),
                    action: entry.action,
                    reason: entry.reason,
                    size_bytes: entry.size_bytes(),
                })
                .collect(),
            failures: plan.failures,
            summary,
        }
    }
}

/// Output structure for a completed sync (JSON format)
#[derive(Debug, Serialize)]
struct UploadOutput {
    plan: PlanSummary,
    report: TransferReport,
}

/// Execute the upload command
pub async fn execute(args: UploadArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let manager = match ConfigManager::new() {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from_error(&e);
        }
    };
    let config = match manager.load() {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to load configuration: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    // Checked before any client is built so the message needs no credentials
    if config
        .bucket_name
        .as_deref()
        .is_none_or(|bucket| bucket.trim().is_empty())
    {
        formatter.println(NOT_CONFIGURED);
        return ExitCode::Success;
    }

    let client = match S3Client::new(S3Settings::from_config(&config)).await {
        Ok(c) => c,
        Err(e) => {
            formatter.error(&format!("Failed to create S3 client: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    let mut transfer = TransferConfig::from_settings(&config.transfer);
    if let Some(n) = args.concurrency {
        transfer = transfer.max_concurrent_transfers(n);
    }

    let cancel = CancelFlag::new();
    let engine = SyncEngine::new(Arc::new(client))
        .transfer_config(transfer)
        .storage_class(args.storage_class.clone())
        .cancel_flag(cancel.clone());

    let progress = Arc::new(SyncProgress::new(&output_config));
    let request = SyncRequest::new(&args.path, args.filter.to_filter()).dry_run(args.dry_run);

    let run = engine.run(&manager, request, progress.clone());
    tokio::pin!(run);
    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            progress.set_message("Cancelling, waiting for uploads in flight");
            run.await
        }
    };
    progress.finish_and_clear();

    match outcome {
        Ok(SyncOutcome::NotConfigured) => {
            formatter.println(NOT_CONFIGURED);
            ExitCode::Success
        }
        Ok(SyncOutcome::DryRun(plan)) => print_dry_run(&formatter, plan),
        Ok(SyncOutcome::Completed {
            plan_summary,
            report,
        }) => print_report(&formatter, plan_summary, report),
        Err(Error::Interrupted) => {
            formatter.warning("Upload interrupted before any file was transferred");
            ExitCode::Interrupted
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

fn print_dry_run(formatter: &Formatter, plan: Plan) -> ExitCode {
    let output = DryRunOutput::from(plan);

    if formatter.is_json() {
        formatter.json(&output);
    } else {
        for entry in &output.entries {
            let detail = format!("({}, {})", entry.reason, format_bytes(entry.size_bytes));
            formatter.println(&formatter.plan_line(entry.action, &entry.key, &detail));
        }
        formatter.println(&format!(
            "Would upload {} files ({}), skip {} files ({})",
            output.summary.upload_count,
            format_bytes(output.summary.upload_bytes),
            output.summary.skip_count,
            format_bytes(output.summary.skip_bytes),
        ));
        formatter.failures(&output.failures);
    }

    if output.failures.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}

fn print_report(formatter: &Formatter, plan: PlanSummary, report: TransferReport) -> ExitCode {
    let code = report_exit_code(&report);

    if formatter.is_json() {
        formatter.json(&UploadOutput { plan, report });
        return code;
    }

    formatter.println(&summary_line(&report));
    formatter.failures(&report.failures);
    if report.cancelled {
        formatter.warning("Upload interrupted; files not yet started were left out");
    } else if report.is_success() {
        formatter.success("Folder is in sync");
    }
    code
}

fn summary_line(report: &TransferReport) -> String {
    format!(
        "Uploaded {} files ({}), skipped {} unchanged files ({}), {} failed",
        report.uploaded_count,
        format_bytes(report.uploaded_bytes),
        report.skipped_count,
        format_bytes(report.skipped_bytes),
        report.failed_count(),
    )
}

fn report_exit_code(report: &TransferReport) -> ExitCode {
    if report.cancelled {
        ExitCode::Interrupted
    } else if !report.failures.is_empty() {
        ExitCode::GeneralError
    } else {
        ExitCode::Success
    }
}
