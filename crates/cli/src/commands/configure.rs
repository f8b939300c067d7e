//! configure command - Persist the default bucket
//!
//! Without `--bucket` the bucket name is read from an interactive prompt.

use anyhow::{Context, bail};
use clap::Args;
use console::Term;
use serde::Serialize;
use sync_core::config::{KEY_BUCKET_NAME, KEY_ENDPOINT, KEY_REGION, KEY_STORAGE_CLASS};
use sync_core::{ConfigManager, ConfigStore};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

const PROMPT: &str = "Please enter the default AWS S3 bucket name";

/// Set the default bucket and connection settings
#[derive(Args, Debug, Default)]
pub struct ConfigureArgs {
    /// Bucket name; prompted for when omitted
    #[arg(long)]
    pub bucket: Option<String>,

    /// AWS region of the bucket
    #[arg(long)]
    pub region: Option<String>,

    /// Endpoint URL of an S3-compatible service
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Storage class for uploaded objects (e.g. STANDARD, ONEZONE_IA)
    #[arg(long)]
    pub storage_class: Option<String>,
}

#[derive(Debug, Serialize)]
struct ConfigureOutput {
    bucket_name: String,
    config_path: String,
}

/// Execute the configure command
pub async fn execute(args: ConfigureArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    match run(args) {
        Ok(output) => {
            if formatter.is_json() {
                formatter.json(&output);
            } else {
                formatter.success("AWS S3 bucket configuration saved.");
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to save configuration: {e:#}"));
            exit_code_for(&e)
        }
    }
}

fn run(args: ConfigureArgs) -> anyhow::Result<ConfigureOutput> {
    let manager = ConfigManager::new()?;
    let bucket = match &args.bucket {
        Some(bucket) => bucket.clone(),
        None => prompt_bucket().context("cannot read bucket name")?,
    };

    apply(&manager, &bucket, &args)?;
    tracing::info!(path = %manager.config_path().display(), "configuration saved");

    Ok(ConfigureOutput {
        bucket_name: bucket.trim().to_string(),
        config_path: manager.config_path().display().to_string(),
    })
}

/// Write every given setting to `store`
fn apply(store: &dyn ConfigStore, bucket: &str, args: &ConfigureArgs) -> anyhow::Result<()> {
    let bucket = bucket.trim();
    if bucket.is_empty() {
        bail!(sync_core::Error::Config("bucket name cannot be empty".into()));
    }
    store.set(KEY_BUCKET_NAME, bucket)?;

    let optional = [
        (KEY_REGION, &args.region),
        (KEY_ENDPOINT, &args.endpoint),
        (KEY_STORAGE_CLASS, &args.storage_class),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            store.set(key, value)?;
        }
    }
    Ok(())
}

fn prompt_bucket() -> std::io::Result<String> {
    let term = Term::stderr();
    term.write_str(&format!("{PROMPT}: "))?;
    term.read_line()
}

fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    error
        .downcast_ref::<sync_core::Error>()
        .map(ExitCode::from_error)
        .unwrap_or(ExitCode::GeneralError)
}
