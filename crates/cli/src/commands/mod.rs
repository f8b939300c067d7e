//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations.

use clap::{Args, Parser, Subcommand};
use sync_core::ExtensionFilter;

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

mod checkfolder;
mod completions;
mod configure;
mod upload;

/// sync-tool - mirror a local folder into an S3 bucket
///
/// Uploads new and changed files only; unchanged files are recognised by
/// their MD5 fingerprint and skipped.
#[derive(Parser, Debug)]
#[command(name = "sync-tool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set the default bucket and connection settings
    Configure(configure::ConfigureArgs),

    /// Show the size of each entry of a folder, largest first
    Checkfolder(checkfolder::CheckfolderArgs),

    /// Upload new and changed files of a folder to the configured bucket
    Upload(upload::UploadArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Extension filter shared by `checkfolder` and `upload`
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// File extensions to ignore, with or without the leading dot
    #[arg(short = 'i', long = "ignore-ext", value_name = "EXT", num_args = 1..)]
    pub ignore_ext: Vec<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> ExtensionFilter {
        ExtensionFilter::from_extensions(&self.ignore_ext)
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Configure(args) => configure::execute(args, output_config).await,
        Commands::Checkfolder(args) => checkfolder::execute(args, output_config).await,
        Commands::Upload(args) => upload::execute(args, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}
