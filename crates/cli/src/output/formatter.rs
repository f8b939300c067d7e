//! Human-readable and JSON output
//!
//! Results go to stdout; errors, warnings and per-file failures go to
//! stderr. In JSON mode the only thing on stdout is the final document.

use comfy_table::Table;
use console::style;
use serde::Serialize;
use sync_core::{PlanAction, TransferFailure};

use super::OutputConfig;

/// Byte count in binary units, as shown in every summary and table
pub fn format_bytes(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

#[derive(Debug, Clone, Copy)]
enum Marker {
    Success,
    Error,
    Warning,
}

impl Marker {
    fn symbol(self) -> &'static str {
        match self {
            Marker::Success => "✓",
            Marker::Error => "✗",
            Marker::Warning => "⚠",
        }
    }
}

/// Formatter for CLI output
///
/// When JSON mode is enabled, all output is strict JSON without colors or
/// progress.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    fn marker(&self, marker: Marker) -> String {
        let symbol = marker.symbol();
        if !self.colors_enabled() {
            return symbol.to_string();
        }
        match marker {
            Marker::Success => style(symbol).green().to_string(),
            Marker::Error => style(symbol).red().to_string(),
            Marker::Warning => style(symbol).yellow().to_string(),
        }
    }

    /// Output a success message; silent in quiet and JSON mode
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        println!("{} {message}", self.marker(Marker::Success));
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({ "error": message });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
        } else {
            eprintln!("{} {message}", self.marker(Marker::Error));
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        eprintln!("{} {message}", self.marker(Marker::Warning));
    }

    /// Print per-file failures as `key: error`
    ///
    /// Skipped in JSON mode, where failures are part of the document.
    pub fn failures(&self, failures: &[TransferFailure]) {
        if self.config.json {
            return;
        }
        for failure in failures {
            eprintln!(
                "{} {}: {}",
                self.marker(Marker::Error),
                failure.key,
                failure.error
            );
        }
    }

    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }

    pub fn table(&self, table: &Table) {
        self.println(&table.to_string());
    }

    /// One line of a dry-run listing: action, key, then a dimmed detail
    pub fn plan_line(&self, action: PlanAction, key: &str, detail: &str) -> String {
        let label = match action {
            PlanAction::Upload => "upload",
            PlanAction::Skip => "skip",
        };
        let label = format!("{label:<6}");
        if !self.colors_enabled() {
            return format!("{label} {key} {detail}");
        }
        let label = match action {
            PlanAction::Upload => style(label).green(),
            PlanAction::Skip => style(label).dim(),
        };
        format!("{label} {key} {}", style(detail).dim())
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Formatter {
        Formatter::new(OutputConfig {
            no_color: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_formatter_default() {
        let formatter = Formatter::default();
        assert!(!formatter.is_json());
        assert!(formatter.colors_enabled());
    }

    #[test]
    fn test_formatter_json_mode() {
        let config = OutputConfig {
            json: true,
            ..Default::default()
        };
        let formatter = Formatter::new(config);
        assert!(formatter.is_json());
        assert!(!formatter.colors_enabled());
    }

    #[test]
    fn test_formatter_no_color() {
        let formatter = plain();
        assert!(!formatter.colors_enabled());
        assert_eq!(formatter.marker(Marker::Error), "✗");
        assert_eq!(formatter.marker(Marker::Success), "✓");
    }

    #[test]
    fn test_plan_line_pads_action() {
        let formatter = plain();
        assert_eq!(
            formatter.plan_line(PlanAction::Upload, "project/a.txt", "(new, 10 B)"),
            "upload project/a.txt (new, 10 B)"
        );
        assert_eq!(
            formatter.plan_line(PlanAction::Skip, "project/b.txt", "(unchanged, 20 B)"),
            "skip   project/b.txt (unchanged, 20 B)"
        );
    }

    #[test]
    fn test_format_bytes_is_binary() {
        assert_eq!(format_bytes(20), "20 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(25 * 1024 * 1024), "25 MiB");
    }
}
