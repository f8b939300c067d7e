//! checkfolder command - Size report of a local folder
//!
//! Lists the immediate children of a folder with their sizes, largest
//! first, followed by the folder total.

use std::path::PathBuf;

use clap::Args;
use comfy_table::{CellAlignment, Table, presets};
use serde::Serialize;
use sync_core::inspect::{inspect_top, sort_by_size_desc, total_bytes};
use sync_core::SizeEntry;

use super::FilterArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, format_bytes};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Show the size of each entry of a folder
#[derive(Args, Debug)]
pub struct CheckfolderArgs {
    /// Folder to inspect
    pub path: PathBuf,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Output structure for checkfolder command (JSON format)
#[derive(Debug, Serialize)]
struct CheckfolderOutput {
    path: String,
    entries: Vec<SizeEntry>,
    total_bytes: u64,
}

impl CheckfolderOutput {
    fn new(path: String, mut entries: Vec<SizeEntry>) -> Self {
        sort_by_size_desc(&mut entries);
        Self {
            path,
            total_bytes: total_bytes(&entries),
            entries,
        }
    }
}

/// Execute the checkfolder command
pub async fn execute(args: CheckfolderArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let filter = args.filter.to_filter();

    let root = args.path.clone();
    let entries = match tokio::task::spawn_blocking(move || inspect_top(&root, &filter)).await {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
        Err(e) => {
            formatter.error(&format!("Size scan failed: {e}"));
            return ExitCode::GeneralError;
        }
    };

    let output = CheckfolderOutput::new(args.path.display().to_string(), entries);

    if formatter.is_json() {
        formatter.json(&output);
    } else {
        if !output.entries.is_empty() {
            formatter.table(&render_table(&output.entries));
        }
        formatter.println(&total_line(&output));
    }

    ExitCode::Success
}

fn render_table(entries: &[SizeEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_BORDERS_ONLY)
        .set_header(vec!["Name", "Size", "Bytes"]);

    for entry in entries {
        table.add_row(vec![
            entry.name.clone(),
            format_bytes(entry.size_bytes),
            entry.size_bytes.to_string(),
        ]);
    }

    for index in [1, 2] {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
    table
}

fn total_line(output: &CheckfolderOutput) -> String {
    format!(
        "Total size of '{}': {:.2} GB",
        output.path,
        output.total_bytes as f64 / GIB
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use sync_core::ExtensionFilter;
    use tempfile::TempDir;

    fn write(path: &Path, len: usize) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![1u8; len]).unwrap();
    }

    fn sample() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("data").join("d.bin"), 100);
        write(&temp.path().join("logs").join("1.log"), 100);
        write(&temp.path().join("logs").join("2.log"), 100);
        write(&temp.path().join("logs").join("3.log"), 100);
        temp
    }

    #[test]
    fn test_output_is_sorted_by_size() {
        let temp = sample();
        let entries = inspect_top(temp.path(), &ExtensionFilter::new()).unwrap();
        let output = CheckfolderOutput::new("project".to_string(), entries);

        insta::assert_json_snapshot!(output, @r#"
        {
          "path": "project",
          "entries": [
            {
              "name": "logs",
              "size_bytes": 300
            },
            {
              "name": "data",
              "size_bytes": 100
            }
          ],
          "total_bytes": 400
        }
        "#);
    }

    #[test]
    fn test_ignored_extension_shrinks_totals() {
        let temp = sample();
        let entries =
            inspect_top(temp.path(), &ExtensionFilter::from_extensions(["LOG"])).unwrap();
        let output = CheckfolderOutput::new("project".to_string(), entries);

        assert_eq!(output.entries[0].name, "data");
        assert_eq!(output.entries[1].size_bytes, 0);
        assert_eq!(output.total_bytes, 100);
    }

    #[test]
    fn test_table_lists_largest_first() {
        let temp = sample();
        let entries = inspect_top(temp.path(), &ExtensionFilter::new()).unwrap();
        let output = CheckfolderOutput::new("project".to_string(), entries);
        let rendered = render_table(&output.entries).to_string();

        let logs = rendered.find("logs").unwrap();
        let data = rendered.find("data").unwrap();
        assert!(logs < data);
        assert!(rendered.contains("300 B"));
        assert!(rendered.contains("Bytes"));
    }

    #[test]
    fn test_total_line() {
        let output = CheckfolderOutput::new(
            "media".to_string(),
            vec![SizeEntry {
                name: "big".to_string(),
                size_bytes: 3 * 1024 * 1024 * 1024 / 2,
            }],
        );
        assert_eq!(total_line(&output), "Total size of 'media': 1.50 GB");
    }
}
