//! Integration tests for sync-tool against a live S3-compatible server
//!
//! Run with:
//! ```bash
//! # Any S3-compatible server works, e.g. MinIO
//! docker run -d --name minio -p 9000:9000 \
//!     -e MINIO_ROOT_USER=accesskey -e MINIO_ROOT_PASSWORD=secretkey \
//!     minio/minio server /data
//!
//! export TEST_S3_ENDPOINT=http://localhost:9000
//! export TEST_S3_BUCKET=sync-tool-test   # must exist
//! export AWS_ACCESS_KEY_ID=accesskey AWS_SECRET_ACCESS_KEY=secretkey
//! export AWS_REGION=us-east-1
//!
//! cargo test -p sync-tool --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn run_sync_tool(args: &[&str], config_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sync-tool"))
        .args(args)
        .env("SYNC_TOOL_CONFIG_DIR", config_dir)
        .output()
        .expect("Failed to execute sync-tool")
}

/// Get S3 test configuration from environment
fn get_test_config() -> Option<(String, String)> {
    let endpoint = std::env::var("TEST_S3_ENDPOINT").ok()?;
    let bucket = std::env::var("TEST_S3_BUCKET").ok()?;
    Some((endpoint, bucket))
}

/// Configure a scratch config dir; `None` skips the test
fn setup() -> Option<TempDir> {
    let (endpoint, bucket) = get_test_config()?;
    let config_dir = TempDir::new().ok()?;
    let output = run_sync_tool(
        &["configure", "--bucket", &bucket, "--endpoint", &endpoint],
        config_dir.path(),
    );
    if !output.status.success() {
        eprintln!(
            "Failed to configure: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return None;
    }
    Some(config_dir)
}

fn unique_folder(parent: &Path) -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    parent.join(format!("sync-tool-it-{nanos}"))
}

fn upload_json(root: &Path, config_dir: &Path) -> serde_json::Value {
    let output = run_sync_tool(
        &["upload", root.to_str().unwrap(), "--json", "--storage-class", "STANDARD"],
        config_dir,
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_second_upload_skips_everything() {
    let Some(config_dir) = setup() else {
        eprintln!("Skipping: TEST_S3_ENDPOINT / TEST_S3_BUCKET not set");
        return;
    };
    let work = TempDir::new().unwrap();
    let root = unique_folder(work.path());
    std::fs::create_dir_all(root.join("nested")).unwrap();
    std::fs::write(root.join("a.txt"), b"alpha").unwrap();
    std::fs::write(root.join("nested").join("b.txt"), b"bravo").unwrap();

    let first = upload_json(&root, config_dir.path());
    assert_eq!(first["report"]["uploaded_count"], 2);

    let second = upload_json(&root, config_dir.path());
    assert_eq!(second["report"]["uploaded_count"], 0);
    assert_eq!(second["report"]["skipped_count"], 2);

    std::fs::write(root.join("a.txt"), b"alpha, edited").unwrap();
    let third = upload_json(&root, config_dir.path());
    assert_eq!(third["report"]["uploaded_count"], 1);
    assert_eq!(third["report"]["skipped_count"], 1);
}

#[test]
fn test_multipart_upload_round_trip() {
    let Some(config_dir) = setup() else {
        eprintln!("Skipping: TEST_S3_ENDPOINT / TEST_S3_BUCKET not set");
        return;
    };
    let work = TempDir::new().unwrap();
    let root = unique_folder(work.path());
    std::fs::create_dir_all(&root).unwrap();
    // Above the default 25 MiB threshold: two parts
    std::fs::write(root.join("big.bin"), vec![7u8; 30 * 1024 * 1024]).unwrap();

    let first = upload_json(&root, config_dir.path());
    assert_eq!(first["report"]["uploaded_count"], 1);

    let second = upload_json(&root, config_dir.path());
    assert_eq!(second["report"]["skipped_count"], 1);
}
