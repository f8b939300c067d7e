//! Content fingerprints for change detection
//!
//! MD5 matches the content hash S3 reports for single-part uploads and is
//! what previous runs stored in object metadata. It is used only to decide
//! whether bytes changed, never for integrity or security.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Read block size used while hashing
pub const BLOCK_SIZE: usize = 4096;

/// Computes a fingerprint for a local file
#[cfg_attr(test, mockall::automock)]
pub trait Fingerprinter: Send + Sync {
    /// Lowercase hex digest of the file's bytes
    fn fingerprint(&self, path: &Path) -> Result<String>;
}

/// Streaming MD5 fingerprinter
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Fingerprinter;

impl Fingerprinter for Md5Fingerprinter {
    fn fingerprint(&self, path: &Path) -> Result<String> {
        fingerprint_file(path)
    }
}

/// Hash a file in [`BLOCK_SIZE`] blocks and return the lowercase hex digest
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let wrap = |source| Error::Fingerprint {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(wrap)?;
    let mut context = md5::Context::new();
    let mut buf = [0u8; BLOCK_SIZE];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(wrap(e)),
        };
        context.consume(&buf[..n]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Strip surrounding double quotes from a store-reported fingerprint
///
/// S3 returns ETags quoted (`"d41d8cd9..."`); metadata values are not.
pub fn normalize_remote(value: &str) -> &str {
    value.trim().trim_matches('"')
}
