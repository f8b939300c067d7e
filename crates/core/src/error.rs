//! Error types for sync-core
//!
//! Structural errors (missing config, invalid root folder) abort a run before
//! any work starts. Per-file errors are carried as [`Error::Fingerprint`] and
//! [`Error::Upload`] and end up in the transfer report instead of aborting.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for sync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration store could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upload root is missing or not a directory
    #[error("Invalid folder: {0}")]
    Walk(String),

    /// Local file could not be hashed
    #[error("Failed to fingerprint {}: {source}", path.display())]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store rejected an upload
    #[error("Upload of '{key}' failed: {message}")]
    Upload { key: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Run was cancelled by the user
    #[error("Interrupted")]
    Interrupted,

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Walk(_) => 2, // UsageError
            Error::Network(_) | Error::Upload { .. } => 3, // NetworkError
            Error::Auth(_) => 4,                    // AuthError
            Error::NotFound(_) => 5,                // NotFound
            Error::Interrupted => 130,              // Interrupted
            _ => 1,                                 // GeneralError
        }
    }

    /// Whether this error only affects a single file of a sync pass
    pub const fn is_per_file(&self) -> bool {
        matches!(self, Error::Fingerprint { .. } | Error::Upload { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::Config("test".into()).exit_code(), 2);
        assert_eq!(Error::Walk("test".into()).exit_code(), 2);
        assert_eq!(Error::Network("test".into()).exit_code(), 3);
        assert_eq!(Error::Auth("test".into()).exit_code(), 4);
        assert_eq!(Error::NotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::Interrupted.exit_code(), 130);
        assert_eq!(Error::General("test".into()).exit_code(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Upload {
            key: "project/a.txt".into(),
            message: "access denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "Upload of 'project/a.txt' failed: access denied"
        );

        let err = Error::Fingerprint {
            path: PathBuf::from("/tmp/x.bin"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/x.bin"));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_per_file_classification() {
        assert!(Error::Upload {
            key: "k".into(),
            message: "m".into()
        }
        .is_per_file());
        assert!(!Error::Walk("missing".into()).is_per_file());
        assert!(!Error::Config("bad".into()).is_per_file());
    }
}
