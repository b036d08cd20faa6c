//! Error types for the relink-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes. Every error aborts
//! the whole relink run: the pipeline is not idempotent against partial
//! completion, so there is no local recovery or retry.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for relink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all relink operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A filename does not match any known mangled-name grammar
    #[error("malformed mangled library name: '{name}'")]
    MalformedName {
        /// The filename that failed to decode
        name: String,
    },

    /// No entry in the library directory matched the requested prefix
    #[error("no library matching prefix '{prefix}' in '{dir}'")]
    ArtifactNotFound {
        /// The filename prefix that was searched for
        prefix: String,
        /// The directory that was scanned
        dir: PathBuf,
    },

    /// Needle and replacement byte lengths differ
    ///
    /// A substitution of unequal length would shift every downstream byte
    /// offset in the binary and corrupt it, so this is checked before any
    /// write and never silently coerced by truncating or padding.
    #[error(
        "patch length mismatch: needle is {needle_len} bytes, replacement is {replacement_len} bytes"
    )]
    LengthMismatch {
        /// Byte length of the needle
        needle_len: usize,
        /// Byte length of the replacement
        replacement_len: usize,
    },

    /// The placeholder byte sequence does not occur in the target binary
    #[error("placeholder not found in '{path}'")]
    PlaceholderMissing {
        /// The binary that was searched
        path: PathBuf,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An archive entry would escape the unpack destination (zip-slip)
    #[error("path traversal detected: archive entry '{path}' would escape unpack directory")]
    PathTraversal {
        /// The suspicious entry path
        path: PathBuf,
    },

    /// Underlying zip container failure during unpack or repack
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The unpacked wheel is missing a required structural directory
    #[error("wheel structure error: no directory ending in '{suffix}' under '{root}'")]
    WheelStructure {
        /// The directory-name suffix that was searched for
        suffix: String,
        /// The unpacked wheel root
        root: PathBuf,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new malformed-name error
    pub fn malformed_name(name: impl Into<String>) -> Self {
        Self::MalformedName { name: name.into() }
    }

    /// Creates a new artifact-not-found error
    pub fn artifact_not_found(prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self::ArtifactNotFound {
            prefix: prefix.into(),
            dir: dir.into(),
        }
    }

    /// Creates a new length-mismatch error
    pub fn length_mismatch(needle_len: usize, replacement_len: usize) -> Self {
        Self::LengthMismatch {
            needle_len,
            replacement_len,
        }
    }

    /// Creates a new placeholder-missing error
    pub fn placeholder_missing(path: impl Into<PathBuf>) -> Self {
        Self::PlaceholderMissing { path: path.into() }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new path traversal error
    pub fn path_traversal(path: impl Into<PathBuf>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Creates a new wheel structure error
    pub fn wheel_structure(suffix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::WheelStructure {
            suffix: suffix.into(),
            root: root.into(),
        }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::malformed_name("libfoo.whatever");
        assert!(err.to_string().contains("malformed"));
        assert!(err.to_string().contains("libfoo.whatever"));

        let err = Error::length_mismatch(12, 10);
        assert!(err.to_string().contains("12"));
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_artifact_not_found_names_dir() {
        let err = Error::artifact_not_found("libCore", "/tmp/wheel/pkg.libs");
        let msg = err.to_string();
        assert!(msg.contains("libCore"));
        assert!(msg.contains("pkg.libs"));
    }
}
