//! Locating artifacts inside an unpacked wheel tree.
//!
//! The wheel layout guarantees that all bundled shared libraries live flat in
//! a single `*.libs` directory, so lookups here scan exactly one directory
//! level and never recurse.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A read-only view of one entry inside the unpacked wheel tree.
///
/// Entries are never mutated except through the patcher, which rewrites the
/// backing file's bytes in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Absolute path of the entry inside the scratch tree
    pub path: PathBuf,
    /// The entry's filename
    pub file_name: String,
}

/// Finds the single library entry in `dir` whose filename starts with `prefix`.
///
/// Scans only the immediate contents of `dir`. If several entries qualify the
/// first one in directory-listing order wins (listing order is not otherwise
/// guaranteed, so callers must choose prefixes specific enough to be
/// unambiguous in practice); zero matches fail with
/// [`Error::ArtifactNotFound`].
pub fn find_by_prefix(dir: &Path, prefix: &str) -> Result<ArtifactEntry> {
    let mut matches = entries_matching(dir, |name| name.starts_with(prefix))?;

    if matches.is_empty() {
        return Err(Error::artifact_not_found(prefix, dir));
    }
    if matches.len() > 1 {
        warn!(
            "prefix '{}' is ambiguous in {} ({} matches), taking '{}'",
            prefix,
            dir.display(),
            matches.len(),
            matches[0].file_name
        );
    }

    let entry = matches.swap_remove(0);
    debug!("located '{}' for prefix '{}'", entry.file_name, prefix);
    Ok(entry)
}

/// Finds the single directory under `root` whose name ends with `suffix`.
///
/// Used to discover the wheel's `*.libs` library folder and `*.dist-info`
/// metadata folder without knowing the package name in advance.
pub fn find_dir_by_suffix(root: &Path, suffix: &str) -> Result<ArtifactEntry> {
    let matches = entries_matching(root, |name| name.ends_with(suffix))?;

    let mut dirs: Vec<ArtifactEntry> = matches
        .into_iter()
        .filter(|entry| entry.path.is_dir())
        .collect();

    if dirs.is_empty() {
        return Err(Error::wheel_structure(suffix, root));
    }
    if dirs.len() > 1 {
        warn!(
            "suffix '{}' is ambiguous in {} ({} matches), taking '{}'",
            suffix,
            root.display(),
            dirs.len(),
            dirs[0].file_name
        );
    }

    Ok(dirs.swap_remove(0))
}

/// Lists the immediate children of `dir` whose filename satisfies `pred`
fn entries_matching(
    dir: &Path,
    pred: impl Fn(&str) -> bool,
) -> Result<Vec<ArtifactEntry>> {
    let mut out = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walkdir error"));
            Error::file_read(dir, source)
        })?;

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };

        if pred(name) {
            out.push(ArtifactEntry {
                path: entry.path().to_path_buf(),
                file_name: name.to_string(),
            });
        }
    }

    Ok(out)
}
