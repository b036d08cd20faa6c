//! Exact-length in-place binary patching.
//!
//! The dependent library carries a fixed-length placeholder reference to a
//! sibling library's filename, baked into its binary image at build time.
//! This module rewrites that placeholder with the real reference fragment.
//!
//! The binary is treated purely as an opaque byte sequence: no object-file
//! structure is parsed, and the substitution is a literal one. The single
//! load-bearing invariant is that needle and replacement have the same byte
//! length, so no offset anywhere else in the binary moves.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// An exact-length substitution: a placeholder `needle` and the
/// `replacement` that takes its place.
///
/// Construction fails with [`Error::LengthMismatch`] when the two byte
/// lengths differ; the mismatch is never coerced by truncating or padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSpec {
    needle: Vec<u8>,
    replacement: Vec<u8>,
}

impl PatchSpec {
    /// Creates a patch spec, enforcing the equal-length precondition
    /// before any I/O can happen.
    pub fn new(needle: impl Into<Vec<u8>>, replacement: impl Into<Vec<u8>>) -> Result<Self> {
        let needle = needle.into();
        let replacement = replacement.into();
        if needle.len() != replacement.len() {
            return Err(Error::length_mismatch(needle.len(), replacement.len()));
        }
        if needle.is_empty() {
            return Err(Error::internal("patch needle must be non-empty"));
        }
        Ok(Self {
            needle,
            replacement,
        })
    }

    /// The placeholder byte sequence
    pub fn needle(&self) -> &[u8] {
        &self.needle
    }

    /// The replacement byte sequence
    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }
}

/// Returns true if the file's byte content contains `needle`.
///
/// Callers use this to pre-check for the placeholder (or for an
/// already-applied replacement) before committing to a patch.
pub fn contains(path: &Path, needle: &[u8]) -> Result<bool> {
    let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Ok(find_subsequence(&data, needle).is_some())
}

/// Replaces every occurrence of the spec's needle in the file at `path`,
/// writing the result back to the same path.
///
/// Returns the number of occurrences replaced. Zero occurrences is
/// [`Error::PlaceholderMissing`]: callers that want replace-if-present
/// semantics pre-check with [`contains`]. The file's byte length is
/// unchanged by construction; nothing else on disk is touched.
pub fn patch_file(path: &Path, spec: &PatchSpec) -> Result<usize> {
    let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;
    debug!(
        "patching {} ({} bytes, digest {})",
        path.display(),
        data.len(),
        blake3::hash(&data).to_hex()
    );

    let (patched, occurrences) = replace_all(&data, spec);
    if occurrences == 0 {
        return Err(Error::placeholder_missing(path));
    }

    // Equal-length substitution cannot change the total size.
    debug_assert_eq!(patched.len(), data.len());

    fs::write(path, &patched).map_err(|e| Error::file_write(path, e))?;
    debug!(
        "patched {} occurrence(s), new digest {}",
        occurrences,
        blake3::hash(&patched).to_hex()
    );
    Ok(occurrences)
}

/// Replaces every occurrence of the needle, returning the new content and
/// the occurrence count
fn replace_all(data: &[u8], spec: &PatchSpec) -> (Vec<u8>, usize) {
    let needle = spec.needle();
    let mut out = Vec::with_capacity(data.len());
    let mut position = 0;
    let mut occurrences = 0;

    while let Some(relative) = find_subsequence(&data[position..], needle) {
        let absolute = position + relative;
        trace!("needle at offset {}", absolute);
        out.extend_from_slice(&data[position..absolute]);
        out.extend_from_slice(spec.replacement());
        position = absolute + needle.len();
        occurrences += 1;
    }
    out.extend_from_slice(&data[position..]);

    (out, occurrences)
}

/// Find a subsequence within a byte slice
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
