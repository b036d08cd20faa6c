//! Wheel `RECORD` maintenance.
//!
//! Every installable wheel carries a `RECORD` file in its `*.dist-info`
//! directory listing each payload file with its sha256 digest and size.
//! Patching a library's bytes invalidates its line, so the line is rewritten
//! with the fresh digest before the wheel is repacked.

use crate::error::{Error, Result};
use crate::locate;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Rewrites the `RECORD` line for `relative` (a forward-slash path from the
/// wheel root) with the file's current sha256 digest and size.
///
/// Returns true when a line was updated. A payload file absent from
/// `RECORD` is logged and left alone rather than invented: the repair tool
/// that produced the input wheel owns the full listing.
pub fn update_record(wheel_root: &Path, relative: &str) -> Result<bool> {
    let dist_info = locate::find_dir_by_suffix(wheel_root, ".dist-info")?;
    let record_file = dist_info.path.join("RECORD");

    let record =
        fs::read_to_string(&record_file).map_err(|e| Error::file_read(&record_file, e))?;

    let target = wheel_root.join(relative);
    let data = fs::read(&target).map_err(|e| Error::file_read(&target, e))?;
    let digest = URL_SAFE_NO_PAD.encode(Sha256::digest(&data));
    let new_line = format!(
        "{},sha256={digest},{}",
        quote_path(relative),
        data.len()
    );

    let mut updated = false;
    let lines: Vec<String> = record
        .lines()
        .map(|line| {
            if !updated && record_path(line) == Some(relative) {
                updated = true;
                debug!("RECORD entry refreshed: {new_line}");
                new_line.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !updated {
        warn!("'{relative}' has no RECORD entry, leaving RECORD unchanged");
        return Ok(false);
    }

    let mut out = lines.join("\n");
    if record.ends_with('\n') {
        out.push('\n');
    }
    fs::write(&record_file, out).map_err(|e| Error::file_write(&record_file, e))?;
    Ok(true)
}

/// Extracts the path field of a RECORD line.
///
/// Paths containing a comma are CSV-quoted in RECORD, so a quoted leading
/// field is unwrapped before comparison; everything else splits on the
/// first comma.
fn record_path(line: &str) -> Option<&str> {
    match line.strip_prefix('"') {
        Some(rest) => rest.find('"').map(|end| &rest[..end]),
        None => line.split(',').next(),
    }
}

/// Quotes a path for a RECORD line when it contains a comma
fn quote_path(path: &str) -> String {
    if path.contains(',') {
        format!("\"{path}\"")
    } else {
        path.to_string()
    }
}
