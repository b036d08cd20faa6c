//! Wheel archive round-trip.
//!
//! A wheel is a zip container; this module wraps the `zip` crate behind the
//! two operations the relink pipeline needs: unpack into a scratch tree and
//! repack the tree into a new wheel.
//!
//! Repacking is deterministic: entries are written in sorted path order with
//! a fixed timestamp, so unpack followed by repack with nothing patched in
//! between reproduces an archive whose entries are byte-identical. The
//! container format itself is consumed, never redefined, here.

mod record;

pub use record::update_record;

use crate::error::{Error, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Unpacks the wheel at `wheel` into `dest`.
///
/// Entry paths are validated against zip-slip: any entry that would resolve
/// outside `dest` fails the run with [`Error::PathTraversal`]. Unix file
/// modes stored in the archive are restored on unix hosts.
pub fn unpack(wheel: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(wheel).map_err(|e| Error::file_read(wheel, e))?;
    let mut archive = ZipArchive::new(file)?;

    debug!(
        "unpacking {} ({} entries) into {}",
        wheel.display(),
        archive.len(),
        dest.display()
    );

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(Error::path_traversal(entry.name()));
        };
        let out_path = dest.join(&relative);
        trace!("unpacking entry {}", entry.name());

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| Error::directory_create(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
        }

        let mut out_file =
            fs::File::create(&out_path).map_err(|e| Error::file_write(&out_path, e))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| Error::file_write(&out_path, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                .map_err(|e| Error::file_write(&out_path, e))?;
        }
    }

    Ok(())
}

/// Repacks the tree rooted at `dir` into a wheel at `out`.
///
/// Entries are added in sorted path order with a fixed timestamp and unix
/// modes taken from the filesystem, so the result does not depend on
/// directory enumeration order or wall-clock time.
pub fn repack(dir: &Path, out: &Path) -> Result<()> {
    let out_file = fs::File::create(out).map_err(|e| Error::file_write(out, e))?;
    let mut zip = ZipWriter::new(out_file);

    // Fixed epoch (1980-01-01) keeps the round trip reproducible.
    let base_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut entry_count = 0usize;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walkdir error"));
            Error::file_read(dir, source)
        })?;

        let path = entry.path();
        let relative = path
            .strip_prefix(dir)
            .map_err(|_| Error::internal("walked entry outside repack root"))?;
        let name = zip_entry_name(relative)?;

        let options = match unix_mode(path) {
            Some(mode) => base_options.unix_permissions(mode),
            None => base_options,
        };

        if path.is_dir() {
            trace!("repacking dir  {}", name);
            zip.add_directory(name, options)?;
        } else {
            trace!("repacking file {}", name);
            let data = fs::read(path).map_err(|e| Error::file_read(path, e))?;
            zip.start_file(name, options)?;
            zip.write_all(&data).map_err(|e| Error::file_write(out, e))?;
        }
        entry_count += 1;
    }

    zip.finish()?;
    debug!("repacked {} entries into {}", entry_count, out.display());
    Ok(())
}

/// Converts a relative filesystem path into a forward-slash zip entry name
fn zip_entry_name(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        let os = component.as_os_str();
        let part = os
            .to_str()
            .ok_or_else(|| Error::internal(format!("non-UTF-8 path component: {os:?}")))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn unix_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::symlink_metadata(path)
        .ok()
        .map(|m| m.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_path: &Path) -> Option<u32> {
    None
}

/// Reads every entry of the wheel at `path` into `(name, bytes)` pairs,
/// sorted by entry name.
///
/// Directory entries appear with empty content. Intended for comparing two
/// archives content-wise, ignoring container-level metadata.
pub fn entry_contents(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let file = fs::File::open(path).map_err(|e| Error::file_read(path, e))?;
    let mut archive = ZipArchive::new(file)?;

    let mut out = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let mut data = Vec::new();
        io::Read::read_to_end(&mut entry, &mut data)
            .map_err(|e| Error::file_read(path, e))?;
        out.push((entry.name().to_string(), data));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
