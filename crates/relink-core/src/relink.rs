//! End-to-end relink pipeline.
//!
//! A single run is a linear, single-threaded pipeline over one wheel:
//! unpack into scratch space, locate the dependency and dependent libraries,
//! decode the dependency's mangled name, rewrite the dependent's embedded
//! placeholder under the exact-length invariant, refresh `RECORD`, repack.
//!
//! All mutation happens on the unpacked copy inside a [`tempfile::TempDir`];
//! the input wheel is read-only for the whole run and the scratch tree is
//! reclaimed on every exit path, success or failure. Any failing step aborts
//! the run; a half-patched tree is never repacked, so no partial output
//! artifact is ever written.

use crate::archive;
use crate::error::{Error, Result};
use crate::locate;
use crate::name::MangledName;
use crate::patch::{self, PatchSpec};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory-name suffix of the wheel's bundled-library folder
const LIBS_SUFFIX: &str = ".libs";

/// Configuration for one relink run.
///
/// Everything that parameterizes the pipeline is carried here as an explicit
/// value; there is no ambient global state.
#[derive(Debug, Clone)]
pub struct RelinkConfig {
    /// Filename prefix identifying the dependency library whose mangled tag
    /// must be propagated (the renamed device plugin)
    pub dependency_prefix: String,
    /// Filename prefix identifying the dependent library that embeds the
    /// stale placeholder reference
    pub dependent_prefix: String,
    /// The reserved sentinel token baked into the dependent binary at build
    /// time; the embedded placeholder is `-<token><suffix>` and must have
    /// the same byte length as the real `-<tag><suffix>` fragment
    pub placeholder_token: String,
    /// Where the output wheel is written; defaults to the input's directory
    pub output_dir: Option<PathBuf>,
    /// Run the whole pipeline in scratch space but write no output
    pub dry_run: bool,
}

impl Default for RelinkConfig {
    fn default() -> Self {
        Self {
            dependency_prefix: "libOpenImageDenoise_device_".to_string(),
            dependent_prefix: "libOpenImageDenoise_core".to_string(),
            placeholder_token: "reserved".to_string(),
            output_dir: None,
            dry_run: false,
        }
    }
}

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelinkOutcome {
    /// The placeholder was found and rewritten
    Patched,
    /// The dependent binary already carries the real tag fragment; the run
    /// short-circuited without touching anything
    AlreadyRelinked,
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RelinkReport {
    /// Decoded mangled name of the dependency library
    pub dependency: MangledName,
    /// Filename of the dependent library that was (or had been) patched
    pub dependent: String,
    /// Number of placeholder occurrences rewritten (zero for a no-op run)
    pub occurrences: usize,
    /// How the run ended
    pub outcome: RelinkOutcome,
    /// Path of the output wheel, when one was written
    pub output: Option<PathBuf>,
}

impl fmt::Display for RelinkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            RelinkOutcome::Patched => write!(
                f,
                "relinked '{}' against '{}' ({} occurrence(s))",
                self.dependent,
                self.dependency.file_name(),
                self.occurrences
            ),
            RelinkOutcome::AlreadyRelinked => write!(
                f,
                "'{}' already references '{}', nothing to do",
                self.dependent,
                self.dependency.file_name()
            ),
        }
    }
}

/// Drives the relink pipeline for one wheel at a time
#[derive(Debug, Clone)]
pub struct Relinker {
    config: RelinkConfig,
}

impl Default for Relinker {
    fn default() -> Self {
        Self::new(RelinkConfig::default())
    }
}

impl Relinker {
    /// Creates a relinker with the given configuration
    pub fn new(config: RelinkConfig) -> Self {
        Self { config }
    }

    /// Runs the full pipeline on the wheel at `wheel_path`.
    ///
    /// On success the output wheel is written beside the input (or into the
    /// configured output directory) with the same file name. On any failure
    /// the input is left untouched and no output is produced. The scratch
    /// directory is reclaimed in both cases when the `TempDir` drops.
    pub fn run(&self, wheel_path: &Path) -> Result<RelinkReport> {
        let wheel_name = wheel_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::internal(format!("not a wheel path: {}", wheel_path.display())))?
            .to_string();

        let scratch = tempfile::TempDir::new()
            .map_err(|e| Error::directory_create(std::env::temp_dir(), e))?;
        let root = scratch.path().join("wheel");

        info!("recomposing {}", wheel_path.display());
        archive::unpack(wheel_path, &root)?;

        let libs = locate::find_dir_by_suffix(&root, LIBS_SUFFIX)?;
        let dependency = locate::find_by_prefix(&libs.path, &self.config.dependency_prefix)?;
        let dependent = locate::find_by_prefix(&libs.path, &self.config.dependent_prefix)?;

        let mangled = MangledName::decode(&dependency.file_name)?;
        debug!(
            "dependency '{}': base '{}', tag '{}', version '{}'",
            mangled, mangled.base, mangled.tag, mangled.version
        );

        let needle = format!(
            "-{}{}",
            self.config.placeholder_token,
            mangled.grammar.fragment_suffix()
        );
        let replacement = mangled.reference_fragment();
        // Unequal lengths are fatal here, before anything is written.
        let spec = PatchSpec::new(needle.as_bytes(), replacement.as_bytes())?;

        if !patch::contains(&dependent.path, spec.needle())? {
            // Idempotence policy: a binary that already carries the real
            // tag fragment is a successful no-op; one that carries neither
            // the placeholder nor the tag is broken input.
            if patch::contains(&dependent.path, spec.replacement())? {
                info!(
                    "'{}' already references '{}'",
                    dependent.file_name, replacement
                );
                return Ok(RelinkReport {
                    dependency: mangled,
                    dependent: dependent.file_name,
                    occurrences: 0,
                    outcome: RelinkOutcome::AlreadyRelinked,
                    output: None,
                });
            }
            return Err(Error::placeholder_missing(&dependent.path));
        }

        let occurrences = patch::patch_file(&dependent.path, &spec)?;
        info!(
            "rewrote '{}' -> '{}' in '{}' ({} occurrence(s))",
            needle, replacement, dependent.file_name, occurrences
        );

        let dependent_relative = format!("{}/{}", libs.file_name, dependent.file_name);
        archive::update_record(&root, &dependent_relative)?;

        // Repack fully inside scratch, then persist in one move, so a
        // failure mid-repack leaves nothing beside the input.
        let staged = scratch.path().join(&wheel_name);
        archive::repack(&root, &staged)?;

        let output = if self.config.dry_run {
            info!("dry run, discarding {}", staged.display());
            None
        } else {
            let out_dir = match &self.config.output_dir {
                Some(dir) => dir.clone(),
                None => wheel_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
            };
            fs::create_dir_all(&out_dir).map_err(|e| Error::directory_create(&out_dir, e))?;
            let dest = out_dir.join(&wheel_name);
            persist(&staged, &dest)?;
            info!("wrote {}", dest.display());
            Some(dest)
        };

        Ok(RelinkReport {
            dependency: mangled,
            dependent: dependent.file_name,
            occurrences,
            outcome: RelinkOutcome::Patched,
            output,
        })
    }
}

/// Moves the staged wheel to its final destination.
///
/// The scratch directory usually lives on a different filesystem than the
/// output directory, so a direct rename can fail; the fallback copies into
/// a temporary file inside the destination directory and renames it into
/// place only once the copy has fully completed. An interrupted copy
/// removes the temporary file and never leaves anything at `dest`.
fn persist(staged: &Path, dest: &Path) -> Result<()> {
    if fs::rename(staged, dest).is_ok() {
        return Ok(());
    }

    let dest_dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dest_dir)
        .map_err(|e| Error::file_write(dest, e))?;
    fs::copy(staged, tmp.path()).map_err(|e| Error::file_write(dest, e))?;
    tmp.persist(dest).map_err(|e| Error::file_write(dest, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::entry_contents;
    use pretty_assertions::assert_eq;
    use sha2::{Digest, Sha256};

    const DEPENDENCY: &str = "libPlugin_cpu-deadbeef.so.2.0.0";
    const DEPENDENT: &str = "libCore-deadbeef.so.2.0.0";

    fn test_config() -> RelinkConfig {
        RelinkConfig {
            dependency_prefix: "libPlugin_".to_string(),
            dependent_prefix: "libCore".to_string(),
            placeholder_token: "reserved".to_string(),
            output_dir: None,
            dry_run: false,
        }
    }

    /// Builds a synthetic wheel: a dependent binary embedding the
    /// placeholder, a mangled dependency, an untouched bystander and a
    /// dist-info with a consistent RECORD.
    fn build_wheel(dir: &Path) -> PathBuf {
        let tree = dir.join("tree");
        let libs = tree.join("pkg.libs");
        let info = tree.join("pkg-2.0.0.dist-info");
        fs::create_dir_all(&libs).unwrap();
        fs::create_dir_all(&info).unwrap();

        let dependent_bytes = b"\x7fELF\x01\x02libPlugin_cpu-reserved.so\x00tail".to_vec();
        fs::write(libs.join(DEPENDENT), &dependent_bytes).unwrap();
        fs::write(libs.join(DEPENDENCY), b"\x7fELF plugin payload").unwrap();
        fs::write(libs.join("libtbb.so.12"), b"\x7fELF bystander").unwrap();

        fs::write(info.join("METADATA"), "Name: pkg\nVersion: 2.0.0\n").unwrap();
        let digest = base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            Sha256::digest(&dependent_bytes),
        );
        fs::write(
            info.join("RECORD"),
            format!(
                "pkg.libs/{DEPENDENT},sha256={digest},{}\n\
                 pkg.libs/{DEPENDENCY},sha256=aaaa,19\n\
                 pkg.libs/libtbb.so.12,sha256=bbbb,14\n\
                 pkg-2.0.0.dist-info/METADATA,sha256=cccc,25\n\
                 pkg-2.0.0.dist-info/RECORD,,\n",
                dependent_bytes.len()
            ),
        )
        .unwrap();

        let wheel = dir.join("input").join("pkg-2.0.0-cp311-none-any.whl");
        fs::create_dir_all(wheel.parent().unwrap()).unwrap();
        archive::repack(&tree, &wheel).unwrap();
        wheel
    }

    #[test]
    fn test_end_to_end_patch() {
        let dir = tempfile::TempDir::new().unwrap();
        let wheel = build_wheel(dir.path());
        let out_dir = dir.path().join("out");

        let mut config = test_config();
        config.output_dir = Some(out_dir.clone());
        let report = Relinker::new(config).run(&wheel).unwrap();

        assert_eq!(report.outcome, RelinkOutcome::Patched);
        assert_eq!(report.occurrences, 1);
        assert_eq!(report.dependency.tag, "deadbeef");
        assert_eq!(report.dependent, DEPENDENT);
        let output = report.output.unwrap();
        assert_eq!(output, out_dir.join("pkg-2.0.0-cp311-none-any.whl"));

        let input_entries = entry_contents(&wheel).unwrap();
        let output_entries = entry_contents(&output).unwrap();
        assert_eq!(input_entries.len(), output_entries.len());

        for ((in_name, in_data), (out_name, out_data)) in
            input_entries.iter().zip(output_entries.iter())
        {
            assert_eq!(in_name, out_name);
            match in_name.as_str() {
                name if name == format!("pkg.libs/{DEPENDENT}") => {
                    // Placeholder rewritten, length untouched
                    assert_eq!(
                        out_data,
                        &b"\x7fELF\x01\x02libPlugin_cpu-deadbeef.so\x00tail".to_vec()
                    );
                    assert_eq!(in_data.len(), out_data.len());
                }
                "pkg-2.0.0.dist-info/RECORD" => {
                    let record = String::from_utf8(out_data.clone()).unwrap();
                    let expected_digest = base64::Engine::encode(
                        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                        Sha256::digest(b"\x7fELF\x01\x02libPlugin_cpu-deadbeef.so\x00tail"),
                    );
                    assert!(record.contains(&expected_digest));
                    // Every other line carried over verbatim
                    assert!(record.contains("pkg.libs/libtbb.so.12,sha256=bbbb,14"));
                }
                _ => {
                    // Every byte of every other file is identical
                    assert_eq!(in_data, out_data, "entry {in_name} changed");
                }
            }
        }
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let dir = tempfile::TempDir::new().unwrap();
        let wheel = build_wheel(dir.path());
        let out_dir = dir.path().join("out");

        let mut config = test_config();
        config.output_dir = Some(out_dir.clone());
        let relinker = Relinker::new(config);

        let first = relinker.run(&wheel).unwrap();
        assert_eq!(first.outcome, RelinkOutcome::Patched);

        let second = relinker.run(&first.output.unwrap()).unwrap();
        assert_eq!(second.outcome, RelinkOutcome::AlreadyRelinked);
        assert_eq!(second.occurrences, 0);
        assert!(second.output.is_none());
    }

    #[test]
    fn test_missing_dependency_aborts_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let wheel = build_wheel(dir.path());
        let before = fs::read(&wheel).unwrap();

        let mut config = test_config();
        config.dependency_prefix = "libMissing_".to_string();
        config.output_dir = Some(dir.path().join("out"));

        match Relinker::new(config).run(&wheel) {
            Err(Error::ArtifactNotFound { prefix, .. }) => assert_eq!(prefix, "libMissing_"),
            other => panic!("expected ArtifactNotFound, got {other:?}"),
        }
        // Input untouched, no partial output written
        assert_eq!(fs::read(&wheel).unwrap(), before);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_placeholder_absent_without_tag_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let wheel = build_wheel(dir.path());

        // A placeholder token that never occurs in the dependent binary, with
        // the right length so the spec itself is valid (8 bytes, like the tag)
        let mut config = test_config();
        config.placeholder_token = "sentinel".to_string();
        config.output_dir = Some(dir.path().join("out"));

        match Relinker::new(config).run(&wheel) {
            Err(Error::PlaceholderMissing { .. }) => {}
            other => panic!("expected PlaceholderMissing, got {other:?}"),
        }
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_length_mismatch_aborts_before_any_write() {
        let dir = tempfile::TempDir::new().unwrap();
        let wheel = build_wheel(dir.path());
        let before = fs::read(&wheel).unwrap();

        // Token longer than the 8-byte tag: the spec is rejected up front.
        let mut config = test_config();
        config.placeholder_token = "reserved_token".to_string();
        config.output_dir = Some(dir.path().join("out"));

        match Relinker::new(config).run(&wheel) {
            Err(Error::LengthMismatch {
                needle_len,
                replacement_len,
            }) => {
                assert_eq!(needle_len, "-reserved_token.so".len());
                assert_eq!(replacement_len, "-deadbeef.so".len());
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
        assert_eq!(fs::read(&wheel).unwrap(), before);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_failed_persist_leaves_nothing_at_destination() {
        let dir = tempfile::TempDir::new().unwrap();
        let out_dir = dir.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        let dest = out_dir.join("pkg-2.0.0-cp311-none-any.whl");

        // A staged wheel that vanishes mid-persist: the rename fails, and
        // so does the fallback copy. The destination path must stay empty
        // and no temporary file may linger in the output directory.
        let staged = dir.path().join("missing.whl");
        match persist(&staged, &dest) {
            Err(Error::FileWrite { path, .. }) => assert_eq!(path, dest),
            other => panic!("expected FileWrite, got {other:?}"),
        }
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let wheel = build_wheel(dir.path());
        let before = fs::read(&wheel).unwrap();

        let mut config = test_config();
        config.dry_run = true;
        let report = Relinker::new(config).run(&wheel).unwrap();

        assert_eq!(report.outcome, RelinkOutcome::Patched);
        assert!(report.output.is_none());
        assert_eq!(fs::read(&wheel).unwrap(), before);
    }
}
