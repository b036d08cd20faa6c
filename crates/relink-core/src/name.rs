//! Mangled library-name grammars.
//!
//! An external wheel-repair tool renames bundled shared libraries so that a
//! content hash ("tag") is embedded in each filename, e.g.
//! `libOpenImageDenoise_device_cpu-a1b2c3d4.so.2.3.0`. This module decodes
//! such names into structured fields and reconstructs them exactly.
//!
//! All knowledge of the mangling convention lives here: the repair tool's
//! scheme has changed over time, so the format variants are represented as a
//! small closed set of grammars tried in a fixed priority order, never as ad
//! hoc string surgery elsewhere in the pipeline.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Linux shared object: `<base>-<tag>.so.<major.minor.patch>`
static LINUX_SO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>[A-Za-z_]+)-(?P<tag>.+)\.so\.(?P<version>[0-9]+\.[0-9]+\.[0-9]+)$")
        .expect("invalid linux-so grammar")
});

/// macOS dylib: `<base>-<tag>.<major.minor.patch>.dylib`
static MAC_DYLIB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>[A-Za-z_]+)-(?P<tag>.+)\.(?P<version>[0-9]+\.[0-9]+\.[0-9]+)\.dylib$")
        .expect("invalid mac-dylib grammar")
});

/// The closed set of mangled-name formats, in decode priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameGrammar {
    /// `<base>-<tag>.so.<version>`
    LinuxSo,
    /// `<base>-<tag>.<version>.dylib`
    MacDylib,
}

impl NameGrammar {
    /// All grammars in the order `decode` tries them
    pub const PRIORITY: [NameGrammar; 2] = [NameGrammar::LinuxSo, NameGrammar::MacDylib];

    fn regex(self) -> &'static Regex {
        match self {
            NameGrammar::LinuxSo => &LINUX_SO,
            NameGrammar::MacDylib => &MAC_DYLIB,
        }
    }

    /// The shared-object suffix this grammar uses in an embedded reference
    /// fragment (`-<tag>.so` on Linux, `-<tag>.dylib` on macOS)
    pub fn fragment_suffix(self) -> &'static str {
        match self {
            NameGrammar::LinuxSo => ".so",
            NameGrammar::MacDylib => ".dylib",
        }
    }
}

/// A decoded mangled library filename.
///
/// Invariant: `base`, `tag` and `version` are all non-empty and
/// [`MangledName::file_name`] reconstructs the original filename exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MangledName {
    /// Logical library identity, e.g. `libOpenImageDenoise_device_cpu`
    pub base: String,
    /// Opaque uniqueness token inserted by the repair tool; may itself
    /// contain dots or hyphens
    pub tag: String,
    /// Dotted numeric version string, e.g. `2.3.0`
    pub version: String,
    /// Which grammar the filename matched
    pub grammar: NameGrammar,
}

impl MangledName {
    /// Decodes a mangled filename, trying each grammar in priority order.
    ///
    /// Matching is a single unambiguous full-string match per grammar; a
    /// filename that matches none of them fails with
    /// [`Error::MalformedName`] and never yields a partial result.
    pub fn decode(filename: &str) -> Result<Self> {
        for grammar in NameGrammar::PRIORITY {
            if let Some(caps) = grammar.regex().captures(filename) {
                // The character classes guarantee non-empty captures.
                return Ok(Self {
                    base: caps["base"].to_string(),
                    tag: caps["tag"].to_string(),
                    version: caps["version"].to_string(),
                    grammar,
                });
            }
        }
        Err(Error::malformed_name(filename))
    }

    /// Reconstructs the exact original filename (round-trip law)
    pub fn file_name(&self) -> String {
        match self.grammar {
            NameGrammar::LinuxSo => format!("{}-{}.so.{}", self.base, self.tag, self.version),
            NameGrammar::MacDylib => {
                format!("{}-{}.{}.dylib", self.base, self.tag, self.version)
            }
        }
    }

    /// The reference fragment a dependent binary embeds for this library,
    /// e.g. `-a1b2c3d4.so`.
    ///
    /// This is what replaces the build-time placeholder during the patch
    /// step; its byte length must equal the placeholder's.
    pub fn reference_fragment(&self) -> String {
        format!("-{}{}", self.tag, self.grammar.fragment_suffix())
    }
}

impl fmt::Display for MangledName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
