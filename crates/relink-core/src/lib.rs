//! # relink-core
//!
//! A library for repairing mangled shared-library references inside Python
//! wheels.
//!
//! After a wheel-repair tool bundles a native extension's shared-library
//! dependencies, it renames ("mangles") each library to embed a content-hash
//! tag in its filename. One bundled library carries, baked into its binary
//! image at build time, a fixed-length placeholder reference to a sibling
//! library's filename; once that sibling is renamed the reference is stale.
//! This crate rewrites the placeholder in place with the sibling's real tag,
//! without changing the binary's length or any other byte, and repacks the
//! wheel with full round-trip fidelity for everything not touched.
//!
//! ## Architecture
//!
//! - [`name`]: mangled-filename grammars (decode and exact reconstruction)
//! - [`locate`]: prefix lookup inside the unpacked wheel's flat library dir
//! - [`patch`]: exact-length, in-place literal byte substitution
//! - [`archive`]: deterministic wheel unpack/repack and `RECORD` upkeep
//! - [`relink`]: the orchestrator driving the whole pipeline
//! - [`error`]: error types and handling
//!
//! The dependent binary is treated purely as an opaque byte sequence; no
//! ELF or Mach-O structure is ever parsed.
//!
//! ## Example
//!
//! ```no_run
//! use relink_core::{RelinkConfig, Relinker};
//! use std::path::Path;
//!
//! let relinker = Relinker::new(RelinkConfig::default());
//! let report = relinker.run(Path::new("pkg-2.0.0-cp311-none-any.whl"))?;
//! println!("{report}");
//! # Ok::<(), relink_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod archive;
pub mod error;
pub mod locate;
pub mod name;
pub mod patch;
pub mod relink;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use locate::ArtifactEntry;
pub use name::{MangledName, NameGrammar};
pub use patch::PatchSpec;
pub use relink::{RelinkConfig, RelinkOutcome, RelinkReport, Relinker};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
