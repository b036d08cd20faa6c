//! relink - Repair mangled shared-library references inside Python wheels
//!
//! After a wheel-repair tool renames bundled shared libraries with embedded
//! hash tags, this tool rewrites the fixed-length placeholder reference one
//! bundled library holds to another, then repacks the wheel in place beside
//! the input.

use anyhow::{bail, Context, Result};
use clap::Parser;
use relink_core::{RelinkConfig, RelinkOutcome, Relinker};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Repair mangled shared-library references inside Python wheels
#[derive(Parser, Debug)]
#[command(name = "relink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the wheel to recompose
    wheel: PathBuf,

    /// Directory for the output wheel (defaults beside the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Filename prefix of the dependency library whose tag is propagated
    #[arg(long, default_value = "libOpenImageDenoise_device_")]
    dependency_prefix: String,

    /// Filename prefix of the dependent library holding the placeholder
    #[arg(long, default_value = "libOpenImageDenoise_core")]
    dependent_prefix: String,

    /// Placeholder token baked into the dependent binary at build time
    #[arg(long, default_value = "reserved")]
    placeholder: String,

    /// Run the full pipeline in scratch space without writing output
    #[arg(long)]
    dry_run: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if !cli.wheel.exists() {
        bail!("input wheel does not exist: {}", cli.wheel.display());
    }
    if !cli.wheel.is_file() {
        bail!("input path is not a file: {}", cli.wheel.display());
    }

    let config = RelinkConfig {
        dependency_prefix: cli.dependency_prefix,
        dependent_prefix: cli.dependent_prefix,
        placeholder_token: cli.placeholder,
        output_dir: cli.output_dir,
        dry_run: cli.dry_run,
    };

    let report = Relinker::new(config)
        .run(&cli.wheel)
        .with_context(|| format!("failed to recompose {}", cli.wheel.display()))?;

    println!("{report}");
    match report.outcome {
        RelinkOutcome::Patched => {
            if let Some(output) = &report.output {
                println!("Wrote {}", output.display());
            } else {
                println!("Dry run, no output written");
            }
        }
        RelinkOutcome::AlreadyRelinked => {}
    }

    Ok(())
}
