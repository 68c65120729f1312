//! Shared command-line entry point of the backend executables
//!
//! Contract with the service: `--input <PATH>` names the artifact; the
//! label is printed as the only line on stdout; diagnostics go to stderr;
//! any failure exits non-zero.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

use glyph_common::BackendKind;

use crate::backend::default_ambiguity_margin;
use crate::Backend;

/// Arguments accepted by every backend executable
#[derive(Parser, Debug)]
#[command(version, about = "Classify a 28x28 glyph PNG and print its label")]
pub struct InferArgs {
    /// Path to the input 28x28 PNG
    #[arg(short, long)]
    pub input: PathBuf,

    /// Model weights (defaults to $GLYPH_<KIND>_MODEL, then models/ next to the executable)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Report the two best classes when their probabilities differ by less than this
    #[arg(long)]
    pub ambiguity_margin: Option<f32>,
}

/// Resolve the model path: CLI argument, environment variable, then executable directory
pub fn resolve_model_path(kind: BackendKind, cli_arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(kind.model_env_var()) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let exe = std::env::current_exe().context("cannot locate current executable")?;
    let exe_dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(exe_dir.join("models").join(kind.default_model_file()))
}

/// Logging goes to stderr so stdout carries only the label
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();
}

/// Run a backend executable for `kind`
pub fn run(kind: BackendKind) -> Result<()> {
    let args = InferArgs::parse();
    init_tracing();

    // Load the model before touching the input so a missing model fails fast
    let model_path = resolve_model_path(kind, args.model.as_deref())?;
    let mut backend = Backend::load(kind, &model_path)?
        .with_ambiguity_margin(args.ambiguity_margin.or(default_ambiguity_margin(kind)));

    if !args.input.exists() {
        anyhow::bail!("input file not found: {}", args.input.display());
    }

    let prediction = backend
        .classify_file(&args.input)
        .with_context(|| format!("{} inference failed", kind.display_name()))?;
    debug!(input = %args.input.display(), label = %prediction, "classified");

    println!("{}", prediction);
    Ok(())
}
