//! CPS transform CLI.
//!
//! Transforms one or more surface-source files into their CPS-lowered
//! form, writing each result alongside its input as `<name>.cps.<ext>`
//! (matching `original_source/transform.py`'s `dofile`). Arguments may be
//! glob patterns; each file is transformed independently, so one file's
//! failure doesn't stop the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use cps_transform::{Options, SCHEDULER_RUNTIME};
use tracing::{error, info, warn};

/// CPS source-to-source transformer.
#[derive(Parser)]
#[command(name = "cps-transform", about = "Continuation-passing-style source-to-source transformer")]
struct Cli {
    /// Input files or glob patterns (e.g. `src/*.py`).
    paths: Vec<String>,

    /// Redirect continuation invocations through an external scheduler,
    /// bounding the native call stack (spec §4.5).
    #[arg(long)]
    trampoline: bool,

    /// Prefix identifying a function or call as CPS.
    #[arg(long, default_value = "cps_")]
    cps_prefix: String,

    /// Suffix inserted before the extension of each output file.
    #[arg(long, default_value = "cps")]
    suffix: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let files = match expand_paths(&cli.paths) {
        Ok(files) => files,
        Err(err) => {
            error!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if files.is_empty() {
        warn!("no input files matched");
        return ExitCode::SUCCESS;
    }

    let options = Options {
        cps_prefix: cli.cps_prefix.clone(),
        trampoline: cli.trampoline,
    };

    let mut failures = 0usize;
    for path in &files {
        if let Err(err) = transform_file(path, &options, &cli.suffix) {
            error!("error: {err}");
            failures += 1;
        }
    }

    if cli.trampoline && failures < files.len() {
        if let Err(err) = write_scheduler_runtime(&files) {
            error!("failed to write scheduler runtime: {err}");
            failures += 1;
        }
    }

    if failures > 0 {
        error!("{failures} of {} file(s) failed", files.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Expands glob patterns into a deduplicated, sorted file list. A pattern
/// that matches nothing, or isn't valid glob syntax, is an error rather
/// than a silent no-op — the caller asked for specific files.
fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for pattern in patterns {
        let mut matched = false;
        let entries = glob::glob(pattern).map_err(|err| format!("{pattern}: invalid glob pattern: {err}"))?;
        for entry in entries {
            let path = entry.map_err(|err| format!("{pattern}: {err}"))?;
            if path.is_file() {
                matched = true;
                files.push(path);
            }
        }
        if !matched {
            return Err(format!("{pattern}: no files matched"));
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn transform_file(path: &Path, options: &Options, suffix: &str) -> Result<(), cps_transform::TransformError> {
    info!(path = %path.display(), "transforming");
    let source = fs::read_to_string(path).map_err(|err| cps_transform::TransformError::io(err).with_path(path))?;
    let output = cps_transform::transform(&source, options).map_err(|err| err.with_path(path))?;
    let out_path = output_path(path, suffix);
    fs::write(&out_path, output).map_err(|err| cps_transform::TransformError::io(err).with_path(&out_path))?;
    info!(out = %out_path.display(), "wrote");
    Ok(())
}

/// `base.py` → `base.cps.py`, matching `original_source/transform.py`'s
/// `os.path.splitext` convention.
fn output_path(path: &Path, suffix: &str) -> PathBuf {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("py");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let mut out = path.to_path_buf();
    out.set_file_name(format!("{stem}.{suffix}.{ext}"));
    out
}

/// Bundles `scheduler.py` next to the first successfully transformed file
/// so trampolined output can `from scheduler import schedule, run`
/// (spec_full.md §5.1).
fn write_scheduler_runtime(files: &[PathBuf]) -> std::io::Result<()> {
    let dir = files[0].parent().unwrap_or_else(|| Path::new("."));
    fs::write(dir.join("scheduler.py"), SCHEDULER_RUNTIME)
}
