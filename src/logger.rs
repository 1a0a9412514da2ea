use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: OnceLock<()> = OnceLock::new();
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Log to the state-dir file (filtered by `RUST_LOG`, default info) and to
/// stderr at info, or debug when `debug` is set.
pub fn init(debug: bool) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    init_inner(debug)?;
    let _ = INIT.set(());
    Ok(())
}

fn init_inner(debug: bool) -> Result<()> {
    let log_path = determine_log_path(
        std::env::var("XDG_STATE_HOME").ok().as_deref(),
        home::home_dir(),
    )?;
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory at {}", parent.display()))?;
    }

    let (directory, file_name) = split_path(&log_path)?;
    let file_appender = rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_filter(env_filter),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_filter(stderr_level),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

fn determine_log_path(state_home: Option<&str>, home_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(state_home) = state_home
        && !state_home.is_empty()
    {
        return Ok(PathBuf::from(state_home).join("dojo").join("dojo.log"));
    }

    // XDG default: ~/.local/state/dojo/dojo.log
    if let Some(home_dir) = home_dir {
        return Ok(home_dir
            .join(".local")
            .join("state")
            .join("dojo")
            .join("dojo.log"));
    }

    Ok(std::env::current_dir()?.join("dojo.log"))
}

fn split_path(path: &Path) -> Result<(PathBuf, &str)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid log file name"))?;

    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((dir, file_name))
}
