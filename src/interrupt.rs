//! Ctrl-C handling while a container is running.
//!
//! The first interrupt reaches the container through the terminal's process
//! group, so the run is left to finish and clean up on its own. A second
//! interrupt removes the transport files immediately and exits.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::Config;
use crate::driver::Driver;
use crate::services::{BashShellService, LocalFileService};

/// Exit status of a process terminated by SIGINT.
const INTERRUPTED: i32 = 130;

static INTERRUPTS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    /// Let the container handle the signal and finish the run normally.
    Wait,
    /// Clean up now and exit with [`INTERRUPTED`].
    ForceExit,
}

/// Decide what to do given how many interrupts arrived before this one.
fn respond(previous: usize) -> Response {
    if previous == 0 {
        Response::Wait
    } else {
        Response::ForceExit
    }
}

pub fn install(config: &Config, run_id: &str) -> Result<()> {
    let config = config.clone();
    let run_id = run_id.to_string();

    ctrlc::set_handler(move || match respond(INTERRUPTS.fetch_add(1, Ordering::SeqCst)) {
        Response::Wait => {
            warn!(run_id = %run_id, "interrupt:waiting for container to exit, press Ctrl-C again to force");
        }
        Response::ForceExit => {
            warn!(run_id = %run_id, "interrupt:forced exit");
            Driver::new(BashShellService, LocalFileService).clean_after_run(&config, &run_id);
            std::process::exit(INTERRUPTED);
        }
    })
    .context("Failed to install interrupt handler")
}
