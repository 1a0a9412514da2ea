//! Run lifecycle for one container.
//!
//! A run writes the environment transport files, starts the container,
//! and removes the files again whatever the container's outcome. Cleanup
//! problems are logged and never change the exit status the caller sees.

mod command;
pub mod transport;

use std::ffi::OsString;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::services::{EnvService, FileService, ShellService};

pub use transport::{TransportContents, TransportFiles};

/// Exit status reported when the run cannot get as far as starting the container.
const SETUP_FAILURE: i32 = 1;

/// A display counts as available whenever `DISPLAY` exists, even if empty.
fn display_present(value: Option<OsString>) -> bool {
    value.is_some()
}

fn display_is_set() -> bool {
    display_present(std::env::var_os("DISPLAY"))
}

pub struct Driver<S, F> {
    shell: S,
    files: F,
    display_probe: fn() -> bool,
}

impl<S: ShellService, F: FileService> Driver<S, F> {
    pub fn new(shell: S, files: F) -> Self {
        Self::with_display_probe(shell, files, display_is_set)
    }

    /// Driver with a custom check for a graphical display.
    pub fn with_display_probe(shell: S, files: F, display_probe: fn() -> bool) -> Self {
        Self {
            shell,
            files,
            display_probe,
        }
    }

    /// Run the configured container with the environment from `env`.
    ///
    /// Returns the container's exit status unchanged. If the transport files
    /// cannot be written, nothing is executed and the status is non-zero.
    pub fn handle_run(&self, config: &Config, run_id: &str, env: &dyn EnvService) -> i32 {
        let files = TransportFiles::for_run(config.tmp_dir(), run_id);
        let contents = TransportContents::render(&env.list_assignments());
        info!(run_id, image = config.image(), "driver:run start");

        for (path, content) in contents.by_file(&files) {
            if let Err(e) = self.files.write(path, content) {
                error!(path = %path.display(), error = ?e, "driver:failed to write environment file");
                self.remove_transport_files(&files);
                return SETUP_FAILURE;
            }
        }
        debug!(
            plain = %files.plain.display(),
            multiline = %files.multiline.display(),
            bash_functions = %files.bash_functions.display(),
            "driver:environment files written"
        );

        let container_name = config.container_name().unwrap_or(run_id);
        let cmd = self.construct_run_cmd(config, &files, container_name);
        info!(command = %cmd, "driver:running container");

        let exit_code = self.execute(&cmd);
        self.remove_transport_files(&files);

        info!(run_id, exit_code, "driver:run finished");
        exit_code
    }

    /// Pull the configured image.
    pub fn handle_pull(&self, config: &Config) -> i32 {
        let cmd = self.construct_pull_cmd(config);
        info!(command = %cmd, "driver:pulling image");
        let exit_code = self.execute(&cmd);
        info!(exit_code, "driver:pull finished");
        exit_code
    }

    /// Remove the transport files of `run_id`, whether or not they exist.
    /// Always reports success.
    pub fn clean_after_run(&self, config: &Config, run_id: &str) -> i32 {
        debug!(run_id, "driver:cleaning up after run");
        self.remove_transport_files(&TransportFiles::for_run(config.tmp_dir(), run_id));
        0
    }

    fn execute(&self, cmd: &str) -> i32 {
        match self.shell.execute(cmd) {
            Ok(exit_code) => exit_code,
            Err(e) => {
                error!(error = ?e, "driver:failed to start command");
                SETUP_FAILURE
            }
        }
    }

    fn remove_transport_files(&self, files: &TransportFiles) {
        for path in files.removal_order() {
            if let Err(e) = self.files.remove(path) {
                warn!(path = %path.display(), error = %e, "driver:failed to remove environment file");
            }
        }
    }
}
