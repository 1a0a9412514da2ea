//! Container engine command lines.
//!
//! The run command is assembled in one fixed order; optional segments only
//! ever occupy their own slot, so identical inputs give identical output.

use crate::config::Config;
use crate::services::{FileService, ShellService};

use super::Driver;
use super::transport::{BASH_FUNCTIONS_TARGET, MULTILINE_VARS_TARGET, TransportFiles};

pub const IDENTITY_TARGET: &str = "/dojo/identity";
pub const X11_SOCKET: &str = "/tmp/.X11-unix";

impl<S: ShellService, F: FileService> Driver<S, F> {
    /// Interactive flag resolution: explicit config wins, unset defers to the shell.
    pub fn is_interactive(&self, config: &Config) -> bool {
        config
            .interactive
            .unwrap_or_else(|| self.shell.is_interactive())
    }

    pub fn construct_run_cmd(
        &self,
        config: &Config,
        files: &TransportFiles,
        container_name: &str,
    ) -> String {
        let mut args: Vec<String> = vec![
            config.engine().binary().to_string(),
            "run".to_string(),
            "--rm".to_string(),
        ];

        args.push("-v".to_string());
        args.push(format!(
            "{}:{}",
            config.work_dir_outer().display(),
            config.work_dir_inner()
        ));

        args.push("-v".to_string());
        args.push(format!(
            "{}:{}:ro",
            config.identity_dir_outer().display(),
            IDENTITY_TARGET
        ));

        args.push("-v".to_string());
        args.push(format!(
            "{}:{}",
            files.multiline.display(),
            MULTILINE_VARS_TARGET
        ));

        args.push("-v".to_string());
        args.push(format!(
            "{}:{}",
            files.bash_functions.display(),
            BASH_FUNCTIONS_TARGET
        ));

        args.push(format!("--env-file={}", files.plain.display()));

        if (self.display_probe)() {
            args.push("-v".to_string());
            args.push(format!("{X11_SOCKET}:{X11_SOCKET}"));
        }

        if self.is_interactive(config) {
            args.push("-ti".to_string());
        }

        args.push(format!("--name={container_name}"));

        if let Some(options) = config.docker_options() {
            args.push(options.to_string());
        }

        args.push(config.image().to_string());

        if let Some(command) = config.command() {
            args.push(command.to_string());
        }

        args.join(" ")
    }

    pub fn construct_pull_cmd(&self, config: &Config) -> String {
        format!("{} pull {}", config.engine().binary(), config.image())
    }
}
