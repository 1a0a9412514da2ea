use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info, warn};

use crate::config::{self, Config, ContainerEngine};
use crate::driver::Driver;
use crate::services::shell::shell_quote;
use crate::services::{BashShellService, LocalFileService, ProcessEnvService};
use crate::{interrupt, logger, run_id};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Run a container with the work directory and identity mounted
    Run,
    /// Pull the configured image
    Pull,
    /// Remove environment files left behind by an interrupted run
    Cleanup,
}

#[derive(Parser, Debug)]
#[command(author, version, long_about = None)]
#[command(name = "dojo")]
#[command(about = "Run commands in a reproducible docker environment")]
#[command(after_help = "Arguments after `--` are run inside the container instead of the image default.")]
struct Cli {
    /// Dojofile to read (default: ./Dojofile)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// What to do
    #[arg(short, long, value_enum, default_value_t = Action::Run)]
    action: Action,

    /// Container engine
    #[arg(short, long, value_enum)]
    driver: Option<ContainerEngine>,

    /// Allocate a terminal: true or false. Unset follows whether stdin is a terminal.
    #[arg(short, long, value_name = "BOOL")]
    interactive: Option<String>,

    /// Image reference (name:tag)
    #[arg(long)]
    image: Option<String>,

    /// Host directory mounted as the work directory (default: current directory)
    #[arg(short, long, value_name = "DIR")]
    work_dir_outer: Option<PathBuf>,

    /// Path of the work directory inside the container (default: /dojo/work)
    #[arg(long, value_name = "DIR")]
    work_dir_inner: Option<String>,

    /// Host directory mounted read-only as the identity (default: $HOME)
    #[arg(long, value_name = "DIR")]
    identity_dir_outer: Option<PathBuf>,

    /// Extra options for the engine's run command, passed verbatim
    #[arg(long, value_name = "OPTS", allow_hyphen_values = true)]
    docker_options: Option<String>,

    /// Run identifier; required for cleanup, generated for run when omitted
    #[arg(long, value_name = "ID")]
    run_id: Option<String>,

    /// Print debug output
    #[arg(long)]
    debug: bool,

    /// Command to run in the container; arguments are shell-quoted
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Cli {
    /// Config fields set on the command line. Relative directories are
    /// resolved against the current directory.
    fn overrides(&self) -> Result<Config> {
        let interactive = match self.interactive.as_deref() {
            Some(value) => config::parse_interactive(value)?,
            None => None,
        };

        Ok(Config {
            driver: self.driver,
            image: self.image.clone(),
            interactive,
            work_dir_outer: self
                .work_dir_outer
                .as_deref()
                .map(std::path::absolute)
                .transpose()
                .context("Failed to resolve --work-dir-outer")?,
            work_dir_inner: self.work_dir_inner.clone(),
            identity_dir_outer: self
                .identity_dir_outer
                .as_deref()
                .map(std::path::absolute)
                .transpose()
                .context("Failed to resolve --identity-dir-outer")?,
            docker_options: self.docker_options.clone(),
            command: (!self.command.is_empty()).then(|| {
                self.command
                    .iter()
                    .map(|arg| shell_quote(arg))
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
            ..Default::default()
        })
    }
}

/// Log where the engine binary lives; a missing binary still lets the shell
/// report the failure with its own exit status.
fn locate_engine(config: &Config) {
    let binary = config.engine().binary();
    match which::which(binary) {
        Ok(path) => debug!(engine = binary, path = %path.display(), "cli:engine found"),
        Err(e) => warn!(engine = binary, error = %e, "cli:engine not found on PATH"),
    }
}

/// Parse arguments, run the requested action and return its exit status.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    logger::init(cli.debug)?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "dojo start");

    let config = Config::load(cli.config.as_deref())?.merge(cli.overrides()?);
    let driver = Driver::new(BashShellService, LocalFileService);

    let exit_code = match cli.action {
        Action::Cleanup => {
            let run_id = cli
                .run_id
                .as_deref()
                .context("--run-id is required for cleanup")?;
            driver.clean_after_run(&config, run_id)
        }
        Action::Pull => {
            let config = config.resolve()?;
            locate_engine(&config);
            driver.handle_pull(&config)
        }
        Action::Run => {
            let config = config.resolve()?;
            locate_engine(&config);
            let run_id = cli
                .run_id
                .clone()
                .unwrap_or_else(|| run_id::generate(config.image()));
            interrupt::install(&config, &run_id)?;
            let env = ProcessEnvService::for_config(&config);
            driver.handle_run(&config, &run_id, &env)
        }
    };
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dojo").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_run() {
        let cli = parse(&[]);
        assert_eq!(cli.action, Action::Run);
        assert!(cli.command.is_empty());
    }

    #[test]
    fn test_trailing_command_becomes_override() {
        let cli = parse(&["--image", "img:1.2.3", "--", "bash", "-c", "echo hello"]);
        let overrides = cli.overrides().unwrap();
        assert_eq!(overrides.image(), "img:1.2.3");
        assert_eq!(overrides.command(), Some("bash -c 'echo hello'"));
    }

    #[test]
    fn test_no_trailing_command_leaves_override_unset() {
        let overrides = parse(&["-a", "pull"]).overrides().unwrap();
        assert_eq!(overrides.command, None);
    }

    #[test]
    fn test_interactive_flag() {
        assert_eq!(
            parse(&["-i", "true"]).overrides().unwrap().interactive,
            Some(true)
        );
        assert_eq!(
            parse(&["--interactive", "false"]).overrides().unwrap().interactive,
            Some(false)
        );
        assert!(parse(&["-i", "sometimes"]).overrides().is_err());
    }

    #[test]
    fn test_relative_work_dir_is_made_absolute() {
        let overrides = parse(&["-w", "project"]).overrides().unwrap();
        assert_eq!(
            overrides.work_dir_outer.unwrap(),
            std::env::current_dir().unwrap().join("project")
        );
    }

    #[test]
    fn test_docker_options_accept_leading_dash() {
        let cli = parse(&["--docker-options", "--init -e A=1", "-d", "podman"]);
        let overrides = cli.overrides().unwrap();
        assert_eq!(overrides.docker_options(), Some("--init -e A=1"));
        assert_eq!(overrides.engine(), ContainerEngine::Podman);
    }

    #[test]
    fn test_cleanup_action_with_run_id() {
        let cli = parse(&["-a", "cleanup", "--run-id", "dojo-img-1-2"]);
        assert_eq!(cli.action, Action::Cleanup);
        assert_eq!(cli.run_id.as_deref(), Some("dojo-img-1-2"));
    }
}
