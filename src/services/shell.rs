//! Process execution for assembled command lines.

use std::io::IsTerminal;
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use tracing::{debug, trace};

/// Runs command lines and reports whether the session is attached to a terminal.
pub trait ShellService {
    /// Run `command` to completion and return its exit status.
    ///
    /// Returns an error only if the process could not be started at all;
    /// a non-zero exit is a normal `Ok` result.
    fn execute(&self, command: &str) -> Result<i32>;

    /// Whether the calling session has a controlling terminal.
    fn is_interactive(&self) -> bool;
}

/// Executes commands through `bash -c` with inherited stdio, so an
/// interactive container is wired straight to the user's terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct BashShellService;

impl ShellService for BashShellService {
    fn execute(&self, command: &str) -> Result<i32> {
        trace!(command, "shell:execute start");

        let status = Command::new("bash")
            .arg("-c")
            .arg(command)
            .status()
            .with_context(|| format!("Failed to execute shell command: {}", command))?;

        let exit_code = exit_code(status);
        debug!(exit_code, "shell:execute finished");
        Ok(exit_code)
    }

    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }
}

/// Quote a string for safe use as a shell argument.
///
/// Returns the string unchanged if it contains only characters the shell
/// passes through literally. Otherwise wraps it in single quotes with
/// internal single quotes escaped. Empty strings return `''`.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ',' | '@' | '+')
    }) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// Map a process status to a shell-style exit code (128 + signal when killed).
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[cfg(test)]
pub mod mock {
    use std::sync::Mutex;

    use anyhow::{Result, anyhow};

    use super::ShellService;

    /// Records every command instead of running it.
    pub struct RecordingShell {
        interactive: bool,
        exit_code: i32,
        fail_to_start: bool,
        commands: Mutex<Vec<String>>,
    }

    impl RecordingShell {
        pub fn interactive() -> Self {
            Self::new(true)
        }

        pub fn not_interactive() -> Self {
            Self::new(false)
        }

        fn new(interactive: bool) -> Self {
            Self {
                interactive,
                exit_code: 0,
                fail_to_start: false,
                commands: Mutex::new(Vec::new()),
            }
        }

        pub fn with_exit_code(mut self, exit_code: i32) -> Self {
            self.exit_code = exit_code;
            self
        }

        pub fn failing_to_start(mut self) -> Self {
            self.fail_to_start = true;
            self
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl ShellService for RecordingShell {
        fn execute(&self, command: &str) -> Result<i32> {
            self.commands.lock().unwrap().push(command.to_string());
            if self.fail_to_start {
                return Err(anyhow!("bash: not found"));
            }
            Ok(self.exit_code)
        }

        fn is_interactive(&self) -> bool {
            self.interactive
        }
    }
}
