//! Collaborators the driver talks to.
//!
//! Each concern sits behind a small trait with one real adapter, so the
//! driver can be exercised without spawning processes or touching `/tmp`.

pub mod env;
pub mod files;
pub mod shell;

pub use env::{Assignment, AssignmentKind, EnvService, ProcessEnvService};
pub use files::{FileService, LocalFileService};
pub use shell::{BashShellService, ShellService};
