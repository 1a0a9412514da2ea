//! Per-run files that carry the environment into the container.
//!
//! Three files per run, all keyed by the run identifier:
//! - plain `KEY=VALUE` lines, handed to the engine's `--env-file`
//! - a script exporting multi-line values, base64-encoded so no newline
//!   ever reaches the env-file parser
//! - a script defining exported bash functions
//!
//! The two scripts are mounted into the image's variable-loading directory
//! and sourced at container start.

use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::services::{Assignment, AssignmentKind};

pub const MULTILINE_VARS_TARGET: &str = "/etc/dojo.d/variables/00-multiline-vars.sh";
pub const BASH_FUNCTIONS_TARGET: &str = "/etc/dojo.d/variables/01-bash-functions.sh";

const FILE_PREFIX: &str = "dojo-environment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFiles {
    pub plain: PathBuf,
    pub multiline: PathBuf,
    pub bash_functions: PathBuf,
}

impl TransportFiles {
    pub fn for_run(dir: &Path, run_id: &str) -> Self {
        Self {
            plain: dir.join(format!("{FILE_PREFIX}-{run_id}")),
            multiline: dir.join(format!("{FILE_PREFIX}-multiline-{run_id}")),
            bash_functions: dir.join(format!("{FILE_PREFIX}-bash-functions-{run_id}")),
        }
    }

    /// Removal runs in the reverse of write order.
    pub fn removal_order(&self) -> [&Path; 3] {
        [
            self.bash_functions.as_path(),
            self.multiline.as_path(),
            self.plain.as_path(),
        ]
    }
}

/// Rendered contents of the three files.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransportContents {
    pub plain: String,
    pub multiline: String,
    pub bash_functions: String,
}

impl TransportContents {
    pub fn render(assignments: &[Assignment]) -> Self {
        let mut contents = Self::default();
        for assignment in assignments {
            match assignment.kind {
                AssignmentKind::Plain => {
                    contents.plain.push_str(&format!(
                        "{}={}\n",
                        assignment.key, assignment.value
                    ));
                }
                AssignmentKind::Multiline => {
                    contents
                        .multiline
                        .push_str(&multiline_export(&assignment.key, &assignment.value));
                }
                AssignmentKind::BashFunction => {
                    contents.bash_functions.push_str(&assignment.value);
                }
            }
        }
        contents
    }

    /// Pairs each file with its content, in write order.
    pub fn by_file<'a>(&'a self, files: &'a TransportFiles) -> [(&'a Path, &'a str); 3] {
        [
            (files.plain.as_path(), self.plain.as_str()),
            (files.multiline.as_path(), self.multiline.as_str()),
            (files.bash_functions.as_path(), self.bash_functions.as_str()),
        ]
    }
}

/// `export KEY=$(echo <base64> | base64 -d)`, decoded by the container's shell.
pub fn multiline_export(key: &str, value: &str) -> String {
    format!(
        "export {}=$(echo {} | base64 -d)\n",
        key,
        STANDARD.encode(value.as_bytes())
    )
}
