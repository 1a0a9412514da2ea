use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::services::env::DEFAULT_BLACKLIST;

/// Config file looked up in the current directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "Dojofile";

const DEFAULT_WORK_DIR_INNER: &str = "/dojo/work";
const DEFAULT_TMP_DIR: &str = "/tmp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no docker image configured; set `image` in the Dojofile or pass --image")]
    MissingImage,

    #[error("interactive must be \"true\", \"false\" or empty, got {0:?}")]
    InvalidInteractive(String),

    #[error("{what} must be an absolute path, got {path}")]
    RelativePath { what: &'static str, path: PathBuf },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Container engine used to run and pull images
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContainerEngine {
    /// Docker (default)
    #[default]
    Docker,
    /// Podman
    Podman,
}

impl ContainerEngine {
    pub fn binary(&self) -> &'static str {
        match self {
            ContainerEngine::Docker => "docker",
            ContainerEngine::Podman => "podman",
        }
    }
}

/// Run configuration, read from a Dojofile and overridden from the CLI.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Container engine. Default: docker
    #[serde(default)]
    pub driver: Option<ContainerEngine>,

    /// Image reference (name:tag). Required.
    #[serde(default)]
    pub image: Option<String>,

    /// `true`, `false`, or unset/empty to follow the terminal.
    #[serde(default, deserialize_with = "deserialize_interactive")]
    pub interactive: Option<bool>,

    /// Host directory mounted as the work directory. Default: current directory
    #[serde(default)]
    pub work_dir_outer: Option<PathBuf>,

    /// Where the work directory appears in the container. Default: /dojo/work
    #[serde(default)]
    pub work_dir_inner: Option<String>,

    /// Host directory mounted read-only as the identity. Default: $HOME
    #[serde(default)]
    pub identity_dir_outer: Option<PathBuf>,

    /// Container name. Default: the run identifier
    #[serde(default)]
    pub container_name: Option<String>,

    /// Command to run instead of the image default
    #[serde(default)]
    pub command: Option<String>,

    /// Extra options passed to the engine's run command, verbatim
    #[serde(default)]
    pub docker_options: Option<String>,

    /// Host variables saved under a DOJO_ prefix instead of passed as-is
    #[serde(default)]
    pub blacklist: Option<Vec<String>>,

    /// Directory for the per-run environment files. Default: /tmp
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
}

fn deserialize_interactive<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(b)) => Ok(Some(b)),
        Some(Raw::Text(s)) => parse_interactive(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse the interactive tri-state: `"true"`, `"false"`, or empty for unset.
pub fn parse_interactive(value: &str) -> Result<Option<bool>, ConfigError> {
    match value.trim() {
        "" => Ok(None),
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        other => Err(ConfigError::InvalidInteractive(other.to_string())),
    }
}

/// Returns the string only if it has non-whitespace content.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Config {
    pub fn engine(&self) -> ContainerEngine {
        self.driver.unwrap_or_default()
    }

    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or_default()
    }

    pub fn work_dir_outer(&self) -> &Path {
        self.work_dir_outer.as_deref().unwrap_or(Path::new("."))
    }

    pub fn work_dir_inner(&self) -> &str {
        non_blank(&self.work_dir_inner).unwrap_or(DEFAULT_WORK_DIR_INNER)
    }

    pub fn identity_dir_outer(&self) -> &Path {
        self.identity_dir_outer.as_deref().unwrap_or(Path::new("."))
    }

    pub fn container_name(&self) -> Option<&str> {
        non_blank(&self.container_name)
    }

    /// Run command override, trimmed; `None` when unset or blank.
    pub fn command(&self) -> Option<&str> {
        non_blank(&self.command)
    }

    pub fn docker_options(&self) -> Option<&str> {
        non_blank(&self.docker_options)
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.blacklist
            .clone()
            .unwrap_or_else(|| DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect())
    }

    pub fn tmp_dir(&self) -> &Path {
        self.tmp_dir.as_deref().unwrap_or(Path::new(DEFAULT_TMP_DIR))
    }

    /// Load the Dojofile at `path`, or `./Dojofile` when `None`.
    ///
    /// An explicitly named file must exist; a missing default file yields an
    /// empty config so everything can come from the command line.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        debug!(path = ?path, "config:loading");
        match path {
            Some(path) => {
                Self::load_from_path(path)?.ok_or_else(|| ConfigError::NotFound(path.into()).into())
            }
            None => Ok(Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))?.unwrap_or_default()),
        }
    }

    fn load_from_path(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "config:reading file");
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(config))
    }

    /// Merge overrides into this config. Any field set in `overrides` wins.
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            driver: overrides.driver.or(self.driver),
            image: overrides.image.or(self.image),
            interactive: overrides.interactive.or(self.interactive),
            work_dir_outer: overrides.work_dir_outer.or(self.work_dir_outer),
            work_dir_inner: overrides.work_dir_inner.or(self.work_dir_inner),
            identity_dir_outer: overrides.identity_dir_outer.or(self.identity_dir_outer),
            container_name: overrides.container_name.or(self.container_name),
            command: overrides.command.or(self.command),
            docker_options: overrides.docker_options.or(self.docker_options),
            blacklist: overrides.blacklist.or(self.blacklist),
            tmp_dir: overrides.tmp_dir.or(self.tmp_dir),
        }
    }

    /// Fill host-dependent defaults and validate.
    pub fn resolve(mut self) -> anyhow::Result<Self> {
        if self.work_dir_outer.is_none() {
            self.work_dir_outer = Some(std::env::current_dir()?);
        }
        if self.identity_dir_outer.is_none() {
            self.identity_dir_outer = home::home_dir();
        }
        self.validate()?;

        debug!(
            image = self.image(),
            engine = self.engine().binary(),
            interactive = ?self.interactive,
            work_dir_outer = %self.work_dir_outer().display(),
            "config:resolved"
        );
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.image().trim().is_empty() {
            return Err(ConfigError::MissingImage);
        }
        for (what, path) in [
            ("work_dir_outer", &self.work_dir_outer),
            ("identity_dir_outer", &self.identity_dir_outer),
        ] {
            if let Some(path) = path
                && !path.is_absolute()
            {
                return Err(ConfigError::RelativePath {
                    what,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}
