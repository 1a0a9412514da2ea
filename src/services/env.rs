//! Environment variables to inject into the container.

use tracing::debug;

use crate::config::Config;

/// Prefix bash uses when exporting functions through the environment.
const BASH_FUNC_PREFIX: &str = "BASH_FUNC_";
const BASH_FUNC_SUFFIX: &str = "%%";

/// Prefix given to blacklisted host variables so the container can still see them.
pub const SAVED_PREFIX: &str = "DOJO_";

/// Host variables that would clobber the container's own environment.
/// A trailing `*` matches any suffix.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "BASH*",
    "HOME",
    "USERNAME",
    "USER",
    "LOGNAME",
    "PATH",
    "TERM",
    "SHELL",
    "MAIL",
    "SUDO_*",
    "WINDOWID",
    "SSH_*",
    "SESSION_*",
    "GEM_HOME",
    "GEM_PATH",
    "GEM_ROOT",
    "HOSTNAME",
    "HOSTTYPE",
    "IFS",
    "PPID",
    "PWD",
    "OLDPWD",
    "LC*",
    "TMPDIR",
];

/// How an assignment travels into the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// Single-line value, written as `KEY=VALUE` to the env-file.
    Plain,
    /// Value with embedded newlines, exported from a generated script.
    Multiline,
    /// Shell function; `value` holds the full definition script.
    BashFunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub value: String,
    pub kind: AssignmentKind,
}

impl Assignment {
    /// A variable assignment, classified by whether the value spans lines.
    pub fn variable(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let kind = if value.contains('\n') {
            AssignmentKind::Multiline
        } else {
            AssignmentKind::Plain
        };
        Self {
            key: key.into(),
            value,
            kind,
        }
    }

    /// A function definition as exported by bash (`() { ...; }`), rendered
    /// into a script that defines and re-exports it.
    pub fn bash_function(name: impl Into<String>, body: &str) -> Self {
        let name = name.into();
        let value = format!("{name}{body}\nexport -f {name}\n");
        Self {
            key: name,
            value,
            kind: AssignmentKind::BashFunction,
        }
    }
}

/// Supplies the ordered assignments for one run.
pub trait EnvService {
    fn list_assignments(&self) -> Vec<Assignment>;
}

/// Reads the current process environment.
///
/// Variables are sorted by name. Blacklisted names are re-keyed with
/// [`SAVED_PREFIX`] rather than dropped.
#[derive(Debug, Clone)]
pub struct ProcessEnvService {
    blacklist: Vec<String>,
    extra: Vec<Assignment>,
}

impl Default for ProcessEnvService {
    fn default() -> Self {
        Self::new(DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect())
    }
}

impl ProcessEnvService {
    pub fn new(blacklist: Vec<String>) -> Self {
        Self {
            blacklist,
            extra: Vec::new(),
        }
    }

    /// Environment for a run: the configured blacklist plus `DOJO_*`
    /// variables describing the mounts.
    pub fn for_config(config: &Config) -> Self {
        Self::new(config.blacklist())
            .with_extra("DOJO_WORK_OUTER", config.work_dir_outer().display().to_string())
            .with_extra("DOJO_WORK_INNER", config.work_dir_inner())
            .with_extra(
                "DOJO_IDENTITY_OUTER",
                config.identity_dir_outer().display().to_string(),
            )
    }

    /// Append an assignment after the host variables.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push(Assignment::variable(key, value));
        self
    }

    fn is_blacklisted(&self, key: &str) -> bool {
        self.blacklist.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        })
    }

    /// Classify `vars` in the order given.
    fn classify<I>(&self, vars: I) -> Vec<Assignment>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut assignments = Vec::new();
        for (key, value) in vars {
            if let Some(name) = key
                .strip_prefix(BASH_FUNC_PREFIX)
                .and_then(|rest| rest.strip_suffix(BASH_FUNC_SUFFIX))
                && value.starts_with("()")
            {
                assignments.push(Assignment::bash_function(name, &value));
                continue;
            }

            let key = if !key.starts_with(SAVED_PREFIX) && self.is_blacklisted(&key) {
                format!("{SAVED_PREFIX}{key}")
            } else {
                key
            };
            assignments.push(Assignment::variable(key, value));
        }
        assignments.extend(self.extra.iter().cloned());
        assignments
    }
}

impl EnvService for ProcessEnvService {
    fn list_assignments(&self) -> Vec<Assignment> {
        let mut vars: Vec<(String, String)> = std::env::vars_os()
            .filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
                (Ok(k), Ok(v)) => Some((k, v)),
                (k, _) => {
                    debug!(key = ?k, "env:skipping non-unicode variable");
                    None
                }
            })
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));

        let assignments = self.classify(vars);
        debug!(count = assignments.len(), "env:collected assignments");
        assignments
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_variable_classification() {
        assert_eq!(Assignment::variable("A", "1").kind, AssignmentKind::Plain);
        assert_eq!(
            Assignment::variable("A", "one\ntwo").kind,
            AssignmentKind::Multiline
        );
    }

    #[test]
    fn test_blacklisted_variables_are_prefixed() {
        let service = ProcessEnvService::default();
        let result = service.classify(vars(&[
            ("HOME", "/home/me"),
            ("SSH_AUTH_SOCK", "/tmp/agent"),
            ("LC_ALL", "C"),
            ("EDITOR", "vim"),
        ]));

        let keys: Vec<&str> = result.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["DOJO_HOME", "DOJO_SSH_AUTH_SOCK", "DOJO_LC_ALL", "EDITOR"]
        );
    }

    #[test]
    fn test_exact_pattern_does_not_match_prefix() {
        let service = ProcessEnvService::default();
        let result = service.classify(vars(&[("USERPROFILE", "x"), ("PATHS", "y")]));

        assert_eq!(result[0].key, "USERPROFILE");
        assert_eq!(result[1].key, "PATHS");
    }

    #[test]
    fn test_already_saved_variables_pass_through() {
        let service = ProcessEnvService::new(vec!["DOJO*".to_string()]);
        let result = service.classify(vars(&[("DOJO_HOME", "/home/me")]));

        assert_eq!(result[0].key, "DOJO_HOME");
    }

    #[test]
    fn test_bash_function_is_rendered_and_exempt_from_blacklist() {
        let service = ProcessEnvService::default();
        let result = service.classify(vars(&[("BASH_FUNC_greet%%", "() {  echo hi\n}")]));

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].kind, AssignmentKind::BashFunction);
        assert_eq!(result[0].key, "greet");
        assert_eq!(result[0].value, "greet() {  echo hi\n}\nexport -f greet\n");
    }

    #[test]
    fn test_bash_func_name_without_function_body_is_a_variable() {
        let service = ProcessEnvService::new(Vec::new());
        let result = service.classify(vars(&[("BASH_FUNC_x%%", "plain")]));

        assert_eq!(result[0].kind, AssignmentKind::Plain);
        assert_eq!(result[0].key, "BASH_FUNC_x%%");
    }

    #[test]
    fn test_extra_assignments_come_last() {
        let service = ProcessEnvService::new(Vec::new()).with_extra("DOJO_WORK_INNER", "/dojo/work");
        let result = service.classify(vars(&[("A", "1")]));

        assert_eq!(result.last().unwrap().key, "DOJO_WORK_INNER");
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_for_config_describes_mounts() {
        let config = Config {
            work_dir_inner: Some("/src".to_string()),
            ..crate::driver::tests::test_config()
        };
        let result = ProcessEnvService::for_config(&config).classify(Vec::new());

        let pairs: Vec<(&str, &str)> = result
            .iter()
            .map(|a| (a.key.as_str(), a.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("DOJO_WORK_OUTER", "/tmp/bla"),
                ("DOJO_WORK_INNER", "/src"),
                ("DOJO_IDENTITY_OUTER", "/tmp/myidentity"),
            ]
        );
    }

    #[test]
    fn test_for_config_defaults_work_dir_inner() {
        let config = crate::driver::tests::test_config();
        let result = ProcessEnvService::for_config(&config).classify(vars(&[("A", "1")]));

        assert_eq!(result[0].key, "A");
        assert_eq!(result[2].key, "DOJO_WORK_INNER");
        assert_eq!(result[2].value, "/dojo/work");
    }

    #[test]
    fn test_process_env_is_sorted() {
        let result = ProcessEnvService::new(Vec::new()).list_assignments();
        let keys: Vec<&String> = result
            .iter()
            .filter(|a| a.kind != AssignmentKind::BashFunction)
            .map(|a| &a.key)
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
