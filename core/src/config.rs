//! Environment-driven settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::HeaderCase;
use crate::error::{Error, Result};

/// Overrides the directory holding stored contexts and the init script.
pub const PATH_ENV: &str = "REQSH_PATH";
/// Request timeout in whole seconds.
pub const TIMEOUT_ENV: &str = "REQSH_TIMEOUT";
/// `preserve` or `canonical`, see `HeaderCase`.
pub const HEADER_CASE_ENV: &str = "REQSH_HEADER_CASE";

pub const DEFAULT_BASE_DIR: &str = "~/.reqsh";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_dir: PathBuf,
    pub timeout: Duration,
    pub header_case: HeaderCase,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: expand_home(DEFAULT_BASE_DIR),
            timeout: DEFAULT_TIMEOUT,
            header_case: HeaderCase::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset or empty variables keep the
    /// default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let mut config = Config::default();

        if let Some(dir) = var(PATH_ENV) {
            config.base_dir = expand_home(&dir);
        }
        if let Some(secs) = var(TIMEOUT_ENV) {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{TIMEOUT_ENV}={secs:?} is not a number of seconds")))?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(case) = var(HEADER_CASE_ENV) {
            config.header_case = case.parse().map_err(Error::Config)?;
        }
        Ok(config)
    }
}

/// Replace a leading `~/` with the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    expand_home_with(path, home.as_deref())
}

fn expand_home_with(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        (None, Some(home)) if path == "~" => home.to_path_buf(),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.header_case, HeaderCase::Preserve);
        assert!(config.base_dir.ends_with(".reqsh"));
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            (PATH_ENV, "/srv/contexts"),
            (TIMEOUT_ENV, "12"),
            (HEADER_CASE_ENV, "canonical"),
        ]))
        .unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/srv/contexts"));
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.header_case, HeaderCase::Canonical);
    }

    #[test]
    fn empty_values_keep_defaults() {
        let config = Config::from_lookup(lookup(&[(TIMEOUT_ENV, "")])).unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(TIMEOUT_ENV, "soon")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(HEADER_CASE_ENV, "shouty")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn home_expansion() {
        let home = Path::new("/home/me");
        assert_eq!(expand_home_with("~/.reqsh", Some(home)), PathBuf::from("/home/me/.reqsh"));
        assert_eq!(expand_home_with("~", Some(home)), PathBuf::from("/home/me"));
        assert_eq!(expand_home_with("/abs", Some(home)), PathBuf::from("/abs"));
        assert_eq!(expand_home_with("~/x", None), PathBuf::from("~/x"));
    }
}
