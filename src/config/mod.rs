//! Configuration module
//!
//! Run settings, their defaults, and layered overrides from the config file,
//! the environment and the command line.

mod env;
mod file;

pub use env::EnvConfig;
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::executor::ProcessOptions;

/// Settings for one parallel feature run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Glob selecting the feature files
    pub src: String,

    /// Behat executable
    pub bin: String,

    /// Working directory for every Behat process
    pub cwd: String,

    /// Behat config file passed with `-c`, omitted when unset
    pub config: Option<String>,

    /// Extra flags appended to every command
    pub flags: String,

    /// Maximum number of concurrent Behat processes
    pub max_processes: usize,

    /// Prefix joined onto every discovered file path
    pub base_dir: String,

    /// Echo Behat output and log at debug level
    pub verbose: bool,

    /// Retries for failed or pending features
    pub retries: u32,

    /// Per-process timeout in seconds, 0 disables it
    pub timeout_secs: u64,

    /// Environment variables added for every Behat process
    pub env: BTreeMap<String, String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            src: "./**/*.feature".to_string(),
            bin: "./bin/behat".to_string(),
            cwd: "./".to_string(),
            config: Some("./behat.yml".to_string()),
            flags: String::new(),
            max_processes: 10000,
            base_dir: "./".to_string(),
            verbose: false,
            retries: 0,
            timeout_secs: 600,
            env: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.bin.trim().is_empty() {
            anyhow::bail!("Behat executable (bin) must not be empty");
        }
        if self.src.trim().is_empty() {
            anyhow::bail!("Feature pattern (src) must not be empty");
        }
        if self.max_processes == 0 {
            anyhow::bail!("max_processes must be at least 1");
        }
        if let Some(key) = self.env.keys().find(|k| k.is_empty() || k.contains('=')) {
            anyhow::bail!("Invalid environment variable name: '{key}'");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Options used to spawn every Behat process
    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            cwd: (!self.cwd.is_empty()).then(|| self.cwd.clone().into()),
            timeout: self.timeout(),
            env: self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Apply overrides; set fields win
    pub fn apply(&mut self, overrides: &RunOverrides) {
        if let Some(ref src) = overrides.src {
            self.src = src.clone();
        }
        if let Some(ref bin) = overrides.bin {
            self.bin = bin.clone();
        }
        if let Some(ref cwd) = overrides.cwd {
            self.cwd = cwd.clone();
        }
        if let Some(ref config) = overrides.config {
            self.config = Some(config.clone());
        }
        if overrides.no_config {
            self.config = None;
        }
        if let Some(ref flags) = overrides.flags {
            self.flags = flags.clone();
        }
        if let Some(max) = overrides.max_processes {
            self.max_processes = max;
        }
        if let Some(ref base_dir) = overrides.base_dir {
            self.base_dir = base_dir.clone();
        }
        if let Some(verbose) = overrides.verbose {
            self.verbose = verbose;
        }
        if let Some(retries) = overrides.retries {
            self.retries = retries;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.timeout_secs = timeout;
        }
        for (key, value) in &overrides.env {
            self.env.insert(key.clone(), value.clone());
        }
    }
}

/// Optional settings layered over a [`RunConfig`]
#[derive(Clone, Debug, Default)]
pub struct RunOverrides {
    pub src: Option<String>,
    pub bin: Option<String>,
    pub cwd: Option<String>,
    pub config: Option<String>,
    /// Drop the `-c` option entirely
    pub no_config: bool,
    pub flags: Option<String>,
    pub max_processes: Option<usize>,
    pub base_dir: Option<String>,
    pub verbose: Option<bool>,
    pub retries: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub env: Vec<(String, String)>,
}

/// Parse a `KEY=VALUE` pair
pub fn parse_env_pair(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => anyhow::bail!("Expected KEY=VALUE, got '{s}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.src, "./**/*.feature");
        assert_eq!(config.bin, "./bin/behat");
        assert_eq!(config.config.as_deref(), Some("./behat.yml"));
        assert_eq!(config.max_processes, 10000);
        assert_eq!(config.retries, 0);
        assert_eq!(config.timeout(), Some(Duration::from_secs(600)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = RunConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.timeout(), None);
        assert_eq!(config.process_options().timeout, None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RunConfig {
            max_processes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.max_processes = 2;
        config.env.insert("A=B".to_string(), "x".to_string());
        assert!(config.validate().is_err());

        let config = RunConfig {
            bin: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = RunConfig::default();
        config.env.insert("APP_ENV".to_string(), "test".to_string());

        config.apply(&RunOverrides {
            bin: Some("vendor/bin/behat".to_string()),
            no_config: true,
            max_processes: Some(4),
            retries: Some(2),
            verbose: Some(true),
            env: vec![("APP_ENV".to_string(), "ci".to_string())],
            ..Default::default()
        });

        assert_eq!(config.bin, "vendor/bin/behat");
        assert_eq!(config.config, None);
        assert_eq!(config.max_processes, 4);
        assert_eq!(config.retries, 2);
        assert!(config.verbose);
        assert_eq!(config.env.get("APP_ENV").map(String::as_str), Some("ci"));
        assert_eq!(config.src, "./**/*.feature");
    }

    #[test]
    fn test_process_options() {
        let mut config = RunConfig {
            cwd: "/srv/app".to_string(),
            timeout_secs: 30,
            ..Default::default()
        };
        config.env.insert("DISPLAY".to_string(), ":99".to_string());

        let options = config.process_options();
        assert_eq!(options.cwd, Some("/srv/app".into()));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.env.get("DISPLAY").map(String::as_str), Some(":99"));
    }

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_env_pair("novalue").is_err());
        assert!(parse_env_pair("=x").is_err());
    }
}
