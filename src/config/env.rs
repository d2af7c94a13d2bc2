//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::{parse_env_pair, RunOverrides};

/// Environment variable prefix
const ENV_PREFIX: &str = "PARALLEL_BEHAT";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Feature glob from PARALLEL_BEHAT_SRC
    pub src: Option<String>,
    /// Behat executable from PARALLEL_BEHAT_BIN
    pub bin: Option<String>,
    /// Working directory from PARALLEL_BEHAT_CWD
    pub cwd: Option<String>,
    /// Behat config from PARALLEL_BEHAT_BEHAT_CONFIG
    pub behat_config: Option<String>,
    /// Extra flags from PARALLEL_BEHAT_FLAGS
    pub flags: Option<String>,
    /// Concurrency from PARALLEL_BEHAT_MAX_PROCESSES
    pub max_processes: Option<usize>,
    /// Base directory from PARALLEL_BEHAT_BASE_DIR
    pub base_dir: Option<String>,
    /// Verbose from PARALLEL_BEHAT_VERBOSE
    pub verbose: Option<bool>,
    /// Retries from PARALLEL_BEHAT_RETRIES
    pub retries: Option<u32>,
    /// Timeout from PARALLEL_BEHAT_TIMEOUT
    pub timeout: Option<u64>,
    /// Extra child environment from PARALLEL_BEHAT_ENV (comma-separated KEY=VALUE)
    pub env: Option<String>,
    /// Config file from PARALLEL_BEHAT_CONFIG
    pub config_file: Option<String>,
    /// Target name from PARALLEL_BEHAT_TARGET
    pub target: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            src: get_env("SRC"),
            bin: get_env("BIN"),
            cwd: get_env("CWD"),
            behat_config: get_env("BEHAT_CONFIG"),
            flags: get_env("FLAGS"),
            max_processes: get_env_parse("MAX_PROCESSES"),
            base_dir: get_env("BASE_DIR"),
            verbose: get_env_bool("VERBOSE"),
            retries: get_env_parse("RETRIES"),
            timeout: get_env_parse("TIMEOUT"),
            env: get_env("ENV"),
            config_file: get_env("CONFIG"),
            target: get_env("TARGET"),
        }
    }

    /// Check if any run setting is set
    pub fn has_any(&self) -> bool {
        self.src.is_some()
            || self.bin.is_some()
            || self.cwd.is_some()
            || self.behat_config.is_some()
            || self.flags.is_some()
            || self.max_processes.is_some()
            || self.base_dir.is_some()
            || self.verbose.is_some()
            || self.retries.is_some()
            || self.timeout.is_some()
            || self.env.is_some()
    }

    /// Run settings as overrides; malformed `ENV` pairs are skipped
    pub fn overrides(&self) -> RunOverrides {
        let env = self
            .env
            .as_deref()
            .map(|pairs| {
                pairs
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .filter_map(|p| match parse_env_pair(p) {
                        Ok(pair) => Some(pair),
                        Err(e) => {
                            tracing::warn!("Ignoring {}_ENV entry: {}", ENV_PREFIX, e);
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        RunOverrides {
            src: self.src.clone(),
            bin: self.bin.clone(),
            cwd: self.cwd.clone(),
            config: self.behat_config.clone(),
            no_config: false,
            flags: self.flags.clone(),
            max_processes: self.max_processes,
            base_dir: self.base_dir.clone(),
            verbose: self.verbose,
            retries: self.retries,
            timeout_secs: self.timeout,
            env,
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_SRC:           {:?}", ENV_PREFIX, self.src);
        println!("  {}_BIN:           {:?}", ENV_PREFIX, self.bin);
        println!("  {}_CWD:           {:?}", ENV_PREFIX, self.cwd);
        println!("  {}_BEHAT_CONFIG:  {:?}", ENV_PREFIX, self.behat_config);
        println!("  {}_FLAGS:         {:?}", ENV_PREFIX, self.flags);
        println!("  {}_MAX_PROCESSES: {:?}", ENV_PREFIX, self.max_processes);
        println!("  {}_BASE_DIR:      {:?}", ENV_PREFIX, self.base_dir);
        println!("  {}_VERBOSE:       {:?}", ENV_PREFIX, self.verbose);
        println!("  {}_RETRIES:       {:?}", ENV_PREFIX, self.retries);
        println!("  {}_TIMEOUT:       {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_ENV:           {:?}", ENV_PREFIX, self.env);
        println!("  {}_CONFIG:        {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_TARGET:        {:?}", ENV_PREFIX, self.target);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get and parse environment variable
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get boolean environment variable
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
