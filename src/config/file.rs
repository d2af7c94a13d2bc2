//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::RunConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./parallel-behat.yaml",
    "./parallel-behat.yml",
    "./.parallel-behat.yaml",
    "~/.config/parallel-behat/config.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Settings used when no target is selected
    #[serde(default)]
    pub run: RunConfig,

    /// Named run configurations; each is complete on its own and only
    /// falls back to the built-in defaults
    #[serde(default)]
    pub targets: BTreeMap<String, RunConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            run: RunConfig::default(),
            targets: BTreeMap::new(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load from `path` if given, else from the first standard location,
    /// else fall back to defaults
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(expand_path(path)),
            None => match Self::find() {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        self.run.validate().context("Invalid run configuration")?;
        for (name, target) in &self.targets {
            target
                .validate()
                .with_context(|| format!("Invalid target '{name}'"))?;
        }

        Ok(())
    }

    /// Run configuration for `target`, or the default `run` section
    pub fn resolve(&self, target: Option<&str>) -> Result<RunConfig> {
        match target {
            None => Ok(self.run.clone()),
            Some(name) => self.targets.get(name).cloned().ok_or_else(|| {
                let known: Vec<&str> = self.targets.keys().map(String::as_str).collect();
                anyhow::anyhow!(
                    "Unknown target '{}'. Available targets: {}",
                    name,
                    if known.is_empty() {
                        "(none)".to_string()
                    } else {
                        known.join(", ")
                    }
                )
            }),
        }
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut targets = BTreeMap::new();
        targets.insert(
            "smoke".to_string(),
            RunConfig {
                src: "./features/smoke/**/*.feature".to_string(),
                flags: "--tags @smoke".to_string(),
                max_processes: 4,
                timeout_secs: 120,
                ..Default::default()
            },
        );

        let mut ci = RunConfig {
            bin: "./vendor/bin/behat".to_string(),
            flags: "--format progress".to_string(),
            max_processes: 8,
            retries: 2,
            ..Default::default()
        };
        ci.env.insert("APP_ENV".to_string(), "test".to_string());
        targets.insert("ci".to_string(), ci);

        Self {
            version: default_version(),
            run: RunConfig {
                max_processes: 4,
                ..Default::default()
            },
            targets,
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
