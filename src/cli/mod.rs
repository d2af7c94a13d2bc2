//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

use crate::config::{parse_env_pair, RunOverrides};

/// Run Behat feature files in parallel
#[derive(Parser, Debug)]
#[command(name = "parallel-behat")]
#[command(version)]
#[command(about = "Run Behat feature files in parallel with timeouts and retries")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run feature files
    Run(RunArgs),

    /// List the feature files and commands a run would execute
    List(RunArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments shared by `run` and `list`
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Feature files to run instead of discovering them with --src
    pub files: Vec<String>,

    /// Configuration file (YAML or JSON)
    #[arg(long = "config-file")]
    pub config_file: Option<String>,

    /// Named target from the configuration file
    #[arg(short, long)]
    pub target: Option<String>,

    /// Glob selecting feature files
    #[arg(long)]
    pub src: Option<String>,

    /// Behat executable
    #[arg(long)]
    pub bin: Option<String>,

    /// Working directory for Behat processes
    #[arg(long)]
    pub cwd: Option<String>,

    /// Behat config file passed with -c
    #[arg(short = 'c', long = "behat-config")]
    pub behat_config: Option<String>,

    /// Do not pass -c to Behat
    #[arg(long, conflicts_with = "behat_config")]
    pub no_behat_config: bool,

    /// Extra flags for every Behat invocation
    #[arg(long, allow_hyphen_values = true)]
    pub flags: Option<String>,

    /// Maximum number of concurrent Behat processes
    #[arg(short = 'j', long)]
    pub max_processes: Option<usize>,

    /// Retries for failed or pending features
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Per-process timeout in seconds (0 disables it)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Prefix joined onto every feature file path
    #[arg(long)]
    pub base_dir: Option<String>,

    /// Environment variable for Behat processes (KEY=VALUE, repeatable)
    #[arg(short, long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Write a run report to this file (.json or .yaml)
    #[arg(long)]
    pub report: Option<String>,
}

impl RunArgs {
    /// Command-line settings as overrides
    pub fn overrides(&self, verbose: bool) -> RunOverrides {
        RunOverrides {
            src: self.src.clone(),
            bin: self.bin.clone(),
            cwd: self.cwd.clone(),
            config: self.behat_config.clone(),
            no_config: self.no_behat_config,
            flags: self.flags.clone(),
            max_processes: self.max_processes,
            base_dir: self.base_dir.clone(),
            verbose: verbose.then_some(true),
            retries: self.retries,
            timeout_secs: self.timeout,
            env: self.env.clone(),
        }
    }
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(default_value = "./parallel-behat.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the resolved run configuration
    Show {
        /// Configuration file
        #[arg(long = "config-file")]
        config_file: Option<String>,

        /// Named target
        #[arg(short, long)]
        target: Option<String>,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file
        file: Option<String>,
    },

    /// Show PARALLEL_BEHAT_* environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_run_args() {
        let args = Args::parse_from([
            "parallel-behat",
            "run",
            "-j",
            "4",
            "--retries",
            "2",
            "--flags",
            "--tags @smoke",
            "-e",
            "APP_ENV=ci",
            "--no-behat-config",
            "features/a.feature",
        ]);

        let Command::Run(run) = args.command else {
            panic!("expected run command");
        };
        assert_eq!(run.files, vec!["features/a.feature".to_string()]);

        let overrides = run.overrides(false);
        assert_eq!(overrides.max_processes, Some(4));
        assert_eq!(overrides.retries, Some(2));
        assert_eq!(overrides.flags.as_deref(), Some("--tags @smoke"));
        assert_eq!(
            overrides.env,
            vec![("APP_ENV".to_string(), "ci".to_string())]
        );
        assert!(overrides.no_config);
        assert_eq!(overrides.verbose, None);
    }

    #[test]
    fn test_verbose_is_global() {
        let args = Args::parse_from(["parallel-behat", "list", "--verbose"]);
        assert!(args.verbose);
        let Command::List(list) = args.command else {
            panic!("expected list command");
        };
        assert_eq!(list.overrides(args.verbose).verbose, Some(true));
    }

    #[test]
    fn test_bad_env_pair_rejected() {
        let result = Args::try_parse_from(["parallel-behat", "run", "--env", "NOPE"]);
        assert!(result.is_err());
    }
}
