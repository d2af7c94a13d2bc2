//! parallel-behat - Parallel Behat feature runner
//!
//! Runs every Behat feature file as its own process, many at a time, with a
//! per-process timeout and a retry budget for failing or pending features.
//!
//! ## Usage
//!
//! ```bash
//! # Run all features under ./features, 8 at a time, retrying failures twice
//! parallel-behat run --src './features/**/*.feature' -j 8 --retries 2
//!
//! # Run a named target from parallel-behat.yaml and write a report
//! parallel-behat run --target ci --report build/behat-run.json
//!
//! # Show what would run
//! parallel-behat list --target smoke
//!
//! # Create an example configuration
//! parallel-behat config init
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{info, warn};

use parallel_behat::cli::{self, Args};
use parallel_behat::config::{ConfigFile, EnvConfig, RunConfig};
use parallel_behat::executor::{FeatureRunner, ParallelExecutor};
use parallel_behat::utils::{discover_features, init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_deref() {
        Some(name) => LogLevel::from_str(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown log level: {name}"))?,
        None => LogLevel::for_verbosity(args.verbose || verbose_from_env()),
    };
    init_logger(level);

    match args.command {
        cli::Command::Run(run_args) => {
            let success = run_features(run_args, args.verbose).await?;
            if !success {
                std::process::exit(1);
            }
        }
        cli::Command::List(list_args) => {
            list_features(list_args, args.verbose)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args)?;
        }
    }

    Ok(())
}

fn verbose_from_env() -> bool {
    EnvConfig::load().verbose.unwrap_or(false)
}

/// Resolve settings: defaults < config file or target < environment < CLI
fn resolve_config(args: &cli::RunArgs, verbose: bool) -> Result<RunConfig> {
    let env = EnvConfig::load();

    let config_path = args.config_file.as_deref().or(env.config_file.as_deref());
    let file = ConfigFile::load_or_default(config_path)?;
    let target = args.target.as_deref().or(env.target.as_deref());

    let mut config = file.resolve(target)?;
    config.apply(&env.overrides());
    config.apply(&args.overrides(verbose));
    config.validate()?;

    Ok(config)
}

fn feature_files(args: &cli::RunArgs, config: &RunConfig) -> Result<Vec<String>> {
    if !args.files.is_empty() {
        return Ok(args.files.clone());
    }

    let files = discover_features(&config.src)?;
    if files.is_empty() {
        warn!("No feature files matched {}", config.src);
    }
    Ok(files)
}

async fn run_features(args: cli::RunArgs, verbose: bool) -> Result<bool> {
    let config = resolve_config(&args, verbose)?;
    let files = feature_files(&args, &config)?;

    let executor =
        ParallelExecutor::new(config.max_processes).with_options(config.process_options());
    let summary = FeatureRunner::new(config).run(files, executor).await;

    if let Some(ref path) = args.report {
        summary
            .save(path)
            .with_context(|| format!("Failed to save report to {path}"))?;
        info!("Report written to {}", path);
    }

    if !summary.failed.is_empty() {
        warn!("{} feature(s) failed:", summary.failed.len());
        for file in &summary.failed {
            warn!("  {}", file);
        }
    }

    Ok(summary.is_success())
}

fn list_features(args: cli::RunArgs, verbose: bool) -> Result<()> {
    let config = resolve_config(&args, verbose)?;
    let files = feature_files(&args, &config)?;
    let runner = FeatureRunner::new(config.clone());

    println!(
        "\n{} feature file(s), {} at a time, {} retr{}, timeout {}\n",
        files.len(),
        config.max_processes,
        config.retries,
        if config.retries == 1 { "y" } else { "ies" },
        match config.timeout() {
            Some(t) => format!("{}s", t.as_secs()),
            None => "none".to_string(),
        }
    );

    for file in &files {
        println!("  {file}");
        if verbose {
            println!("    $ {}", runner.build_command(file));
        }
    }
    println!();

    Ok(())
}

fn manage_config(args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show {
            config_file,
            target,
            format,
        } => {
            let env = EnvConfig::load();
            let path = config_file.as_deref().or(env.config_file.as_deref());
            let mut config = ConfigFile::load_or_default(path)?
                .resolve(target.as_deref().or(env.target.as_deref()))?;
            config.apply(&env.overrides());

            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| ConfigFile::find().map(|p| p.to_string_lossy().to_string()))
                .unwrap_or_else(|| "./parallel-behat.yaml".to_string());

            match ConfigFile::load(&path) {
                Ok(config) => {
                    println!("✓ Configuration file is valid: {path}");
                    if !config.targets.is_empty() {
                        let names: Vec<&str> = config.targets.keys().map(String::as_str).collect();
                        println!("  Targets: {}", names.join(", "));
                    }
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            let env = EnvConfig::load();
            env.print_summary();
            if !env.has_any() {
                println!("\nNo run settings are set in the environment.");
            }
        }
    }

    Ok(())
}
