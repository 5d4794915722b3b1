//! CLI for the harvest acquisition orchestrator.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use harvest_core::config::{self, HarvestConfig, ScheduleMode};

use commands::{run_config, run_manifest_cmd, run_plan};

/// Top-level CLI for harvest.
#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(
    about = "harvest: run an external acquisition tool over a manifest with bounded concurrency",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run every job in a manifest and print a summary.
    Run {
        /// Manifest file: a header line, then one `id:key` record per line.
        manifest: PathBuf,
        /// Run up to N jobs at once (overrides `concurrency_limit`).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        /// How jobs are admitted (overrides `schedule_mode`).
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Directory receiving the artifacts (overrides `output_dir`).
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Skip browser priming even if `[priming]` is configured.
        #[arg(long)]
        no_prime: bool,
        /// Write the run summary as JSON to FILE.
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
        /// Read configuration from FILE instead of the XDG config.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print the command each job would run, without running anything.
    Plan {
        manifest: PathBuf,
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration.
    Config {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Batch,
    Semaphore,
}

impl From<ModeArg> for ScheduleMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Batch => ScheduleMode::Batch,
            ModeArg::Semaphore => ScheduleMode::Semaphore,
        }
    }
}

/// `--config FILE` if given, else the XDG config (created on first use).
fn load_config(path: Option<&Path>) -> Result<HarvestConfig> {
    let cfg = match path {
        Some(p) => config::load_from_path(p)?,
        None => config::load_or_init()?,
    };
    tracing::debug!("loaded config: {:?}", cfg);
    Ok(cfg)
}

/// Applies command-line overrides on top of the loaded config.
fn apply_overrides(
    mut cfg: HarvestConfig,
    jobs: Option<usize>,
    mode: Option<ModeArg>,
    output_dir: Option<PathBuf>,
) -> HarvestConfig {
    if let Some(n) = jobs {
        cfg.concurrency_limit = n;
    }
    if let Some(m) = mode {
        cfg.schedule_mode = m.into();
    }
    if let Some(dir) = output_dir {
        cfg.output_dir = dir;
    }
    cfg
}

impl CliCommand {
    /// Parses the command line and runs it. Returns the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                manifest,
                jobs,
                mode,
                output_dir,
                no_prime,
                report,
                config,
            } => {
                let cfg = apply_overrides(load_config(config.as_deref())?, jobs, mode, output_dir);
                run_manifest_cmd(&cfg, &manifest, !no_prime, report.as_deref()).await
            }
            CliCommand::Plan {
                manifest,
                output_dir,
                config,
            } => {
                let cfg = apply_overrides(load_config(config.as_deref())?, None, None, output_dir);
                run_plan(&cfg, &manifest)?;
                Ok(0)
            }
            CliCommand::Config { config } => {
                let cfg = load_config(config.as_deref())?;
                run_config(&cfg, config.as_deref())?;
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests;
