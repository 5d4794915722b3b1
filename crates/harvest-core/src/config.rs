use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Artifacts below this size are treated as failed or placeholder downloads.
pub const DEFAULT_SUSPICIOUS_BELOW_BYTES: u64 = 10 * 1024 * 1024;

/// How the scheduler admits jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// Consecutive groups of `concurrency_limit`; a group finishes before the next starts.
    #[default]
    Batch,
    /// One admission gate of `concurrency_limit` slots; a freed slot admits the next job.
    Semaphore,
}

/// What happens to the acquisition tool's stdout/stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutput {
    /// Shown on the operator's terminal.
    #[default]
    Inherit,
    /// Stdout discarded, stderr kept and attached to failures.
    Capture,
    Quiet,
}

/// External acquisition tool, invoked as `<program> <base_args..> <key> <mode_flag> -o <path>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub program: String,
    #[serde(default)]
    pub base_args: Vec<String>,
    pub mode_flag: String,
    #[serde(default)]
    pub output: ToolOutput,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            base_args: vec!["-jar".to_string(), "abyss-dl.jar".to_string()],
            mode_flag: "h".to_string(),
            output: ToolOutput::Inherit,
        }
    }
}

/// Optional browser priming section (`[priming]` in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimingConfig {
    /// Page to open per job; `{id}` is replaced with the job id.
    pub url_template: String,
    #[serde(default = "default_browser_path")]
    pub browser_path: PathBuf,
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_true")]
    pub no_sandbox: bool,
}

fn default_browser_path() -> PathBuf {
    PathBuf::from("/usr/bin/chromium")
}

fn default_settle_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl PrimingConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

/// Global configuration loaded from `~/.config/harvest/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Maximum number of jobs active at once (values below 1 are treated as 1).
    pub concurrency_limit: usize,
    #[serde(default)]
    pub schedule_mode: ScheduleMode,
    /// Directory receiving `<id>.<output_extension>` artifacts.
    pub output_dir: PathBuf,
    pub output_extension: String,
    /// Seconds between artifact size samples.
    pub poll_interval_secs: u64,
    /// Final size below this is reported as suspiciously small; equal or above succeeds.
    pub suspicious_below_bytes: u64,
    /// Warn when the artifact has not grown for this many seconds. Advisory only.
    #[serde(default)]
    pub stall_warn_after_secs: Option<u64>,
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub priming: Option<PrimingConfig>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            schedule_mode: ScheduleMode::Batch,
            output_dir: PathBuf::from("./downloads"),
            output_extension: "mp4".to_string(),
            poll_interval_secs: 5,
            suspicious_below_bytes: DEFAULT_SUSPICIOUS_BELOW_BYTES,
            stall_warn_after_secs: None,
            tool: ToolConfig::default(),
            priming: None,
        }
    }
}

impl HarvestConfig {
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_limit.max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn stall_warn_after(&self) -> Option<Duration> {
        self.stall_warn_after_secs.map(Duration::from_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("harvest")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HarvestConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HarvestConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file (e.g. `--config`).
pub fn load_from_path(path: &Path) -> Result<HarvestConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: HarvestConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
