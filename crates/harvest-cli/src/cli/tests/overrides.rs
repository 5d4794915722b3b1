//! Tests for command-line overrides of the loaded config.

use std::path::PathBuf;

use crate::cli::{apply_overrides, load_config, ModeArg};
use harvest_core::config::{HarvestConfig, ScheduleMode};

#[test]
fn flags_override_config() {
    let cfg = apply_overrides(
        HarvestConfig::default(),
        Some(2),
        Some(ModeArg::Semaphore),
        Some(PathBuf::from("/srv/out")),
    );
    assert_eq!(cfg.concurrency_limit, 2);
    assert_eq!(cfg.schedule_mode, ScheduleMode::Semaphore);
    assert_eq!(cfg.output_dir, PathBuf::from("/srv/out"));
}

#[test]
fn absent_flags_keep_config() {
    let base = HarvestConfig {
        concurrency_limit: 7,
        ..HarvestConfig::default()
    };
    assert_eq!(apply_overrides(base.clone(), None, None, None), base);
}

#[test]
fn zero_jobs_is_clamped_later() {
    let cfg = apply_overrides(HarvestConfig::default(), Some(0), None, None);
    assert_eq!(cfg.effective_concurrency(), 1);
}

#[test]
fn explicit_config_file_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("harvest.toml");
    std::fs::write(
        &path,
        r#"
concurrency_limit = 3
schedule_mode = "semaphore"
output_dir = "./tv/SSNHP"
output_extension = "mp4"
poll_interval_secs = 5
suspicious_below_bytes = 10485760
"#,
    )
    .unwrap();
    let cfg = load_config(Some(path.as_path())).unwrap();
    assert_eq!(cfg.concurrency_limit, 3);
    assert_eq!(cfg.schedule_mode, ScheduleMode::Semaphore);
    assert_eq!(cfg.tool.program, "java");

    assert!(load_config(Some(dir.path().join("missing.toml").as_path())).is_err());
}
