//! `harvest plan` – show what a run would execute.

use std::path::Path;

use anyhow::Result;
use harvest_core::config::HarvestConfig;
use harvest_core::manifest::{read_manifest, Manifest};
use harvest_core::output::build_jobs;
use harvest_core::runner::AcquisitionCommand;

pub fn run_plan(cfg: &HarvestConfig, manifest_path: &Path) -> Result<()> {
    let manifest = read_manifest(manifest_path)?;
    for line in plan_lines(cfg, &manifest) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per job command, then its priming URL if any, then skipped records.
pub(crate) fn plan_lines(cfg: &HarvestConfig, manifest: &Manifest) -> Vec<String> {
    let command = AcquisitionCommand::from_config(&cfg.tool);
    let jobs = build_jobs(&manifest.records, cfg, true);
    let mut lines = vec![format!(
        "# {} job(s), {} at a time ({:?}), into {}",
        jobs.len(),
        cfg.effective_concurrency(),
        cfg.schedule_mode,
        cfg.output_dir.display()
    )];
    for job in &jobs {
        lines.push(command.display_for(job));
        if let Some(url) = job.priming_url() {
            lines.push(format!("#   prime {}", url));
        }
    }
    for skipped in &manifest.skipped {
        lines.push(format!("# skipped {}", skipped));
    }
    lines
}
