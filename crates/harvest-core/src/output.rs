//! Output layout: artifact directory, deterministic artifact names, and
//! turning manifest records into jobs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::HarvestConfig;
use crate::error::RunError;
use crate::job::Job;
use crate::manifest::ManifestRecord;

/// Placeholder in the priming URL template replaced by the job id.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Creates the output directory (and parents). Idempotent.
pub fn ensure_output_dir(dir: &Path) -> Result<(), RunError> {
    std::fs::create_dir_all(dir).map_err(|source| RunError::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })
}

/// Sanitizes a job id for use as a file stem on Linux.
///
/// Separators, NUL and control characters become `_`, runs of `_` collapse,
/// and leading/trailing dots, spaces and underscores are trimmed so an id can
/// never climb out of the output directory.
pub fn artifact_stem(id: &str) -> String {
    const NAME_MAX: usize = 200;

    let mut out = String::with_capacity(id.len());
    let mut prev_underscore = false;
    for c in id.chars() {
        let c = if c == '/' || c == '\\' || c == ' ' || c.is_control() {
            '_'
        } else {
            c
        };
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_' || c == ' ');
    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    if take == 0 {
        return "job".to_string();
    }
    trimmed[..take].to_string()
}

/// `<dir>/<stem>.<extension>`.
pub fn artifact_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        dir.join(stem)
    } else {
        dir.join(format!("{}.{}", stem, extension))
    }
}

/// Renders the priming URL for `id`. Returns `None` (with a warning) when the
/// rendered URL is not a valid absolute URL.
pub fn priming_url_for(template: &str, id: &str) -> Option<String> {
    let rendered = template.replace(ID_PLACEHOLDER, id);
    match url::Url::parse(&rendered) {
        Ok(u) => Some(u.to_string()),
        Err(e) => {
            tracing::warn!(job_id = id, url = %rendered, "invalid priming URL, job runs unprimed: {}", e);
            None
        }
    }
}

/// Builds jobs from manifest records in order.
///
/// If `with_priming` is false or the config has no `[priming]` section, jobs
/// carry no priming URL. Two ids that sanitize to the same stem get `-2`,
/// `-3`, ... suffixes so no two jobs share an artifact.
pub fn build_jobs(records: &[ManifestRecord], cfg: &HarvestConfig, with_priming: bool) -> Vec<Job> {
    let template = cfg
        .priming
        .as_ref()
        .filter(|_| with_priming)
        .map(|p| p.url_template.as_str());
    let mut used: HashSet<String> = HashSet::new();

    records
        .iter()
        .map(|r| {
            let base = artifact_stem(&r.id);
            let mut stem = base.clone();
            let mut n = 2u32;
            while !used.insert(stem.clone()) {
                stem = format!("{}-{}", base, n);
                n += 1;
            }
            let output_path = artifact_path(&cfg.output_dir, &stem, &cfg.output_extension);
            let priming_url = template.and_then(|t| priming_url_for(t, &r.id));
            Job::new(r.id.clone(), r.key.clone(), output_path, priming_url)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrimingConfig;
    use crate::manifest::parse_manifest;

    #[test]
    fn stem_is_safe() {
        assert_eq!(artifact_stem("001"), "001");
        assert_eq!(artifact_stem("../../etc/passwd"), "etc_passwd");
        assert_eq!(artifact_stem("a b\\c"), "a_b_c");
        assert_eq!(artifact_stem(".."), "job");
    }

    #[test]
    fn path_uses_extension() {
        let dir = Path::new("./tv/SSNHP");
        assert_eq!(artifact_path(dir, "12", "mp4"), PathBuf::from("./tv/SSNHP/12.mp4"));
        assert_eq!(artifact_path(dir, "12", ".mkv"), PathBuf::from("./tv/SSNHP/12.mkv"));
        assert_eq!(artifact_path(dir, "12", ""), PathBuf::from("./tv/SSNHP/12"));
    }

    #[test]
    fn priming_url_template() {
        assert_eq!(
            priming_url_for("https://example.com/show/?episode={id}", "007").as_deref(),
            Some("https://example.com/show/?episode=007")
        );
        assert_eq!(priming_url_for("not a url {id}", "1"), None);
    }

    #[test]
    fn build_jobs_in_manifest_order() {
        let m = parse_manifest("NUM:KEY\n2:def\n1:abc\n");
        let cfg = HarvestConfig {
            output_dir: PathBuf::from("/out"),
            priming: Some(PrimingConfig {
                url_template: "https://example.com/e/{id}".to_string(),
                browser_path: PathBuf::from("/usr/bin/chromium"),
                settle_secs: 5,
                user_agent: None,
                no_sandbox: true,
            }),
            ..HarvestConfig::default()
        };

        let jobs = build_jobs(&m.records, &cfg, true);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id(), "2");
        assert_eq!(jobs[0].access_key(), "def");
        assert_eq!(jobs[0].output_path(), Path::new("/out/2.mp4"));
        assert_eq!(jobs[0].priming_url(), Some("https://example.com/e/2"));

        let unprimed = build_jobs(&m.records, &cfg, false);
        assert!(unprimed.iter().all(|j| j.priming_url().is_none()));
    }

    #[test]
    fn colliding_stems_get_suffixes() {
        let m = parse_manifest("NUM:KEY\na/b:k1\na_b:k2\n");
        let jobs = build_jobs(&m.records, &HarvestConfig::default(), false);
        assert_eq!(jobs[0].output_path().file_name().unwrap(), "a_b.mp4");
        assert_eq!(jobs[1].output_path().file_name().unwrap(), "a_b-2.mp4");
    }

    #[test]
    fn ensure_output_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("tv").join("show");
        ensure_output_dir(&out).unwrap();
        ensure_output_dir(&out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn ensure_output_dir_over_file_fails() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let err = ensure_output_dir(&f.path().join("sub")).unwrap_err();
        assert!(matches!(err, RunError::DirectoryCreate { .. }));
    }
}
