//! Manifest reading: a header line, then one `id:key` record per line.
//!
//! Bad records never abort a run. They are collected as [`MalformedRecord`]s,
//! logged, and left out of the job list.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{MalformedReason, MalformedRecord, RunError};

/// Placeholder written by the manifest producer when no key was found.
const MISSING_KEY: &str = "NULL";

/// One well-formed `id:key` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    /// 1-based line number in the manifest.
    pub line: usize,
    pub id: String,
    pub key: String,
}

/// Parsed manifest: accepted records in file order plus everything skipped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub records: Vec<ManifestRecord>,
    pub skipped: Vec<MalformedRecord>,
}

/// Reads and parses the manifest at `path`. Only an unreadable file is fatal.
pub fn read_manifest(path: &Path) -> Result<Manifest, RunError> {
    let text = std::fs::read_to_string(path).map_err(|source| RunError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest = parse_manifest(&text);
    tracing::info!(
        path = %path.display(),
        records = manifest.records.len(),
        skipped = manifest.skipped.len(),
        "manifest loaded"
    );
    Ok(manifest)
}

/// Parses manifest text. The first line is the header and is always skipped.
pub fn parse_manifest(text: &str) -> Manifest {
    let mut manifest = Manifest::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, raw_line) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_record(line) {
            Ok((id, key)) => {
                if !seen.insert(id.to_string()) {
                    skip(&mut manifest, line_no, line, MalformedReason::DuplicateId);
                    continue;
                }
                manifest.records.push(ManifestRecord {
                    line: line_no,
                    id: id.to_string(),
                    key: key.to_string(),
                });
            }
            Err(reason) => skip(&mut manifest, line_no, line, reason),
        }
    }

    manifest
}

fn parse_record(line: &str) -> Result<(&str, &str), MalformedReason> {
    let parts: Vec<&str> = line.split(':').collect();
    let [id, key] = parts[..] else {
        return Err(MalformedReason::FieldCount(parts.len()));
    };
    let (id, key) = (id.trim(), key.trim());
    if id.is_empty() || key.is_empty() {
        return Err(MalformedReason::EmptyField);
    }
    if key.eq_ignore_ascii_case(MISSING_KEY) {
        return Err(MalformedReason::MissingKey);
    }
    Ok((id, key))
}

fn skip(manifest: &mut Manifest, line: usize, raw: &str, reason: MalformedReason) {
    let record = MalformedRecord {
        line,
        raw: raw.to_string(),
        reason,
    };
    tracing::warn!("skipping manifest record: {}", record);
    manifest.skipped.push(record);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(m: &Manifest) -> Vec<&str> {
        m.records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn header_is_skipped() {
        let m = parse_manifest("NUM:KEY\n1:abc\n2:def\n");
        assert_eq!(ids(&m), vec!["1", "2"]);
        assert_eq!(m.records[0].key, "abc");
        assert_eq!(m.records[0].line, 2);
        assert!(m.skipped.is_empty());
    }

    #[test]
    fn header_only_or_empty() {
        assert!(parse_manifest("").records.is_empty());
        assert!(parse_manifest("NUM:KEY").records.is_empty());
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let m = parse_manifest("NUM:KEY\n1:abc\nnofields\n2:x:y\n3:def\n:zzz\n4:\n");
        assert_eq!(ids(&m), vec!["1", "3"]);
        let reasons: Vec<_> = m.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                MalformedReason::FieldCount(1),
                MalformedReason::FieldCount(3),
                MalformedReason::EmptyField,
                MalformedReason::EmptyField,
            ]
        );
        assert_eq!(m.skipped[0].line, 3);
    }

    #[test]
    fn blank_lines_and_whitespace() {
        let m = parse_manifest("header\n\n   \n 7 : k7 \r\n");
        assert_eq!(ids(&m), vec!["7"]);
        assert_eq!(m.records[0].key, "k7");
        assert!(m.skipped.is_empty());
    }

    #[test]
    fn null_key_is_skipped() {
        let m = parse_manifest("NUM:KEY\n001:NULL\n002:abc\n");
        assert_eq!(ids(&m), vec!["002"]);
        assert_eq!(m.skipped[0].reason, MalformedReason::MissingKey);
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let m = parse_manifest("NUM:KEY\n1:first\n1:second\n");
        assert_eq!(m.records.len(), 1);
        assert_eq!(m.records[0].key, "first");
        assert_eq!(m.skipped[0].reason, MalformedReason::DuplicateId);
    }

    #[test]
    fn read_missing_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(&dir.path().join("episodes.txt")).unwrap_err();
        assert!(matches!(err, RunError::ManifestRead { .. }));
    }

    #[test]
    fn read_manifest_from_disk() {
        let f = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(f.path(), "NUM:KEY\n1:abc\n2:def\n").unwrap();
        let m = read_manifest(f.path()).unwrap();
        assert_eq!(ids(&m), vec!["1", "2"]);
    }
}
