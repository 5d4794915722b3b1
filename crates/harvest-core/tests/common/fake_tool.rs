//! Shell-script stand-in for the acquisition tool.
//!
//! Invoked as `sh -c <script> sh <key> <mode> -o <path>`, so the script sees
//! the access key in `$1` and the output path in `$4`. The key picks the
//! behaviour, which lets one config drive jobs with different results.

#![allow(dead_code)]

use std::path::Path;

use harvest_core::config::{HarvestConfig, ToolConfig, ToolOutput};

pub const MIB: u64 = 1024 * 1024;
pub const THRESHOLD: u64 = 10 * MIB;

/// Keys understood by [`script`]:
///
/// - `exact`: writes exactly 10 MiB, exits 0
/// - `large`: writes 12 MiB, exits 0
/// - `small`: writes a few bytes, exits 0
/// - `fail-large`: writes 12 MiB, prints to stderr, exits 2
/// - `none`: writes nothing, exits 0
/// - `slow`: appends start/end marks to the trace file around a short sleep, writes 12 MiB
/// - `hang`: sleeps for a long time
/// - `interrupt`: sends SIGINT to its parent and then to itself, as a terminal Ctrl-C would
pub fn script(trace: &Path) -> String {
    format!(
        r#"
out="$4"
case "$1" in
  exact) dd if=/dev/zero of="$out" bs=1048576 count=10 2>/dev/null ;;
  large) dd if=/dev/zero of="$out" bs=1048576 count=12 2>/dev/null ;;
  small) printf 'tiny' > "$out" ;;
  fail-large) dd if=/dev/zero of="$out" bs=1048576 count=12 2>/dev/null; echo 'upstream refused' >&2; exit 2 ;;
  none) : ;;
  slow)
    echo "start $out" >> '{trace}'
    sleep 0.2
    dd if=/dev/zero of="$out" bs=1048576 count=12 2>/dev/null
    echo "end $out" >> '{trace}'
    ;;
  hang) sleep 30 ;;
  interrupt) sleep 0.1; kill -INT $PPID; kill -INT $$; sleep 30 ;;
  *) echo "unknown key $1" >&2; exit 9 ;;
esac
"#,
        trace = trace.display()
    )
}

/// Config whose tool is the fake script, writing into `output_dir`.
pub fn config(output_dir: &Path, trace: &Path, limit: usize) -> HarvestConfig {
    HarvestConfig {
        concurrency_limit: limit,
        output_dir: output_dir.to_path_buf(),
        poll_interval_secs: 1,
        tool: ToolConfig {
            program: "sh".to_string(),
            base_args: vec!["-c".to_string(), script(trace), "sh".to_string()],
            mode_flag: "h".to_string(),
            output: ToolOutput::Capture,
        },
        ..HarvestConfig::default()
    }
}

/// Writes a manifest with the usual header line.
pub fn manifest(dir: &Path, records: &[(&str, &str)]) -> std::path::PathBuf {
    let mut text = String::from("42:KEY\n");
    for (id, key) in records {
        text.push_str(&format!("{}:{}\n", id, key));
    }
    let path = dir.join("episodes.txt");
    std::fs::write(&path, text).unwrap();
    path
}

/// Start/end marks from the trace file, as `(mark, file stem)` pairs.
pub fn trace_marks(trace: &Path) -> Vec<(String, String)> {
    let text = std::fs::read_to_string(trace).unwrap_or_default();
    text.lines()
        .filter_map(|l| {
            let (mark, path) = l.split_once(' ')?;
            let stem = Path::new(path).file_stem()?.to_string_lossy().into_owned();
            Some((mark.to_string(), stem))
        })
        .collect()
}
