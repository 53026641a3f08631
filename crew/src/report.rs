use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

pub use grant_tools::REPORT_SECTIONS;

/// Longest file-name stem in bytes; keeps the whole name under the common
/// 255-byte limit.
const MAX_STEM_BYTES: usize = 200;

/// `Grant_Report_<org type>.md`, with whitespace and path separators turned
/// into `_` so the file always lands in the output directory. Very long
/// organization types are cut at a character boundary.
///
/// Two runs for the same organization type write the same file.
pub fn artifact_name(org_type: &str) -> String {
    let mut stem = String::new();
    for c in org_type.trim().chars() {
        let c = if c.is_whitespace() || matches!(c, '/' | '\\') {
            '_'
        } else {
            c
        };
        if stem.len() + c.len_utf8() > MAX_STEM_BYTES {
            break;
        }
        stem.push(c);
    }
    format!("Grant_Report_{stem}.md")
}

pub fn save(dir: &Path, org_type: &str, report: &str) -> io::Result<PathBuf> {
    let path = dir.join(artifact_name(org_type));
    std::fs::write(&path, report)?;
    Ok(path)
}

/// Saves the report for the operator. The report has already been printed,
/// so a failed write is logged and the run still succeeds.
pub fn persist(dir: &Path, org_type: &str, report: &str) -> Option<PathBuf> {
    match save(dir, org_type, report) {
        Ok(path) => {
            info!(path = %path.display(), "report saved");
            Some(path)
        }
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not save report file");
            None
        }
    }
}

/// Differences between the report's top-level sections and the required
/// outline. Empty when the report matches exactly.
pub fn outline_deviations(report: &str) -> Vec<String> {
    let headings: Vec<&str> = report
        .lines()
        .filter_map(|line| {
            let line = line.trim_end();
            line.strip_prefix("## ").or_else(|| line.strip_prefix("# "))
        })
        .map(str::trim)
        .collect();

    let mut deviations = Vec::new();
    for section in REPORT_SECTIONS {
        if !headings.contains(&section) {
            deviations.push(format!("missing section '{section}'"));
        }
    }
    for heading in &headings {
        if !REPORT_SECTIONS.contains(heading) {
            deviations.push(format!("unexpected section '{heading}'"));
        }
    }
    if deviations.is_empty() && headings.as_slice() != REPORT_SECTIONS.as_slice() {
        deviations.push("sections are out of order or repeated".to_string());
    }
    deviations
}
