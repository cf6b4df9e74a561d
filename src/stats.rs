//! Structured comparison statistics printed by the tool, and the
//! predicates catalog cases evaluate over them.

use anyhow::{Result, anyhow};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SymlinkStatistics {
    pub distinct_symlinks: u64,
    pub equal_symlinks: u64,
    pub left_symlinks: u64,
    pub right_symlinks: u64,
    pub differences_symlinks: u64,
    pub total_symlinks: u64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(default)]
    pub distinct: u64,
    #[serde(default)]
    pub equal: u64,
    #[serde(default)]
    pub left: u64,
    #[serde(default)]
    pub right: u64,
    #[serde(default)]
    pub differences: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub same: Option<bool>,
    #[serde(default)]
    pub symlinks: Option<SymlinkStatistics>,
}

/// Entry counts a case pins down. Unlisted counts are not checked.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EntryCounts {
    pub distinct: Option<u64>,
    pub equal: Option<u64>,
    pub left: Option<u64>,
    pub right: Option<u64>,
    pub differences: Option<u64>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SymlinkKeyword {
    Absent,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SymlinkExpectation {
    Keyword(SymlinkKeyword),
    Counts(SymlinkStatistics),
}

/// `validate:` block of a catalog case. Every listed clause must hold.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StatsPredicate {
    pub symlinks: Option<SymlinkExpectation>,
    pub totals: Option<EntryCounts>,
}

impl StatsPredicate {
    pub fn is_empty(&self) -> bool {
        self.symlinks.is_none() && self.totals.is_none()
    }

    /// Returns the first violated clause, if any.
    pub fn check(&self, stats: &Statistics) -> Option<String> {
        match (&self.symlinks, &stats.symlinks) {
            (None, _) => {}
            (Some(SymlinkExpectation::Keyword(SymlinkKeyword::Absent)), None) => {}
            (Some(SymlinkExpectation::Keyword(SymlinkKeyword::Absent)), Some(actual)) => {
                return Some(format!("expected no symlink statistics, got {actual:?}"));
            }
            (Some(SymlinkExpectation::Counts(expected)), Some(actual)) if expected == actual => {}
            (Some(SymlinkExpectation::Counts(expected)), actual) => {
                return Some(format!(
                    "symlink statistics mismatch: expected {expected:?}, got {actual:?}"
                ));
            }
        }

        if let Some(totals) = &self.totals {
            let pairs = [
                ("distinct", totals.distinct, stats.distinct),
                ("equal", totals.equal, stats.equal),
                ("left", totals.left, stats.left),
                ("right", totals.right, stats.right),
                ("differences", totals.differences, stats.differences),
                ("total", totals.total, stats.total),
            ];
            for (name, want, got) in pairs {
                if let Some(want) = want {
                    if want != got {
                        return Some(format!("{name}: expected {want}, got {got}"));
                    }
                }
            }
        }
        None
    }
}

/// Finds the last single-line JSON object in the raw tool output and reads
/// it as statistics.
pub fn extract_statistics(raw_output: &str) -> Result<Statistics> {
    let mut last_error = None;
    for line in raw_output.lines().rev() {
        let line = line.trim();
        if !(line.starts_with('{') && line.ends_with('}')) {
            continue;
        }
        match serde_json::from_str::<Statistics>(line) {
            Ok(stats) => return Ok(stats),
            Err(e) => {
                if last_error.is_none() {
                    last_error = Some(e);
                }
            }
        }
    }
    match last_error {
        Some(e) => Err(anyhow!("statistics line is not valid: {e}")),
        None => Err(anyhow!("no statistics found in tool output")),
    }
}
