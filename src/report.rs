use crate::types::{Counters, Outcome, Tally};
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Identification written on the first line of the report.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub date: String,
    pub runtime_version: String,
    pub os: String,
    pub os_release: String,
    pub tool_version: String,
}

impl ReportHeader {
    pub fn line(&self) -> String {
        format!(
            "Date: {}, Runtime version: {}, OS platform: {}, OS release: {}, Tool version: {}\n",
            self.date, self.runtime_version, self.os, self.os_release, self.tool_version
        )
    }
}

/// Failure block for one invocation.
pub fn failure_record(outcome: &Outcome) -> String {
    let exit_code = outcome
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let output = if outcome.output.is_empty() {
        "n/a"
    } else {
        outcome.output.as_str()
    };
    let mut record = format!(
        "\n{} {} failed - result: {}, exitCode: {}, output: {}\n",
        outcome.name,
        outcome.variant.description(),
        outcome.passed,
        exit_code,
        output
    );
    if let Some(detail) = &outcome.detail {
        record.push_str(&format!("detail: {detail}\n"));
    }
    record
}

pub fn summary_line(overall: &Tally) -> String {
    format!(
        "Tests: {}, failed: {}, succeeded: {}\n",
        overall.attempted, overall.failed, overall.succeeded
    )
}

/// Append-only report artifact. Disabled writers accept every call and
/// touch nothing.
#[derive(Debug)]
pub struct ReportWriter {
    path: Option<PathBuf>,
}

impl ReportWriter {
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Replaces any previous report with a fresh one holding only the header.
    pub fn create(path: PathBuf, header: &ReportHeader) -> Result<Self> {
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("cannot remove old report {}", path.display()))?;
        }
        let writer = Self { path: Some(path) };
        writer.append(&header.line())?;
        Ok(writer)
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    fn append(&self, text: &str) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open report {}", path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("cannot write report {}", path.display()))
    }

    pub fn record_failure(&self, outcome: &Outcome) -> Result<()> {
        self.append(&failure_record(outcome))
    }

    pub fn finish(&self, overall: &Tally) -> Result<()> {
        self.append(&summary_line(overall))
    }
}

pub fn status_label(passed: bool) -> String {
    if passed {
        "Passed".green().to_string()
    } else {
        "!!!!FAILED!!!!".yellow().to_string()
    }
}

fn render_tally(label: &str, tally: &Tally) -> String {
    format!(
        "{}: {}, failed: {}, succeeded: {}",
        label,
        tally.attempted,
        tally.failed.to_string().yellow(),
        tally.succeeded.to_string().green()
    )
}

pub fn render_summary(counters: &Counters) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&render_tally("Command line tests", &counters.command_line));
    out.push('\n');
    out.push_str(&render_tally("  sync", &counters.sync));
    out.push('\n');
    out.push_str(&render_tally("  async", &counters.r#async));
    out.push_str("\n\n");
    out.push_str(&render_tally("All tests", &counters.overall));
    out.push('\n');
    out
}

pub fn print_summary(counters: &Counters) {
    print!("{}", render_summary(counters));
}

pub fn render_result(outcome: &Outcome) -> String {
    let expected = outcome.expected.as_deref().unwrap_or("");
    format!(
        "Actual:\n{}\nExpected:\n{}\nResult: {}\n",
        outcome.output,
        expected,
        outcome.output == expected
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Variant;

    fn outcome(passed: bool, exit_code: Option<i32>, output: &str) -> Outcome {
        Outcome {
            name: "test001_1".into(),
            variant: Variant::Async,
            passed,
            output: output.into(),
            exit_code,
            expected: None,
            detail: None,
        }
    }

    #[test]
    fn failure_record_format() {
        assert_eq!(
            failure_record(&outcome(false, Some(0), "")),
            "\ntest001_1 command line async failed - result: false, exitCode: 0, output: n/a\n"
        );
        let mut crashed = outcome(false, None, "boom");
        crashed.detail = Some("tool timed out after 5 s".into());
        assert_eq!(
            failure_record(&crashed),
            "\ntest001_1 command line async failed - result: false, exitCode: n/a, output: boom\ndetail: tool timed out after 5 s\n"
        );
    }

    #[test]
    fn summary_counts() {
        colored::control::set_override(false);
        let mut counters = Counters::default();
        counters.record(Variant::Sync, true);
        counters.record(Variant::Async, false);
        let text = render_summary(&counters);
        assert!(text.contains("Command line tests: 2, failed: 1, succeeded: 1"));
        assert!(text.contains("All tests: 2, failed: 1, succeeded: 1"));
        assert_eq!(
            summary_line(&counters.overall),
            "Tests: 2, failed: 1, succeeded: 1\n"
        );
    }

    #[test]
    fn disabled_writer_is_silent() {
        let writer = ReportWriter::disabled();
        assert!(!writer.is_enabled());
        writer.record_failure(&outcome(false, Some(1), "x")).unwrap();
        writer.finish(&Tally::default()).unwrap();
    }
}
