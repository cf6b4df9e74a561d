use crate::stats::StatsPredicate;
use semver::VersionReq;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Exit code the tool uses for invocation/usage errors. Output is not
/// compared for cases expecting it.
pub const USAGE_ERROR_EXIT: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    Sync,
    Async,
}

impl Variant {
    pub fn label(self) -> &'static str {
        match self {
            Variant::Sync => "sync",
            Variant::Async => "async",
        }
    }

    /// Text used in console lines and report records.
    pub fn description(self) -> String {
        format!("command line {}", self.label())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Print parameters of the case, kept from the catalog for library-level
/// runners. The command line harness reads them but never prints them.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct DisplayOptions {
    pub show_all: bool,
    pub whole_report: bool,
    pub nocolors: bool,
    pub csv: bool,
    pub no_diff_indicator: bool,
    pub reason: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedOutput {
    Literal(String),
    /// `<expected dir>/<test name>.txt`
    Fixture,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    ExitCodeOnly,
    Output(ExpectedOutput),
    Stats(StatsPredicate),
}

#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub description: Option<String>,
    pub path1: String,
    pub path2: String,
    pub relative_paths: bool,
    /// Option string as written in the catalog.
    pub options: String,
    /// `options` split shell-style.
    pub option_args: Vec<String>,
    pub exit_code: i32,
    pub expectation: Expectation,
    pub display: DisplayOptions,
    pub only_library: bool,
    pub only_sync: bool,
    pub only_async: bool,
    pub exclude_platforms: Vec<String>,
    /// node-semver style range: a bare version (`2.5.0`) matches exactly,
    /// comparators may be separated by spaces or commas.
    pub runtime_version: Option<VersionReq>,
}

impl TestCase {
    pub fn variants(&self) -> Vec<Variant> {
        if self.only_sync {
            vec![Variant::Sync]
        } else if self.only_async {
            vec![Variant::Async]
        } else {
            vec![Variant::Sync, Variant::Async]
        }
    }
}

/// One process launch of the tool under test.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub case_name: String,
    pub variant: Variant,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRun {
    /// stdout followed by stderr
    pub output: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub name: String,
    pub variant: Variant,
    pub passed: bool,
    pub output: String,
    pub exit_code: Option<i32>,
    pub expected: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Tally {
    pub fn record(&mut self, passed: bool) {
        self.attempted += 1;
        if passed {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub overall: Tally,
    pub sync: Tally,
    pub r#async: Tally,
    pub command_line: Tally,
}

impl Counters {
    /// Every harness invocation goes through the command line, so it lands in
    /// `overall`, `command_line` and the tally of its variant.
    pub fn record(&mut self, variant: Variant, passed: bool) {
        self.overall.record(passed);
        self.command_line.record(passed);
        match variant {
            Variant::Sync => self.sync.record(passed),
            Variant::Async => self.r#async.record(passed),
        }
    }
}
