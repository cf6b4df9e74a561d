use crate::aggregate::Aggregator;
use crate::catalog::Catalog;
use crate::engine::{RunContext, plan_invocations, run_invocations};
use crate::filter::select_cases;
use crate::fixtures::{FixtureSource, bootstrap};
use crate::host::HostInfo;
use crate::options::RunOptions;
use crate::report::{ReportHeader, ReportWriter, print_summary};
use crate::tool::Tool;
use crate::types::Counters;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Bootstrapping,
    Filtering,
    Running,
    Aggregating,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Bootstrapping => "bootstrapping",
            Stage::Filtering => "filtering",
            Stage::Running => "running",
            Stage::Aggregating => "aggregating",
            Stage::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failures,
    InternalError,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failures => 1,
            RunStatus::InternalError => 2,
        }
    }

    pub fn from_counters(counters: &Counters) -> Self {
        if counters.overall.failed > 0 {
            RunStatus::Failures
        } else {
            RunStatus::Success
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub counters: Counters,
    /// Invocations spawned; equals `counters.overall.attempted`.
    pub launched: usize,
}

pub struct Orchestrator<'a, T: Tool> {
    tool: Arc<T>,
    catalog: &'a Catalog,
    options: &'a RunOptions,
    host: &'a HostInfo,
    stage: Stage,
    console: bool,
}

impl<'a, T: Tool> Orchestrator<'a, T> {
    pub fn new(
        tool: Arc<T>,
        catalog: &'a Catalog,
        options: &'a RunOptions,
        host: &'a HostInfo,
    ) -> Self {
        Self {
            tool,
            catalog,
            options,
            host,
            stage: Stage::Idle,
            console: true,
        }
    }

    /// Suppresses per-invocation lines and the printed summary.
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        info!("{} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn report_writer(&self) -> Result<ReportWriter> {
        if self.options.no_report {
            return Ok(ReportWriter::disabled());
        }
        let header = ReportHeader {
            date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            runtime_version: self.host.runtime_version_text.clone(),
            os: self.host.os.clone(),
            os_release: self.host.os_release.clone(),
            tool_version: self.host.tool_version.clone(),
        };
        ReportWriter::create(self.catalog.config.report.clone(), &header)
    }

    /// Drives one complete run. Per-test failures are counted; any other
    /// error aborts with the stage it happened in.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let (catalog, options, host) = (self.catalog, self.options, self.host);
        let config = &catalog.config;

        self.enter(Stage::Bootstrapping);
        let source = if options.unpacked {
            FixtureSource::Unpacked(config.unpacked.clone())
        } else {
            FixtureSource::Archive(config.archive.clone())
        };
        let fixtures = bootstrap(&source).with_context(|| format!("{} failed", self.stage))?;
        if self.console {
            println!("Test dir: {}", fixtures.path().display());
        }

        self.enter(Stage::Filtering);
        let selected = select_cases(&catalog.cases, host, options.single_test.as_deref());
        info!(
            selected = selected.len(),
            total = catalog.cases.len(),
            "cases selected for {}",
            host.os
        );

        let ctx = RunContext {
            fixture_root: fixtures.path().to_path_buf(),
            expected_dir: config.expected.clone(),
            async_flag: config.async_flag.clone(),
            stats_flag: config.stats_flag.clone(),
        };
        let report = self
            .report_writer()
            .with_context(|| format!("{} failed", self.stage))?;
        let mut aggregator = Aggregator::new(report, options.show_result);
        if !self.console {
            aggregator = aggregator.quiet();
        }

        self.enter(Stage::Running);
        let planned = plan_invocations(&selected, &ctx);
        let launched = run_invocations(Arc::clone(&self.tool), planned, &ctx, |outcome| {
            aggregator.record(&outcome)
        })
        .await
        .with_context(|| format!("{} failed", self.stage))?;

        self.enter(Stage::Aggregating);
        if self.console {
            print_summary(aggregator.counters());
        }

        self.enter(Stage::Reporting);
        let counters = aggregator
            .finish()
            .with_context(|| format!("{} failed", self.stage))?;

        // Fixture temp dir is removed here.
        drop(fixtures);
        Ok(RunSummary { counters, launched })
    }
}

/// Maps a finished run (or its error) to the harness exit status.
pub fn conclude(result: &Result<RunSummary>) -> RunStatus {
    match result {
        Ok(summary) => RunStatus::from_counters(&summary.counters),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error occurred: {e:#}");
            RunStatus::InternalError
        }
    }
}
