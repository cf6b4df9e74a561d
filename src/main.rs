use anyhow::{Context, Result};
use clap::Parser;
use colored::control::set_override as set_color_override;
use dircompare_conformance::catalog::load_catalog;
use dircompare_conformance::host::HostInfo;
use dircompare_conformance::options::RunOptions;
use dircompare_conformance::orchestrator::{Orchestrator, RunSummary, conclude};
use dircompare_conformance::tool::ExternalTool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "Runs the dircompare conformance catalog against the command line tool"
)]
struct Cli {
    // Legacy bare tokens: unpacked, showresult, noreport, testNNN_N.
    // Unknown ones, dashed or not, are warned about and ignored.
    #[arg(value_name = "TOKENS", allow_hyphen_values = true)]
    tokens: Vec<String>,

    /// Catalog file or directory of catalog files
    #[arg(long, value_name = "PATH", default_value = "conformance/catalog.yaml")]
    catalog: PathBuf,

    /// Use the pre-extracted fixture directory instead of the archive
    #[arg(long)]
    unpacked: bool,

    /// Run a single test by exact name
    #[arg(short = 't', long = "test", value_name = "NAME")]
    test: Option<String>,

    /// Print actual and expected output for each invocation
    #[arg(long = "show-result")]
    show_result: bool,

    /// Do not write the report file
    #[arg(long = "no-report")]
    no_report: bool,

    /// Override the tool under test
    #[arg(long, value_name = "FILE")]
    tool: Option<PathBuf>,

    /// Override the runtime used to launch the tool
    #[arg(long, value_name = "CMD")]
    runtime: Option<String>,

    /// Override the fixture archive
    #[arg(long, value_name = "FILE")]
    archive: Option<PathBuf>,

    /// Override the pre-extracted fixture directory
    #[arg(long, value_name = "DIR")]
    fixtures: Option<PathBuf>,

    /// Override the expected output directory
    #[arg(long, value_name = "DIR")]
    expected: Option<PathBuf>,

    /// Override the report file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Seconds before an invocation is killed
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[arg(long = "no-color")]
    no_color: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        let mut options = RunOptions {
            unpacked: self.unpacked,
            single_test: self.test.clone(),
            show_result: self.show_result,
            no_report: self.no_report,
        };
        options.apply_tokens(&self.tokens);
        options
    }
}

async fn run(cli: Cli) -> Result<RunSummary> {
    let mut catalog = load_catalog(&cli.catalog)
        .with_context(|| format!("cannot load catalog {}", cli.catalog.display()))?;

    // Override from CLI
    let config = &mut catalog.config;
    if let Some(tool) = &cli.tool {
        config.tool = tool.clone();
    }
    if let Some(runtime) = &cli.runtime {
        config.runtime = Some(runtime.trim().to_string());
    }
    if let Some(archive) = &cli.archive {
        config.archive = archive.clone();
    }
    if let Some(dir) = &cli.fixtures {
        config.unpacked = dir.clone();
    }
    if let Some(dir) = &cli.expected {
        config.expected = dir.clone();
    }
    if let Some(report) = &cli.report {
        config.report = report.clone();
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
    }

    let options = cli.run_options();
    let host = HostInfo::detect(&catalog.config);
    info!(
        os = %host.os,
        release = %host.os_release,
        runtime = %host.runtime_version_text,
        tool_version = %host.tool_version,
        "host detected"
    );

    let tool = ExternalTool::new(
        &catalog.config.tool,
        catalog.config.runtime.as_deref(),
        catalog.config.timeout,
    )?;
    info!("tool command: {}", tool.program.display());

    let mut orchestrator = Orchestrator::new(Arc::new(tool), &catalog, &options, &host);
    orchestrator.run().await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "dircompare_conformance=info".to_string())
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "dircompare_conformance=warn".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    set_color_override(!cli.no_color);

    let result = run(cli).await;
    let status = conclude(&result);
    std::process::exit(status.exit_code());
}
