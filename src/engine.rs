use crate::judge::judge;
use crate::tool::Tool;
use crate::types::{Expectation, ExpectedOutput, Invocation, Outcome, TestCase, Variant};
use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings shared by every invocation of a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub fixture_root: PathBuf,
    pub expected_dir: PathBuf,
    pub async_flag: String,
    pub stats_flag: Option<String>,
}

fn resolve_case_path(case: &TestCase, path: &str, fixture_root: &Path) -> String {
    if case.relative_paths {
        path.to_string()
    } else {
        fixture_root.join(path).to_string_lossy().into_owned()
    }
}

/// Tool arguments for one variant: options, async flag, stats flag, then
/// the two paths. Empty paths are left out.
pub fn build_args(case: &TestCase, variant: Variant, ctx: &RunContext) -> Vec<String> {
    let mut args = case.option_args.clone();
    if variant == Variant::Async {
        args.push(ctx.async_flag.clone());
    }
    if let (Expectation::Stats(_), Some(flag)) = (&case.expectation, &ctx.stats_flag) {
        args.push(flag.clone());
    }
    for path in [&case.path1, &case.path2] {
        if !path.is_empty() {
            args.push(resolve_case_path(case, path, &ctx.fixture_root));
        }
    }
    args
}

/// The case as it will be judged. Without a stats flag the tool prints no
/// statistics, so `validate:` cases fall back to their expected-output file.
pub fn judged_case(case: &TestCase, ctx: &RunContext) -> TestCase {
    let mut case = case.clone();
    if matches!(case.expectation, Expectation::Stats(_)) && ctx.stats_flag.is_none() {
        case.expectation = Expectation::Output(ExpectedOutput::Fixture);
    }
    case
}

pub fn plan_invocations(cases: &[&TestCase], ctx: &RunContext) -> Vec<(Arc<TestCase>, Invocation)> {
    let mut planned = Vec::new();
    for case in cases {
        let shared = Arc::new(judged_case(case, ctx));
        for variant in case.variants() {
            planned.push((
                Arc::clone(&shared),
                Invocation {
                    case_name: case.name.clone(),
                    variant,
                    args: build_args(case, variant, ctx),
                    current_dir: ctx.fixture_root.clone(),
                },
            ));
        }
    }
    planned
}

/// Spawns every planned invocation before awaiting any, then hands each
/// judged outcome to `on_outcome` in completion order. Returns the number
/// of invocations launched.
pub async fn run_invocations<T, F>(
    tool: Arc<T>,
    planned: Vec<(Arc<TestCase>, Invocation)>,
    ctx: &RunContext,
    mut on_outcome: F,
) -> Result<usize>
where
    T: Tool,
    F: FnMut(Outcome) -> Result<()>,
{
    let mut pending = FuturesUnordered::new();
    for (case, invocation) in planned {
        let tool = Arc::clone(&tool);
        let expected_dir = ctx.expected_dir.clone();
        pending.push(tokio::spawn(async move {
            let variant = invocation.variant;
            let run = tool.run(invocation).await;
            judge(&case, variant, run, &expected_dir)
        }));
    }
    let launched = pending.len();

    while let Some(joined) = pending.next().await {
        let outcome = joined.context("test task panicked")?;
        on_outcome(outcome)?;
    }
    Ok(launched)
}
