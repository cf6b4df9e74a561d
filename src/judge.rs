use crate::normalize::normalize;
use crate::stats::extract_statistics;
use crate::types::{Expectation, ExpectedOutput, Outcome, RawRun, TestCase, Variant};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn expected_fixture_path(expected_dir: &Path, name: &str) -> PathBuf {
    expected_dir.join(format!("{name}.txt"))
}

fn load_expected(case: &TestCase, expected: &ExpectedOutput, expected_dir: &Path) -> Result<String> {
    match expected {
        ExpectedOutput::Literal(text) => Ok(normalize(text)),
        ExpectedOutput::Fixture => {
            let path = expected_fixture_path(expected_dir, &case.name);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("cannot read expected output {}", path.display()))?;
            Ok(normalize(&text))
        }
    }
}

/// Judges one invocation. Launch errors, missing fixtures and statistics
/// faults fail this invocation only.
pub fn judge(case: &TestCase, variant: Variant, run: Result<RawRun>, expected_dir: &Path) -> Outcome {
    let mut outcome = Outcome {
        name: case.name.clone(),
        variant,
        passed: false,
        output: String::new(),
        exit_code: None,
        expected: None,
        detail: None,
    };

    let run = match run {
        Ok(run) => run,
        Err(e) => {
            outcome.detail = Some(format!("{e:#}"));
            return outcome;
        }
    };
    outcome.output = normalize(&run.output);
    outcome.exit_code = run.exit_code;
    let exit_ok = run.exit_code == Some(case.exit_code);

    match &case.expectation {
        Expectation::ExitCodeOnly => {
            outcome.passed = exit_ok;
        }
        Expectation::Output(expected) => match load_expected(case, expected, expected_dir) {
            Ok(expected) => {
                outcome.passed = exit_ok && expected == outcome.output;
                outcome.expected = Some(expected);
            }
            Err(e) => outcome.detail = Some(format!("{e:#}")),
        },
        Expectation::Stats(predicate) => match extract_statistics(&run.output) {
            Ok(stats) => match predicate.check(&stats) {
                None => outcome.passed = exit_ok,
                Some(violation) => outcome.detail = Some(violation),
            },
            Err(e) => outcome.detail = Some(format!("{e:#}")),
        },
    }

    if !exit_ok && outcome.detail.is_none() {
        outcome.detail = Some(format!(
            "expected exit code {}, got {}",
            case.exit_code,
            run.exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string())
        ));
    }
    outcome
}
