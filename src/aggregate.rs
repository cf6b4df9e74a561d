use crate::report::{ReportWriter, render_result, status_label};
use crate::types::{Counters, Outcome};
use anyhow::Result;
use tracing::debug;

/// Single reducer for invocation outcomes: counters, console lines and the
/// failure report are only touched from here, one outcome at a time.
#[derive(Debug)]
pub struct Aggregator {
    counters: Counters,
    report: ReportWriter,
    show_result: bool,
    quiet: bool,
}

impl Aggregator {
    pub fn new(report: ReportWriter, show_result: bool) -> Self {
        Self {
            counters: Counters::default(),
            report,
            show_result,
            quiet: false,
        }
    }

    /// No console output; used when the caller renders results itself.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn record(&mut self, outcome: &Outcome) -> Result<()> {
        self.counters.record(outcome.variant, outcome.passed);
        if !self.quiet {
            if self.show_result {
                print!("{}", render_result(outcome));
            }
            println!(
                "{} {}: {}",
                outcome.name,
                outcome.variant.description(),
                status_label(outcome.passed)
            );
        }
        if let Some(detail) = &outcome.detail {
            debug!(test = %outcome.name, variant = %outcome.variant, "{detail}");
        }
        if !outcome.passed {
            self.report.record_failure(outcome)?;
        }
        Ok(())
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Writes the summary line and hands back the final counts.
    pub fn finish(self) -> Result<Counters> {
        self.report.finish(&self.counters.overall)?;
        Ok(self.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Tally, Variant};

    fn outcome(variant: Variant, passed: bool) -> Outcome {
        Outcome {
            name: "test004_0".into(),
            variant,
            passed,
            output: "OK".into(),
            exit_code: Some(0),
            expected: Some("OK".into()),
            detail: None,
        }
    }

    fn balanced(t: &Tally) -> bool {
        t.succeeded + t.failed == t.attempted
    }

    #[test]
    fn every_outcome_lands_in_exactly_one_bucket_per_tally() {
        let mut agg = Aggregator::new(ReportWriter::disabled(), false).quiet();
        let outcomes = [
            outcome(Variant::Sync, true),
            outcome(Variant::Async, true),
            outcome(Variant::Sync, false),
            outcome(Variant::Async, true),
            outcome(Variant::Async, false),
        ];
        for o in &outcomes {
            agg.record(o).unwrap();
        }
        let c = agg.finish().unwrap();
        for t in [&c.overall, &c.sync, &c.r#async, &c.command_line] {
            assert!(balanced(t), "{t:?}");
        }
        assert_eq!(c.overall.attempted, outcomes.len());
        assert_eq!(c.command_line, c.overall);
        assert_eq!(c.sync.attempted + c.r#async.attempted, c.overall.attempted);
        assert_eq!(c.sync, Tally { attempted: 2, succeeded: 1, failed: 1 });
        assert_eq!(c.r#async, Tally { attempted: 3, succeeded: 2, failed: 1 });
    }
}
