//! Bounded worker pool driving the per-test pipeline.
//!
//! Workers claim cases through a shared index and send each finished
//! [`TestReport`] over a channel to one aggregator thread, the only writer of
//! the result table. A setup error in any worker stops new cases from
//! starting; cases already running finish, then the first error is returned.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::case::TestCase;
use crate::compare::matches_reference;
use crate::process::{Execution, Limits, SubjectCommand, run_subject};
use crate::report::{Report, Reporter};
use crate::verdict::TestReport;

/// Process-wide settings shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub limits: Limits,
    /// Where normalized subject output is captured, if anywhere.
    pub capture_dir: Option<PathBuf>,
    pub workers: usize,
}

/// Run one case end to end: spawn, race the timeout, compare.
///
/// Execution failures come back as an `Error` report. Only setup failures
/// (unreadable input or reference, failed capture write) are returned as `Err`.
#[instrument(skip_all, fields(test = %case.name))]
pub fn judge_case(
    command: &SubjectCommand,
    case: &TestCase,
    cfg: &RunConfig,
) -> Result<TestReport> {
    let input = File::open(&case.input)
        .with_context(|| format!("open input {}", case.input.display()))?;

    let started = Instant::now();
    match run_subject(command, input, &cfg.limits) {
        Ok(Execution::Completed { stdout, elapsed }) => {
            let matched = matches_reference(case, &stdout, cfg.capture_dir.as_deref())?;
            Ok(TestReport::judged(&case.name, matched, elapsed))
        }
        Ok(Execution::TimedOut { kill_error, .. }) => Ok(TestReport::timed_out(
            &case.name,
            cfg.limits.timeout,
            kill_error,
        )),
        Err(err) => {
            warn!(err = %err, "subject run failed");
            Ok(TestReport::errored(&case.name, started.elapsed(), err.to_string()))
        }
    }
}

/// Judge every case with a pool of `cfg.workers` threads.
///
/// Returns the finished report, or the first setup error. On error buffered
/// rows are discarded; a table already streamed in completion order is
/// closed with an `aborted` line.
pub fn run_suite<W: Write + Send>(
    command: &SubjectCommand,
    cases: &[TestCase],
    cfg: &RunConfig,
    reporter: Reporter<W>,
) -> Result<Report> {
    let workers = cfg.workers.min(cases.len()).max(1);
    info!(cases = cases.len(), workers, "judging");

    let next = AtomicUsize::new(0);
    let abort = AtomicBool::new(false);
    let failure: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let (tx, rx) = mpsc::channel::<TestReport>();

    let reporter = thread::scope(|scope| -> Result<Reporter<W>> {
        let aggregator = scope.spawn(move || -> io::Result<Reporter<W>> {
            let mut reporter = reporter;
            for report in rx {
                reporter.accept(report)?;
            }
            Ok(reporter)
        });

        for worker in 0..workers {
            let tx = tx.clone();
            let (next, abort, failure) = (&next, &abort, &failure);
            scope.spawn(move || {
                loop {
                    if abort.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(case) = cases.get(index) else {
                        break;
                    };
                    match judge_case(command, case, cfg) {
                        Ok(report) => {
                            debug!(
                                worker,
                                test = %report.name,
                                verdict = %report.verdict,
                                "test finished"
                            );
                            if tx.send(report).is_err() {
                                abort.store(true, Ordering::SeqCst);
                                break;
                            }
                        }
                        Err(err) => {
                            abort.store(true, Ordering::SeqCst);
                            let mut slot =
                                failure.lock().unwrap_or_else(PoisonError::into_inner);
                            if slot.is_none() {
                                *slot = Some(err.context(format!("test {}", case.name)));
                            }
                            break;
                        }
                    }
                }
            });
        }
        drop(tx);

        aggregator
            .join()
            .map_err(|_| anyhow!("report aggregator panicked"))?
            .context("write report")
    })?;

    if let Some(err) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
        if let Err(write_err) = reporter.abort() {
            warn!(err = %write_err, "failed to mark aborted report");
        }
        return Err(err);
    }
    let report = reporter.finish().context("write report")?;
    info!(summary = %report.summary, "judging complete");
    Ok(report)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::report::ReportOrder;
    use crate::test_support::{FixtureDir, shell};
    use crate::verdict::Verdict;
    use std::time::Duration;

    fn config(workers: usize) -> RunConfig {
        RunConfig {
            limits: Limits {
                timeout: Duration::from_secs(5),
                stderr_limit_bytes: 256,
            },
            capture_dir: None,
            workers,
        }
    }

    #[test]
    fn every_case_yields_exactly_one_report() {
        let fixtures = FixtureDir::new().expect("fixtures");
        let mut cases = Vec::new();
        for n in 0..25 {
            let name = n.to_string();
            fixtures.add(&name, &format!("{n}\n"), &format!("{n}\n")).expect("fixture");
            cases.push(TestCase::new(&fixtures.tests_dir(), &name));
        }

        let mut out = Vec::new();
        let report = run_suite(
            &shell("cat"),
            &cases,
            &config(4),
            Reporter::new(&mut out, ReportOrder::Name),
        )
        .expect("run");

        assert_eq!(report.summary.total, 25);
        assert!(report.summary.all_passed());
        let names: Vec<String> = report.reports.iter().map(|r| r.name.clone()).collect();
        let expected: Vec<String> = (0..25).map(|n| n.to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn execution_error_does_not_abort_siblings() {
        let fixtures = FixtureDir::new().expect("fixtures");
        fixtures.add("ok", "1\n", "1\n").expect("fixture");
        fixtures.add("crash", "crash\n", "").expect("fixture");
        let dir = fixtures.tests_dir();
        let cases = vec![TestCase::new(&dir, "ok"), TestCase::new(&dir, "crash")];

        let subject = shell("read line; if [ \"$line\" = crash ]; then exit 7; fi; echo \"$line\"");
        let mut out = Vec::new();
        let report = run_suite(
            &subject,
            &cases,
            &config(2),
            Reporter::new(&mut out, ReportOrder::Name),
        )
        .expect("run");

        let crash = report.reports.iter().find(|r| r.name == "crash").expect("crash");
        assert_eq!(crash.verdict, Verdict::Error);
        assert!(crash.detail.as_deref().unwrap_or_default().contains('7'));
        let ok = report.reports.iter().find(|r| r.name == "ok").expect("ok");
        assert_eq!(ok.verdict, Verdict::Pass);
    }

    #[test]
    fn missing_reference_aborts_without_table() {
        let fixtures = FixtureDir::new().expect("fixtures");
        fixtures.add_file("lonely.in", "1\n").expect("fixture");
        let cases = vec![TestCase::new(&fixtures.tests_dir(), "lonely")];

        let mut out = Vec::new();
        let err = run_suite(
            &shell("cat"),
            &cases,
            &config(1),
            Reporter::new(&mut out, ReportOrder::Name),
        )
        .expect_err("setup error");

        let message = format!("{err:#}");
        assert!(message.contains("test lonely"));
        assert!(message.contains("lonely.out"));
        assert!(out.is_empty());
    }

    #[test]
    fn streamed_table_is_marked_aborted() {
        let fixtures = FixtureDir::new().expect("fixtures");
        fixtures.add("1", "1\n", "1\n").expect("fixture");
        fixtures.add_file("2.in", "2\n").expect("fixture");
        let dir = fixtures.tests_dir();
        let cases = vec![TestCase::new(&dir, "1"), TestCase::new(&dir, "2")];

        let mut out = Vec::new();
        run_suite(
            &shell("cat"),
            &cases,
            &config(1),
            Reporter::new(&mut out, ReportOrder::Completion),
        )
        .expect_err("setup error");

        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3, "{text}");
        assert!(lines[1].starts_with("1         Pass    "));
        assert_eq!(lines[2], crate::report::ABORTED_LINE);
    }

    #[test]
    fn empty_suite_reports_nothing() {
        let mut out = Vec::new();
        let report = run_suite(
            &shell("cat"),
            &[],
            &config(0),
            Reporter::new(&mut out, ReportOrder::Name),
        )
        .expect("run");
        assert_eq!(report.summary.total, 0);
    }
}
