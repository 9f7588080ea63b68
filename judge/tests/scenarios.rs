//! End-to-end judging scenarios driven through the library API.
//!
//! Each test builds a scratch fixture directory, discovers it, and runs the
//! whole pipeline with a `sh -c` subject.
#![cfg(unix)]

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use judge::case::discover_cases;
use judge::pool::{RunConfig, run_suite};
use judge::process::{Limits, SubjectCommand};
use judge::report::{Report, ReportOrder, Reporter};
use judge::test_support::{FixtureDir, shell};
use judge::verdict::Verdict;

const SUM: &str = "read _count; read a b; echo $((a + b))";

fn run(
    fixtures: &FixtureDir,
    subject: &SubjectCommand,
    timeout_ms: u64,
    capture: Option<PathBuf>,
) -> (Report, String) {
    let cases = discover_cases(&fixtures.tests_dir()).expect("discover");
    let cfg = RunConfig {
        limits: Limits {
            timeout: Duration::from_millis(timeout_ms),
            stderr_limit_bytes: 1024,
        },
        capture_dir: capture,
        workers: 4,
    };
    let mut out = Vec::new();
    let report = run_suite(
        subject,
        &cases,
        &cfg,
        Reporter::new(&mut out, ReportOrder::Name),
    )
    .expect("run suite");
    (report, String::from_utf8(out).expect("utf8"))
}

fn only_verdict(report: &Report) -> Verdict {
    assert_eq!(report.reports.len(), 1, "expected one report: {report:?}");
    report.reports[0].verdict
}

#[test]
fn sum_program_passes() {
    let fixtures = FixtureDir::new().expect("fixtures");
    fixtures.add("sum", "3\n1 2\n", "3\n").expect("fixture");

    let (report, text) = run(&fixtures, &shell(SUM), 5_000, None);
    assert_eq!(only_verdict(&report), Verdict::Pass);
    assert!(text.lines().nth(1).expect("row").starts_with("sum       Pass    "));
}

#[test]
fn windows_line_endings_pass_after_normalization() {
    let fixtures = FixtureDir::new().expect("fixtures");
    fixtures.add("sum", "3\n1 2\n", "3\n").expect("fixture");

    let (report, _) = run(&fixtures, &shell("printf '3\\r\\n'"), 5_000, None);
    assert_eq!(only_verdict(&report), Verdict::Pass);
}

#[test]
fn wrong_answer_fails() {
    let fixtures = FixtureDir::new().expect("fixtures");
    fixtures.add("sum", "3\n1 2\n", "3\n").expect("fixture");

    let (report, text) = run(&fixtures, &shell("echo 4"), 5_000, None);
    assert_eq!(only_verdict(&report), Verdict::Fail);
    assert!(text.contains("passed 0/1 (fail=1 timeout=0 error=0)"));
}

#[test]
fn infinite_loop_times_out_with_configured_duration() {
    let fixtures = FixtureDir::new().expect("fixtures");
    fixtures.add("spin", "", "").expect("fixture");

    let (report, text) = run(&fixtures, &shell("while :; do :; done"), 200, None);
    assert_eq!(only_verdict(&report), Verdict::Timeout);
    assert_eq!(report.reports[0].duration, Duration::from_millis(200));
    assert!(text.contains("spin      Timeout 200ms"));
}

#[test]
fn non_fixture_files_are_not_scheduled() {
    let fixtures = FixtureDir::new().expect("fixtures");
    fixtures.add("sum", "3\n1 2\n", "3\n").expect("fixture");
    fixtures.add_file("README.md", "not a test").expect("file");
    fixtures.add_file("sum.in.bak", "3\n1 2\n").expect("file");

    let (report, _) = run(&fixtures, &shell(SUM), 5_000, None);
    assert_eq!(report.summary.total, 1);
    assert_eq!(report.reports[0].name, "sum");
}

#[test]
fn mixed_suite_reports_each_verdict_once() {
    let fixtures = FixtureDir::new().expect("fixtures");
    fixtures.add("1", "1\n2 3\n", "5\n").expect("fixture");
    fixtures.add("2", "1\n2 2\n", "5\n").expect("fixture");
    fixtures.add("3", "1\nloop\n", "").expect("fixture");
    fixtures.add("4", "1\ncrash\n", "").expect("fixture");
    let subject = shell(
        "read _; read a b; \
         if [ \"$a\" = loop ]; then while :; do :; done; fi; \
         if [ \"$a\" = crash ]; then exit 1; fi; \
         echo $((a + b))",
    );

    let (report, text) = run(&fixtures, &subject, 300, None);
    let verdicts: Vec<(&str, Verdict)> = report
        .reports
        .iter()
        .map(|r| (r.name.as_str(), r.verdict))
        .collect();
    assert_eq!(
        verdicts,
        vec![
            ("1", Verdict::Pass),
            ("2", Verdict::Fail),
            ("3", Verdict::Timeout),
            ("4", Verdict::Error),
        ]
    );
    assert!(text.ends_with("passed 1/4 (fail=1 timeout=1 error=1)\n"));
}

#[test]
fn captured_output_is_normalized() {
    let fixtures = FixtureDir::new().expect("fixtures");
    fixtures.add("sum", "3\n1 2\n", "3\n").expect("fixture");
    let output = fixtures.mkdir("output").expect("output dir");

    let (report, _) = run(
        &fixtures,
        &shell("printf '3\\r\\n'"),
        5_000,
        Some(output.clone()),
    );
    assert_eq!(only_verdict(&report), Verdict::Pass);
    assert_eq!(fs::read(output.join("my_sum.out")).expect("capture"), b"3\n");
}
