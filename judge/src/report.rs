//! Result table rendering and the machine-readable report.
//!
//! A single [`Reporter`] owns the output stream. Workers never write to it;
//! they hand finished reports to the aggregator thread, which feeds them here.

use std::cmp::Ordering;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::verdict::{TestReport, Verdict};

/// Row order of the result table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReportOrder {
    /// Buffer every row and print them sorted by test name once the run ends.
    #[default]
    Name,
    /// Print each row as soon as its test finishes.
    Completion,
}

/// Trailer for a streamed table whose run was aborted.
pub const ABORTED_LINE: &str = "aborted";

pub fn format_row(name: &str, result: &str, duration: &str) -> String {
    format!("{name:<10}{result:<8}{duration}")
}

pub fn header() -> String {
    format_row("Test Name", "Result", "Duration")
}

fn report_row(report: &TestReport) -> String {
    format_row(
        &report.name,
        report.verdict.as_str(),
        &format!("{:?}", report.duration),
    )
}

/// Verdict counts for a run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub errored: usize,
}

impl Summary {
    fn record(&mut self, verdict: Verdict) {
        self.total += 1;
        match verdict {
            Verdict::Pass => self.passed += 1,
            Verdict::Fail => self.failed += 1,
            Verdict::Timeout => self.timed_out += 1,
            Verdict::Error => self.errored += 1,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "passed {}/{} (fail={} timeout={} error={})",
            self.passed, self.total, self.failed, self.timed_out, self.errored
        )
    }
}

/// Completed run: every report, sorted by test name, plus counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub reports: Vec<TestReport>,
    pub summary: Summary,
}

/// Order test names numerically when both are integers, lexically otherwise.
///
/// Fixture sets are usually numbered `1.in` .. `N.in`, where lexical order
/// would put `10` before `2`.
pub fn compare_names(left: &str, right: &str) -> Ordering {
    match (left.parse::<u64>(), right.parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r).then_with(|| left.cmp(right)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}

/// Serial writer for the result table.
///
/// In [`ReportOrder::Name`] nothing reaches `out` until [`Reporter::finish`],
/// so an aborted run leaves no partial table. [`ReportOrder::Completion`]
/// gives that up: rows are already out when a run aborts, and
/// [`Reporter::abort`] closes them with an [`ABORTED_LINE`] marker.
pub struct Reporter<W: Write> {
    out: W,
    order: ReportOrder,
    reports: Vec<TestReport>,
    summary: Summary,
    header_written: bool,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, order: ReportOrder) -> Self {
        Self {
            out,
            order,
            reports: Vec::new(),
            summary: Summary::default(),
            header_written: false,
        }
    }

    /// Record one finished test; in completion order its row is written immediately.
    pub fn accept(&mut self, report: TestReport) -> io::Result<()> {
        self.summary.record(report.verdict);
        if self.order == ReportOrder::Completion {
            self.write_header()?;
            writeln!(self.out, "{}", report_row(&report))?;
            self.out.flush()?;
        }
        self.reports.push(report);
        Ok(())
    }

    /// Write any buffered rows and the summary line.
    pub fn finish(mut self) -> io::Result<Report> {
        self.reports
            .sort_by(|left, right| compare_names(&left.name, &right.name));
        self.write_header()?;
        if self.order == ReportOrder::Name {
            for report in &self.reports {
                writeln!(self.out, "{}", report_row(report))?;
            }
        }
        writeln!(self.out, "{}", self.summary)?;
        self.out.flush()?;
        Ok(Report {
            reports: self.reports,
            summary: self.summary,
        })
    }

    /// Close a run that ended on a setup error. Writes [`ABORTED_LINE`] only
    /// when rows were already streamed.
    pub fn abort(mut self) -> io::Result<()> {
        if self.header_written {
            writeln!(self.out, "{ABORTED_LINE}")?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn write_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", header())?;
            self.header_written = true;
        }
        Ok(())
    }
}

/// Run identity recorded alongside the JSON report.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub subject: String,
    pub timeout_ms: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub started_at: String,
    pub subject: String,
    pub timeout_ms: u64,
    pub summary: Summary,
    pub tests: Vec<JsonTest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonTest {
    pub name: String,
    pub verdict: Verdict,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JsonReport {
    pub fn new(meta: &RunMeta, report: &Report) -> Self {
        Self {
            started_at: meta.started_at.to_rfc3339(),
            subject: meta.subject.clone(),
            timeout_ms: meta.timeout_ms,
            summary: report.summary.clone(),
            tests: report
                .reports
                .iter()
                .map(|test| JsonTest {
                    name: test.name.clone(),
                    verdict: test.verdict,
                    duration_ms: test.duration.as_millis() as u64,
                    detail: test.detail.clone(),
                })
                .collect(),
        }
    }
}

pub fn write_json(path: &Path, meta: &RunMeta, report: &Report) -> Result<()> {
    let contents =
        serde_json::to_string_pretty(&JsonReport::new(meta, report)).context("serialize report")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
