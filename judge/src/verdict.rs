use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Timeout,
    /// The subject could not be run to a clean exit (spawn failure, non-zero exit).
    Error,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "Pass",
            Verdict::Fail => "Fail",
            Verdict::Timeout => "Timeout",
            Verdict::Error => "Error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Final result of one test. Built once when the pipeline for a case concludes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestReport {
    pub name: String,
    pub verdict: Verdict,
    pub duration: Duration,
    /// Diagnostic text for `Error` verdicts and for timeouts whose kill failed.
    pub detail: Option<String>,
}

impl TestReport {
    /// Report for a subject that exited cleanly and whose output was compared.
    pub fn judged(name: impl Into<String>, matched: bool, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            verdict: if matched { Verdict::Pass } else { Verdict::Fail },
            duration: elapsed,
            detail: None,
        }
    }

    /// Timeouts record the configured budget, not the observed runtime.
    pub fn timed_out(name: impl Into<String>, timeout: Duration, kill_error: Option<String>) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Timeout,
            duration: timeout,
            detail: kill_error.map(|err| format!("kill failed: {err}")),
        }
    }

    pub fn errored(name: impl Into<String>, elapsed: Duration, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: Verdict::Error,
            duration: elapsed,
            detail: Some(message.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}
