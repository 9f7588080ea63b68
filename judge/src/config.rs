//! Judge configuration loaded from `judge.toml`.
//!
//! Every field has a default, so a missing file or a partial file is valid.
//! Command-line flags are layered on top with [`apply_overrides`].

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::report::ReportOrder;

pub const DEFAULT_CONFIG_FILE: &str = "judge.toml";

/// Judge configuration (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JudgeConfig {
    /// Directory that subject paths on the command line are relative to.
    pub problem_root: PathBuf,

    /// Per-test wall-clock budget in milliseconds.
    pub timeout_ms: u64,

    /// Worker pool size. `0` picks the available parallelism.
    pub workers: usize,

    /// Write normalized subject output to `output/my_<name>.out`.
    pub capture_output: bool,

    /// Row order of the result table.
    pub order: ReportOrder,

    /// Keep at most this many bytes of subject stderr for diagnostics.
    pub stderr_limit_bytes: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            problem_root: PathBuf::from("../../ProblemSet"),
            timeout_ms: 2_000,
            workers: 0,
            capture_output: true,
            order: ReportOrder::Name,
            stderr_limit_bytes: 4_096,
        }
    }
}

impl JudgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.problem_root.as_os_str().is_empty() {
            return Err(anyhow!("problem_root must be non-empty"));
        }
        if self.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be > 0"));
        }
        if self.stderr_limit_bytes == 0 {
            return Err(anyhow!("stderr_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Number of worker threads for `case_count` fixtures.
    ///
    /// Never more workers than cases, never fewer than one.
    pub fn effective_workers(&self, case_count: usize) -> usize {
        let workers = if self.workers == 0 {
            thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(1)
        } else {
            self.workers
        };
        workers.min(case_count).max(1)
    }
}

/// Values given on the command line; `None` keeps the file value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub problem_root: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub workers: Option<usize>,
    pub order: Option<ReportOrder>,
    pub no_capture: bool,
}

/// Apply command-line overrides to a loaded config and validate the result.
pub fn apply_overrides(mut base: JudgeConfig, overrides: &ConfigOverrides) -> Result<JudgeConfig> {
    if let Some(root) = &overrides.problem_root {
        base.problem_root = root.clone();
    }
    if let Some(timeout_ms) = overrides.timeout_ms {
        base.timeout_ms = timeout_ms;
    }
    if let Some(workers) = overrides.workers {
        base.workers = workers;
    }
    if let Some(order) = overrides.order {
        base.order = order;
    }
    if overrides.no_capture {
        base.capture_output = false;
    }
    base.validate()?;
    Ok(base)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `JudgeConfig::default()`.
pub fn load_config(path: &Path) -> Result<JudgeConfig> {
    if !path.exists() {
        let cfg = JudgeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: JudgeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
