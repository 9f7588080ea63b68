//! Fixture-driven judge for problem-set solutions.
//!
//! Runs a subject program once per `tests/<name>.in` fixture, compares its
//! output with `<name>.out`, and prints one verdict row per test.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info};

use judge::case::discover_cases;
use judge::config::{ConfigOverrides, DEFAULT_CONFIG_FILE, apply_overrides, load_config};
use judge::exit_codes;
use judge::layout::ProblemLayout;
use judge::logging;
use judge::pool::{RunConfig, run_suite};
use judge::process::{Limits, SubjectCommand};
use judge::report::{ReportOrder, Reporter, RunMeta, write_json};

#[derive(Parser)]
#[command(
    name = "judge",
    version,
    about = "Run a solution against its input/output fixtures"
)]
struct Cli {
    /// Subject program, relative to the problem-set root.
    subject: PathBuf,

    /// Extra arguments passed to the subject.
    #[arg(last = true)]
    args: Vec<String>,

    /// Problem-set root (overrides `problem_root` in the config file).
    #[arg(long)]
    root: Option<PathBuf>,

    /// Config file. A missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Per-test timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Worker threads (0 = available parallelism).
    #[arg(long)]
    workers: Option<usize>,

    /// Row order of the result table.
    #[arg(long, value_enum)]
    order: Option<ReportOrder>,

    /// Do not write captured outputs to `output/`.
    #[arg(long)]
    no_capture: bool,

    /// Also write a JSON report to this file.
    #[arg(long)]
    json: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            problem_root: self.root.clone(),
            timeout_ms: self.timeout_ms,
            workers: self.workers,
            order: self.order,
            no_capture: self.no_capture,
        }
    }
}

fn main() {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let started_at = Utc::now();
    let cfg = apply_overrides(load_config(&cli.config)?, &cli.overrides())
        .context("resolve configuration")?;
    debug!(config = ?cfg, "configuration loaded");

    let layout = ProblemLayout::resolve(&cfg.problem_root, &cli.subject);
    layout.check_subject()?;
    let capture_dir = if cfg.capture_output {
        layout.create_output_dir()?;
        Some(layout.output_dir.clone())
    } else {
        None
    };

    let cases = discover_cases(&layout.tests_dir)?;
    info!(
        subject = %layout.subject.display(),
        tests_dir = %layout.tests_dir.display(),
        cases = cases.len(),
        "fixtures loaded"
    );

    let command = SubjectCommand::new(&layout.subject, cli.args.clone());
    let run_cfg = RunConfig {
        limits: Limits {
            timeout: cfg.timeout(),
            stderr_limit_bytes: cfg.stderr_limit_bytes,
        },
        capture_dir,
        workers: cfg.effective_workers(cases.len()),
    };
    let report = run_suite(
        &command,
        &cases,
        &run_cfg,
        Reporter::new(io::stdout(), cfg.order),
    )?;

    if let Some(path) = &cli.json {
        let meta = RunMeta {
            subject: cli.subject.display().to_string(),
            timeout_ms: cfg.timeout_ms,
            started_at,
        };
        write_json(path, &meta, &report)?;
    }

    Ok(if report.summary.all_passed() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}
