//! Concurrent fixture-driven judge for competitive-programming solutions.
//!
//! Given a subject program and a directory of `<name>.in` / `<name>.out`
//! fixture pairs, the judge runs the program once per fixture under a
//! wall-clock budget, compares normalized stdout against the reference by
//! SHA-256 digest, and reports one verdict per test.
//!
//! - **[`case`]**: fixture discovery.
//! - **[`process`]**: subject execution with timeout supervision.
//! - **[`compare`]**: line-ending normalization, capture, digest comparison.
//! - **[`pool`]**: bounded worker pool driving the per-test pipeline.
//! - **[`report`]**: single aggregator that renders the result table.
//!
//! Errors split in two classes. Setup errors (`anyhow::Error`) abort the whole
//! run; execution errors ([`process::ExecError`]) resolve as a per-test
//! [`verdict::Verdict::Error`].

pub mod case;
pub mod compare;
pub mod config;
pub mod exit_codes;
pub mod layout;
pub mod logging;
pub mod pool;
pub mod process;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod verdict;
