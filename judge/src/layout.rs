//! Problem-set directory conventions.
//!
//! ```text
//! <root>/<category>/<problem>/tests/{name}.in|.out    fixtures
//! <root>/<category>/<problem>/<lang>/<program>        subject
//! <root>/<category>/<problem>/<lang>/output/          captured outputs
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

pub const TESTS_DIR: &str = "tests";
pub const OUTPUT_DIR: &str = "output";

/// Paths derived from a subject given relative to the problem-set root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemLayout {
    pub subject: PathBuf,
    /// `tests` next to the subject's containing folder.
    pub tests_dir: PathBuf,
    /// `output` inside the subject's containing folder.
    pub output_dir: PathBuf,
}

impl ProblemLayout {
    pub fn resolve(root: &Path, subject: &Path) -> Self {
        let mut program = root.join(subject);
        if parent_or_current(&program) == Path::new(".") && !program.starts_with(".") {
            // Keep a bare program name from being looked up on PATH.
            program = Path::new(".").join(program);
        }
        let subject_dir = parent_or_current(&program);
        let problem_dir = parent_or_current(&subject_dir);
        Self {
            tests_dir: problem_dir.join(TESTS_DIR),
            output_dir: subject_dir.join(OUTPUT_DIR),
            subject: program,
        }
    }

    /// The subject must exist before any fixture runs.
    pub fn check_subject(&self) -> Result<()> {
        if !self.subject.is_file() {
            bail!("subject program not found at {}", self.subject.display());
        }
        Ok(())
    }

    pub fn create_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create output dir {}", self.output_dir.display()))
    }
}

fn parent_or_current(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
