//! Test-only helpers for building fixture directories and shell subjects.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::process::SubjectCommand;

/// Subject that runs `script` through `sh -c`.
pub fn shell(script: &str) -> SubjectCommand {
    SubjectCommand::new("sh", vec!["-c".to_string(), script.to_string()])
}

/// Whether a process with `pid` still exists (`kill -0`).
pub fn process_alive(pid: u32) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Scratch fixture directory laid out as `<root>/tests/{name}.in|.out`.
pub struct FixtureDir {
    temp: TempDir,
}

impl FixtureDir {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        fs::create_dir(temp.path().join("tests")).context("create tests dir")?;
        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.root().join("tests")
    }

    /// Write a fixture pair.
    pub fn add(&self, name: &str, input: &str, expected: &str) -> Result<()> {
        self.add_file(&format!("{name}.in"), input)?;
        self.add_file(&format!("{name}.out"), expected)
    }

    /// Write an arbitrary file into the fixture directory.
    pub fn add_file(&self, file_name: &str, contents: &str) -> Result<()> {
        let path = self.tests_dir().join(file_name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Create a directory next to `tests/` (e.g. a capture dir).
    pub fn mkdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.root().join(name);
        fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))?;
        Ok(path)
    }
}

/// Write an executable shell script at `path`.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))?;
    Ok(())
}
