//! Fixture discovery.
//!
//! A fixture directory holds flat `<name>.in` / `<name>.out` pairs. Only the
//! input side is discovered here; the reference file is opened when the case
//! is judged.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

pub const INPUT_SUFFIX: &str = ".in";
pub const OUTPUT_SUFFIX: &str = ".out";
pub const CAPTURE_PREFIX: &str = "my_";

/// One input/reference pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// File name of the input fixture without [`INPUT_SUFFIX`].
    pub name: String,
    pub input: PathBuf,
    pub expected: PathBuf,
}

impl TestCase {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            input: dir.join(format!("{name}{INPUT_SUFFIX}")),
            expected: dir.join(format!("{name}{OUTPUT_SUFFIX}")),
        }
    }

    /// File name for the captured subject output, e.g. `my_sum.out`.
    pub fn capture_file_name(&self) -> String {
        format!("{CAPTURE_PREFIX}{}{OUTPUT_SUFFIX}", self.name)
    }
}

/// Discover test cases in `dir`.
///
/// Keeps regular files (or symlinks to them) ending in [`INPUT_SUFFIX`].
/// Cases come back in directory-listing order. An entry whose type cannot be
/// read is an error, not a skipped fixture.
pub fn discover_cases(dir: &Path) -> Result<Vec<TestCase>> {
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read fixture dir {}", dir.display()))? {
        let entry = entry.context("read fixture entry")?;
        let path = entry.path();
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            if file_name.as_encoded_bytes().ends_with(INPUT_SUFFIX.as_bytes()) {
                warn!(path = %path.display(), "skipping fixture with a non-utf8 name");
            }
            continue;
        };
        let Some(name) = file_name.strip_suffix(INPUT_SUFFIX) else {
            continue;
        };
        if !is_fixture_file(&entry)? {
            continue;
        }
        if name.is_empty() {
            debug!(path = %path.display(), "skipping fixture with empty name");
            continue;
        }
        cases.push(TestCase::new(dir, name));
    }
    debug!(dir = %dir.display(), count = cases.len(), "fixtures discovered");
    Ok(cases)
}

fn is_fixture_file(entry: &fs::DirEntry) -> Result<bool> {
    let path = entry.path();
    let file_type = entry
        .file_type()
        .with_context(|| format!("inspect fixture {}", path.display()))?;
    if !file_type.is_symlink() {
        return Ok(file_type.is_file());
    }
    let target = fs::metadata(&path)
        .with_context(|| format!("inspect fixture {}", path.display()))?;
    Ok(target.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(cases: &[TestCase]) -> Vec<&str> {
        let mut names: Vec<&str> = cases.iter().map(|case| case.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    #[test]
    fn keeps_only_input_files() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("1.in"), "1\n").expect("write");
        fs::write(temp.path().join("1.out"), "1\n").expect("write");
        fs::write(temp.path().join("2.in"), "2\n").expect("write");
        fs::write(temp.path().join("notes.txt"), "x").expect("write");
        fs::write(temp.path().join("3.IN"), "x").expect("write");
        fs::create_dir(temp.path().join("nested.in")).expect("mkdir");

        let cases = discover_cases(temp.path()).expect("discover");
        assert_eq!(names(&cases), vec!["1", "2"]);
    }

    #[test]
    fn derives_reference_path_from_name() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("sum.in"), "3\n1 2\n").expect("write");

        let cases = discover_cases(temp.path()).expect("discover");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].input, temp.path().join("sum.in"));
        assert_eq!(cases[0].expected, temp.path().join("sum.out"));
        assert_eq!(cases[0].capture_file_name(), "my_sum.out");
    }

    #[test]
    fn skips_bare_suffix() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join(".in"), "").expect("write");

        let cases = discover_cases(temp.path()).expect("discover");
        assert!(cases.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_fixtures() {
        let temp = tempdir().expect("tempdir");
        let shared = temp.path().join("shared.txt");
        fs::write(&shared, "1\n").expect("write");
        std::os::unix::fs::symlink(&shared, temp.path().join("linked.in")).expect("symlink");

        let cases = discover_cases(temp.path()).expect("discover");
        assert_eq!(names(&cases), vec!["linked"]);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_fixture_link_is_an_error() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("1.in"), "1\n").expect("write");
        std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("broken.in"))
            .expect("symlink");
        std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("notes.txt"))
            .expect("symlink");

        let err = discover_cases(temp.path()).expect_err("dangling link");
        assert!(format!("{err:#}").contains("inspect fixture"));
        assert!(format!("{err:#}").contains("broken.in"));
    }

    #[test]
    fn missing_dir_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let err = discover_cases(&temp.path().join("tests")).expect_err("missing dir");
        assert!(err.to_string().contains("read fixture dir"));
    }
}
