//! Output normalization and digest comparison.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::case::TestCase;

/// SHA-256 of a byte sequence. Only ever compared for equality.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Digest a stream incrementally without buffering it.
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self(hasher.finalize().into()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

/// Rewrite Windows line endings as `\n`.
///
/// Every run of `\r` directly before a `\n` is dropped, which keeps the
/// function idempotent (`\r\r\n` normalizes straight to `\n`). A lone `\r`
/// is left alone.
pub fn normalize_line_endings(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for &byte in raw {
        if byte == b'\n' {
            while out.last() == Some(&b'\r') {
                out.pop();
            }
        }
        out.push(byte);
    }
    out
}

/// Persist normalized output as `<dir>/my_<name>.out`, replacing any earlier capture.
pub fn write_capture(dir: &Path, case: &TestCase, normalized: &[u8]) -> Result<PathBuf> {
    let path = dir.join(case.capture_file_name());
    fs::write(&path, normalized).with_context(|| format!("write capture {}", path.display()))?;
    Ok(path)
}

/// Judge raw subject output against the case's reference file.
///
/// Returns whether the digests match. Errors (unreadable reference, failed
/// capture write) are setup errors and abort the run.
pub fn matches_reference(case: &TestCase, raw: &[u8], capture_dir: Option<&Path>) -> Result<bool> {
    let normalized = normalize_line_endings(raw);
    if let Some(dir) = capture_dir {
        write_capture(dir, case, &normalized)?;
    }

    let actual = ContentDigest::of(&normalized);
    let reference = File::open(&case.expected)
        .with_context(|| format!("open reference {}", case.expected.display()))?;
    let expected = ContentDigest::of_reader(reference)
        .with_context(|| format!("read reference {}", case.expected.display()))?;

    let matched = actual == expected;
    if !matched {
        debug!(
            test = %case.name,
            actual = %actual.to_hex(),
            expected = %expected.to_hex(),
            "digest mismatch"
        );
    }
    Ok(matched)
}
