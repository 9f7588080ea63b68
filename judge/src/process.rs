//! Subject execution under a wall-clock budget.
//!
//! The subject reads its fixture from stdin and writes its answer to stdout.
//! Both output pipes are drained on reader threads while the judge waits, so
//! a chatty subject cannot deadlock on a full pipe. The wall-clock budget
//! runs until both pipes close, not just until the subject exits.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Program under test plus its arguments. Shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl SubjectCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Limits applied to every subject run.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum wall-clock time before the subject is killed.
    pub timeout: Duration,
    /// Maximum bytes of stderr kept for diagnostics.
    pub stderr_limit_bytes: usize,
}

/// How a subject run ended.
#[derive(Debug)]
pub enum Execution {
    /// Clean exit. `stdout` is the complete raw output.
    Completed { stdout: Vec<u8>, elapsed: Duration },
    /// The budget expired and the subject was killed and reaped.
    TimedOut {
        pid: u32,
        /// Set when the kill or the reap after it failed.
        kill_error: Option<String>,
    },
}

/// Failure of a single subject run. Resolved as a per-test verdict, never
/// aborts sibling tests.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("wait for subject: {0}")]
    Wait(#[source] io::Error),
    #[error("capture output: {0}")]
    Output(String),
    #[error("{status}: {stderr}")]
    NonZeroExit { status: ExitStatus, stderr: String },
}

/// Which output pipe a reader drained.
#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// What a reader thread hands back: the bytes it kept and how many it dropped.
type Drained = (Stream, io::Result<(Vec<u8>, usize)>);

struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    stderr_truncated: usize,
}

/// Run `command` with `stdin` bound to the fixture file.
///
/// The budget covers both the subject's exit and the close of its output
/// pipes. On timeout the subject is killed and reaped before returning; the
/// reader threads are never joined, so descendants that still hold the pipes
/// cannot stall the caller.
#[instrument(skip_all, fields(program = %command.program.display(), timeout_ms = limits.timeout.as_millis() as u64))]
pub fn run_subject(
    command: &SubjectCommand,
    stdin: File,
    limits: &Limits,
) -> Result<Execution, ExecError> {
    let mut cmd = command.to_command();
    cmd.stdin(Stdio::from(stdin))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let started = Instant::now();
    let deadline = started + limits.timeout;
    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: command.program.display().to_string(),
        source,
    })?;
    let pid = child.id();
    debug!(pid, "subject spawned");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::Output("stdout was not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecError::Output("stderr was not piped".to_string()))?;

    let (tx, rx) = mpsc::channel::<Drained>();
    spawn_reader(stdout, usize::MAX, Stream::Stdout, tx.clone());
    spawn_reader(stderr, limits.stderr_limit_bytes, Stream::Stderr, tx);

    let status = match child.wait_timeout(limits.timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!(
                pid,
                timeout_ms = limits.timeout.as_millis() as u64,
                "subject timed out, killing"
            );
            let kill_error = terminate(&mut child);
            return Ok(Execution::TimedOut { pid, kill_error });
        }
        Err(err) => {
            terminate(&mut child);
            return Err(ExecError::Wait(err));
        }
    };

    let Some(captured) = collect_output(&rx, deadline)? else {
        warn!(
            pid,
            timeout_ms = limits.timeout.as_millis() as u64,
            "subject exited but its output was still open at the deadline"
        );
        return Ok(Execution::TimedOut {
            pid,
            kill_error: None,
        });
    };
    let elapsed = started.elapsed();

    debug!(
        pid,
        exit_code = ?status.code(),
        elapsed_ms = elapsed.as_millis() as u64,
        "subject finished"
    );
    if !status.success() {
        return Err(ExecError::NonZeroExit {
            status,
            stderr: stderr_summary(&captured.stderr, captured.stderr_truncated),
        });
    }
    Ok(Execution::Completed {
        stdout: captured.stdout,
        elapsed,
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    stream: Stream,
    tx: mpsc::Sender<Drained>,
) {
    thread::spawn(move || {
        let drained = read_stream_limited(reader, limit);
        // The receiver is gone once the run has timed out.
        let _ = tx.send((stream, drained));
    });
}

/// Wait until both pipes reach EOF. Returns `None` if `deadline` passes first.
fn collect_output(
    rx: &mpsc::Receiver<Drained>,
    deadline: Instant,
) -> Result<Option<Captured>, ExecError> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (stream, drained) = match rx.recv_timeout(remaining) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ExecError::Output("output reader thread panicked".to_string()));
            }
        };
        let output = drained
            .map_err(|err| ExecError::Output(format!("read {}: {err}", stream.as_str())))?;
        match stream {
            Stream::Stdout => stdout = Some(output),
            Stream::Stderr => stderr = Some(output),
        }
    }
    let ((stdout, _), (stderr, stderr_truncated)) = stdout.zip(stderr).ok_or_else(|| {
        ExecError::Output("output readers finished without a result".to_string())
    })?;
    Ok(Some(Captured {
        stdout,
        stderr,
        stderr_truncated,
    }))
}

/// Kill and reap the subject. Returns the failure text, if any, after logging it.
fn terminate(child: &mut Child) -> Option<String> {
    let pid = child.id();
    if let Err(err) = child.kill() {
        warn!(pid, err = %err, "failed to kill subject");
        return Some(err.to_string());
    }
    match child.wait() {
        Ok(status) => {
            debug!(pid, status = %status, "subject reaped");
            None
        }
        Err(err) => {
            warn!(pid, err = %err, "failed to reap subject after kill");
            Some(format!("reap: {err}"))
        }
    }
}

fn stderr_summary(stderr: &[u8], truncated: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return "no stderr".to_string();
    }
    if truncated > 0 {
        format!("{text} [truncated {truncated} bytes]")
    } else {
        text.to_string()
    }
}

/// Drain `reader` to EOF, keeping at most `limit` bytes.
fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let remaining = limit.saturating_sub(buf.len());
        let keep = n.min(remaining);
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }

    Ok((buf, truncated))
}
