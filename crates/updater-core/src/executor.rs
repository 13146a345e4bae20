//! Sequential subprocess execution of resolved tasks.
//!
//! Each task runs with the workspace as its working directory. Failures are
//! recorded and never stop later tasks from running.

use crate::report::{ResultSet, TaskOutcome};
use crate::resolver::Task;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Combined output and terminal error of one finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub output: String,
    pub error: Option<String>,
}

pub trait TaskRunner: Send + Sync {
    fn run(&self, task: &Task, dir: &Path) -> CommandResult;
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

/// Bytes kept per stream; the rest is drained and counted.
pub const OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

/// Runs tasks as real child processes, killing any that exceed `timeout`.
///
/// Each child leads its own process group so a timeout also reaches the
/// processes it started (the shells `make` spawns for recipes).
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl TaskRunner for ProcessRunner {
    fn run(&self, task: &Task, dir: &Path) -> CommandResult {
        let mut cmd = Command::new(task.program());
        cmd.args(task.args())
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return CommandResult {
                    output: String::new(),
                    error: Some(format!("failed to spawn '{}': {e}", task.program())),
                }
            }
        };

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let waited = match self.timeout {
            Some(limit) => child.wait_timeout(limit),
            None => child.wait().map(Some),
        };
        let error = match waited {
            Ok(Some(status)) if status.success() => None,
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => {
                let limit = self.timeout.unwrap_or_default();
                tracing::warn!(timeout = ?limit, task = %task, "command timed out, killing");
                kill_tree(&mut child);
                Some(format!("timed out after {limit:?}"))
            }
            Err(e) => {
                kill_tree(&mut child);
                Some(format!("wait failed: {e}"))
            }
        };

        let mut output = join(stdout, "stdout");
        output.push_str(&join(stderr, "stderr"));
        CommandResult { output, error }
    }
}

/// Kill the child's whole process group, then reap the child.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        #[allow(clippy::cast_possible_wrap)]
        let group = Pid::from_raw(child.id() as i32);
        if let Err(e) = killpg(group, Signal::SIGKILL) {
            tracing::warn!(error = %e, pid = child.id(), "killing process group failed");
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

type Reader = thread::JoinHandle<(Vec<u8>, usize)>;

fn spawn_reader<R: Read + Send + 'static>(reader: R) -> Reader {
    thread::spawn(move || read_limited(reader, OUTPUT_LIMIT_BYTES))
}

/// Read `reader` to the end, keeping at most `limit` bytes.
fn read_limited<R: Read>(mut reader: R, limit: usize) -> (Vec<u8>, usize) {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }
    (buf, truncated)
}

fn join(handle: Option<Reader>, label: &str) -> String {
    let Some((bytes, truncated)) = handle.and_then(|h| h.join().ok()) else {
        return String::new();
    };
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated > 0 {
        tracing::warn!(stream = label, truncated, "command output truncated");
        text.push_str(&format!("\n[{label} truncated {truncated} bytes]\n"));
    }
    text
}

// ---------------------------------------------------------------------------
// Execution loop
// ---------------------------------------------------------------------------

/// Run every task in order and sort the outcomes into `results`.
pub fn execute(tasks: Vec<Task>, dir: &Path, runner: &dyn TaskRunner, results: &mut ResultSet) {
    for task in tasks {
        let started = Instant::now();
        let CommandResult { output, error } = runner.run(&task, dir);
        tracing::info!(
            duration_ms = started.elapsed().as_millis() as u64,
            args = ?task.argv(),
            output = %output,
            succeeded = error.is_none(),
            "ran command"
        );
        let outcome = TaskOutcome {
            task,
            output,
            error,
        };
        if outcome.error.is_some() {
            results.failed.push(outcome);
        } else {
            results.succeeded.push(outcome);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
