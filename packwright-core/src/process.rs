//! Subprocess execution with bounded timeouts and full output capture.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long reader threads may keep draining pipes after a timed-out process
/// was killed. Orphaned grandchildren can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A single external command to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub working_dir: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Fail when the command exits with a non-zero code.
    pub check: bool,
}

impl Invocation {
    pub fn new(working_dir: impl Into<PathBuf>, program: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            check: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the outcome instead of failing on a non-zero exit code.
    ///
    /// Timeouts still fail.
    pub fn allow_failure(mut self) -> Self {
        self.check = false;
        self
    }

    fn args_line(&self) -> String {
        self.args.join(" ")
    }
}

/// Everything observed about one finished (or killed) subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub working_dir: PathBuf,
    pub command: String,
    pub arguments: Vec<String>,
    /// `None` when the process was killed after its timeout elapsed.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    #[inline]
    pub fn timed_out(&self) -> bool {
        self.exit_code.is_none()
    }

    #[inline]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn arguments_line(&self) -> String {
        self.arguments.join(" ")
    }

    /// The command line as it would be typed in a shell, for reproduction.
    pub fn command_line(&self) -> String {
        if self.arguments.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.arguments_line())
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(
                f,
                "The command `{}` exited with code {}",
                self.command_line(),
                code
            ),
            None => write!(f, "The command `{}` timed out", self.command_line()),
        }
    }
}

/// Capability to execute external commands.
///
/// Every stage of the pipeline goes through this seam so the whole workflow
/// can be observed or substituted in tests.
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation to completion or until its timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandFailed`] carrying the full outcome when the
    /// command times out, or exits non-zero while `check` is set.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        info!(
            "{}> {} {}",
            invocation.working_dir.display(),
            invocation.program,
            invocation.args_line()
        );

        let started = Instant::now();
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(e, invocation))?;

        let stdout_capture = child.stdout.take().map(spawn_reader);
        let stderr_capture = child.stderr.take().map(spawn_reader);

        let deadline = started + invocation.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {}
                Err(e) => {
                    terminate(&mut child);
                    return Err(e.into());
                }
            }
            if Instant::now() >= deadline {
                warn!(
                    "{} timed out after {:?}, killing it",
                    invocation.program, invocation.timeout
                );
                terminate(&mut child);
                break None;
            }
            thread::sleep(self.poll_interval);
        };

        let drain = if status.is_some() { None } else { Some(DRAIN_GRACE) };
        let stdout = collect(stdout_capture, drain);
        let stderr = collect(stderr_capture, drain);

        let outcome = CommandOutcome {
            working_dir: invocation.working_dir.clone(),
            command: invocation.program.clone(),
            arguments: invocation.args.clone(),
            // A process ended by a signal has no code of its own.
            exit_code: status.map(|s| s.code().unwrap_or(-1)),
            stdout,
            stderr,
        };

        debug!(
            "{} finished in {:?} with {:?}",
            outcome.command_line(),
            started.elapsed(),
            outcome.exit_code
        );

        if outcome.timed_out() || (invocation.check && !outcome.success()) {
            return Err(Error::CommandFailed(Box::new(outcome)));
        }

        Ok(outcome)
    }
}

/// Kills and reaps the child; it may already have exited.
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_error(error: std::io::Error, invocation: &Invocation) -> Error {
    Error::Io(std::io::Error::new(
        error.kind(),
        format!(
            "failed to start `{}` in {}: {}",
            invocation.program,
            invocation.working_dir.display(),
            error
        ),
    ))
}

/// Output of one pipe, filled line by line as the child writes it.
struct Capture {
    buffer: Arc<Mutex<String>>,
    done: mpsc::Receiver<()>,
}

/// Drains a pipe line by line on its own thread so neither stream can stall
/// the child by filling its buffer.
fn spawn_reader<R>(stream: R) -> Capture
where
    R: Read + Send + 'static,
{
    let buffer = Arc::new(Mutex::new(String::new()));
    let (tx, done) = mpsc::channel();
    let sink = Arc::clone(&buffer);
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    if let Ok(mut record) = sink.lock() {
                        record.push_str(text.trim_end_matches(['\r', '\n']));
                        record.push('\n');
                    }
                }
            }
        }
        let _ = tx.send(());
    });
    Capture { buffer, done }
}

/// Waits for the reader to hit EOF, or at most `grace` after a kill, and
/// returns whatever was read by then.
fn collect(capture: Option<Capture>, grace: Option<Duration>) -> String {
    let Some(capture) = capture else {
        return String::new();
    };
    match grace {
        None => {
            let _ = capture.done.recv();
        }
        Some(grace) => {
            let _ = capture.done.recv_timeout(grace);
        }
    }
    capture
        .buffer
        .lock()
        .map(|record| record.clone())
        .unwrap_or_default()
}
