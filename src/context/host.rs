//! Live host context.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use wait_timeout::ChildExt;

use super::{effective_timeout, glob_under, rooted, split_command, CommandOutput, ExecutionContext};
use crate::constants::{DEFAULT_COMMAND_TIMEOUT_SECS, OUTPUT_DRAIN_GRACE_MS};
use crate::core::error::{ComponentError, ComponentResult};

/// Runs real commands and reads real files.
///
/// File reads and globs are resolved beneath `root`, which is `/` unless the
/// host filesystem is mounted elsewhere. Commands always run on the live system.
#[derive(Debug, Clone)]
pub struct HostContext {
    root: PathBuf,
    default_timeout: Duration,
}

impl Default for HostContext {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            default_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
        }
    }
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Timeout for commands that do not request one. Zero means the ceiling.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Output of a running command, gathered by one reader thread per pipe.
struct Captured {
    rx: Receiver<(Stream, Vec<u8>)>,
    pending: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Captured {
    fn start(child: &mut Child, command: &str) -> Self {
        let (tx, rx) = unbounded();
        let mut pending = 0;
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, Stream::Stdout, command, tx.clone());
            pending += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, Stream::Stderr, command, tx);
            pending += 1;
        }
        Self {
            rx,
            pending,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Collect reader results until `deadline`. Returns whether both pipes closed.
    fn drain_until(&mut self, deadline: Instant) -> bool {
        while self.pending > 0 {
            match self.rx.recv_deadline(deadline) {
                Ok((Stream::Stdout, buf)) => self.stdout = buf,
                Ok((Stream::Stderr, buf)) => self.stderr = buf,
                Err(_) => return false,
            }
            self.pending -= 1;
        }
        true
    }

    fn into_lines(self) -> Vec<String> {
        let mut lines = to_lines(&self.stdout);
        lines.extend(to_lines(&self.stderr));
        lines
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R, which: Stream, command: &str, tx: Sender<(Stream, Vec<u8>)>) {
    let command = command.to_string();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = stream.read_to_end(&mut buf) {
            debug!("Reading {:?} of '{}' stopped early: {}", which, command, e);
        }
        // The receiver is gone once the command has been given up on.
        let _ = tx.send((which, buf));
    });
}

fn to_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes).lines().map(str::to_string).collect()
}

/// Commands lead their own process group so a timeout can take down everything they started.
#[cfg(unix)]
fn isolate(command: &mut Command) {
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

/// SIGKILL the process group led by `child`. The group outlives its leader
/// while any member is alive, so this is valid after the leader was reaped.
#[cfg(unix)]
fn kill_group(child: &mut Child) -> io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg has no memory-safety preconditions.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> io::Result<()> {
    child.kill()
}

impl ExecutionContext for HostContext {
    fn run_command(&self, command: &str, timeout: Option<Duration>) -> ComponentResult<CommandOutput> {
        let args = split_command(command)?;
        let limit = effective_timeout(Some(timeout.unwrap_or(self.default_timeout)));
        debug!("Running '{}' (timeout {}s)", command, limit.as_secs());

        let start = Instant::now();
        let deadline = start + limit;
        let grace = Duration::from_millis(OUTPUT_DRAIN_GRACE_MS);

        let mut cmd = Command::new(&args[0]);
        cmd.args(&args[1..])
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate(&mut cmd);
        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ComponentError::CommandNotFound {
                command: args[0].clone(),
            },
            _ => ComponentError::Io(e),
        })?;

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
        let mut captured = Captured::start(&mut child, command);

        match child.wait_timeout(limit)? {
            Some(status) => {
                if !captured.drain_until(deadline) {
                    // Background descendants still hold the pipes open.
                    warn!(
                        "'{}' exited but its descendants kept output open past {}s; killing them",
                        command,
                        limit.as_secs()
                    );
                    if let Err(e) = kill_group(&mut child) {
                        debug!("Failed to kill process group of '{}': {}", command, e);
                    }
                    captured.drain_until(Instant::now() + grace);
                }
                Ok(CommandOutput::new(status.code().unwrap_or(-1), captured.into_lines()))
            }
            None => {
                if let Err(e) = kill_group(&mut child) {
                    warn!("Failed to kill '{}' after timeout: {}", command, e);
                    let _ = child.kill();
                }
                // Reap so no zombie outlives the run.
                let _ = child.wait();
                captured.drain_until(Instant::now() + grace);
                let elapsed = start.elapsed();
                warn!("Command '{}' timed out after {:.2}s", command, elapsed.as_secs_f64());
                Err(ComponentError::CommandTimeout {
                    command: command.to_string(),
                    timeout: limit,
                    elapsed,
                })
            }
        }
    }

    fn read_file(&self, path: &Path) -> ComponentResult<Vec<u8>> {
        let full = rooted(&self.root, path);
        fs::read(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ComponentError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => ComponentError::Io(e),
        })
    }

    fn glob(&self, pattern: &str) -> ComponentResult<Vec<PathBuf>> {
        glob_under(&self.root, pattern)
    }

    fn name(&self) -> &'static str {
        "host"
    }
}
