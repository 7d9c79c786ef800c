//! Production command runner
//!
//! Children run in their own process group with stdin closed. Output is
//! drained on helper threads so a chatty child cannot block on a full pipe.
//! The bound covers the whole group: if the child or anything it left
//! behind is still running (or holding the pipes) when it elapses, the
//! group is killed.

use super::{CommandOutput, CommandRunner, Invocation, RunError};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often a running child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long readers get to finish after the group was killed
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs commands as real child processes
#[derive(Debug, Clone)]
pub struct SystemRunner {
    poll_interval: Duration,
}

impl SystemRunner {
    /// Create a new runner
    pub fn new() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| RunError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(pid, command = %invocation, "Spawned child");

        let pipes = Pipes {
            stdout: child.stdout.take().map(drain),
            stderr: child.stderr.take().map(drain),
        };

        let deadline = Instant::now() + invocation.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    warn!(pid, command = %invocation, "Command timed out, killing process group");
                    kill_group(&mut child);
                    pipes.wait_until(Instant::now() + DRAIN_GRACE, self.poll_interval);
                    let _ = pipes.collect();
                    return Err(RunError::TimedOut {
                        command: invocation.to_string(),
                        timeout: invocation.timeout,
                    });
                }
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    kill_group(&mut child);
                    return Err(RunError::Io(e));
                }
            }
        };

        // Leftover background processes may still hold the pipes open
        if !pipes.wait_until(deadline, self.poll_interval) {
            warn!(
                pid,
                command = %invocation,
                "Command exited but its pipes are still open, killing process group"
            );
            signal_group(pid);
            pipes.wait_until(Instant::now() + DRAIN_GRACE, self.poll_interval);
        }

        let (stdout, stderr) = pipes.collect();
        Ok(CommandOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Reader threads for the child's output pipes
struct Pipes {
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl Pipes {
    fn finished(&self) -> bool {
        [&self.stdout, &self.stderr]
            .into_iter()
            .flatten()
            .all(|handle| handle.is_finished())
    }

    /// Poll until both readers hit EOF or `deadline` passes
    fn wait_until(&self, deadline: Instant, poll: Duration) -> bool {
        loop {
            if self.finished() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(poll);
        }
    }

    /// Output of finished readers; unfinished readers are detached
    fn collect(self) -> (String, String) {
        (take(self.stdout), take(self.stderr))
    }
}

fn drain<R>(mut pipe: R) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn take(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    match reader {
        Some(handle) if handle.is_finished() => handle
            .join()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// SIGKILL every process in the group led by `pid`
fn signal_group(pid: u32) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(pid) {
            // SAFETY: kill(2) with a negative pid only sends a signal
            let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
            if rc != 0 {
                debug!("killpg({}) failed: {}", pgid, std::io::Error::last_os_error());
            }
        }
    }

    #[cfg(not(unix))]
    let _ = pid;
}

/// Kill the child's process group and reap the child
fn kill_group(child: &mut Child) {
    signal_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}
