//! Tracking and reaping of the external processes of the foreground pipeline.

use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use crate::command::ExitCode;
use crate::error::{Result, ShellError};

/// Lifecycle of one job. Every state but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Exited(i32),
    Signaled(Signal),
    /// Gone before we could wait for it; its status is unknown.
    Lost,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }

    /// Shell-style exit status; `None` while running or when unknown.
    pub fn exit_code(&self) -> Option<ExitCode> {
        match *self {
            JobState::Running | JobState::Lost => None,
            JobState::Exited(code) => Some(code),
            JobState::Signaled(sig) => Some(128 + sig as i32),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "Running"),
            JobState::Exited(code) => write!(f, "Exited({code})"),
            JobState::Signaled(sig) => write!(f, "Signaled({sig})"),
            JobState::Lost => write!(f, "Lost"),
        }
    }
}

/// A launched external process, pending reap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    /// Index of the stage this process runs.
    pub stage: usize,
    pub state: JobState,
}

/// Jobs of the current pipeline, in launch order.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly spawned process as `Running`.
    pub fn register(&mut self, pid: Pid, stage: usize) {
        tracing::debug!(pid = pid.as_raw(), stage, "registered job");
        self.jobs.push(Job {
            pid,
            stage,
            state: JobState::Running,
        });
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Wait for every job to reach a terminal state and empty the table.
    ///
    /// The job of the last launched stage is waited for first; the rest follow in launch
    /// order. Each pid is waited on exactly once. The table is empty afterwards even if a
    /// wait failed; reaped jobs are returned in launch order.
    pub fn drain(&mut self) -> Result<Vec<Job>> {
        let mut jobs = std::mem::take(&mut self.jobs);
        let mut first_error = None;

        let order = jobs
            .len()
            .checked_sub(1)
            .into_iter()
            .chain(0..jobs.len().saturating_sub(1));
        for index in order {
            let job = &mut jobs[index];
            match wait_terminal(job.pid) {
                Ok(state) => {
                    tracing::debug!(pid = job.pid.as_raw(), stage = job.stage, %state, "reaped job");
                    job.state = state;
                }
                Err(e) => {
                    tracing::warn!(pid = job.pid.as_raw(), "{e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(jobs),
        }
    }
}

/// Block until `pid` exits or is killed.
///
/// A pid that is no longer our child (already reaped elsewhere) is reported as `Lost`.
fn wait_terminal(pid: Pid) -> Result<JobState> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(JobState::Exited(code)),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(JobState::Signaled(sig)),
            Ok(other) => tracing::trace!(pid = pid.as_raw(), ?other, "non-terminal wait status"),
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                tracing::warn!(pid = pid.as_raw(), "job was already reaped");
                return Ok(JobState::Lost);
            }
            Err(source) => {
                return Err(ShellError::Wait {
                    pid: pid.as_raw(),
                    source,
                });
            }
        }
    }
}
