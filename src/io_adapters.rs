//! Move-only owners for the descriptors a pipeline routes between stages.
//!
//! Every descriptor the shell creates for routing lives in an [`OwnedFd`], so it is closed
//! exactly once when its owner goes away, on the success path and on every early return.
//! All of them are created close-on-exec: a launched program only ever sees what was
//! bound to its fd 0 and fd 1.

use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

use nix::libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::dup2;

use crate::error::{Result, ShellError};

/// Input and output descriptors assigned to one stage.
///
/// Whoever consumes the pair (a child binding it to fd 0/1, or a builtin running under a
/// [`StdioRedirect`]) only borrows it; the shell drops the pair right after launching the
/// stage, which closes its copy.
#[derive(Debug)]
pub struct DescriptorPair {
    input: OwnedFd,
    output: OwnedFd,
}

impl DescriptorPair {
    pub fn new(input: OwnedFd, output: OwnedFd) -> Self {
        Self { input, output }
    }

    pub fn input(&self) -> BorrowedFd<'_> {
        self.input.as_fd()
    }

    pub fn output(&self) -> BorrowedFd<'_> {
        self.output.as_fd()
    }

    pub(crate) fn raw_fds(&self) -> [RawFd; 2] {
        [self.input.as_raw_fd(), self.output.as_raw_fd()]
    }

    pub fn into_parts(self) -> (OwnedFd, OwnedFd) {
        (self.input, self.output)
    }
}

/// The shell's own standard input and output, saved for the duration of one pipeline.
///
/// Capturing duplicates fd 0 and fd 1; [`SavedStdio::finish`] (or dropping the value)
/// binds the saved copies back onto fd 0 and fd 1 and closes them.
#[derive(Debug)]
pub struct SavedStdio {
    stdin: OwnedFd,
    stdout: OwnedFd,
    restored: bool,
}

impl SavedStdio {
    pub fn capture() -> Result<Self> {
        flush_stdout();
        let stdin = io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| ShellError::descriptor(STDIN_FILENO, e))?;
        let stdout = io::stdout()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|e| ShellError::descriptor(STDOUT_FILENO, e))?;
        tracing::trace!(
            stdin = stdin.as_raw_fd(),
            stdout = stdout.as_raw_fd(),
            "saved shell stdio"
        );
        Ok(Self {
            stdin,
            stdout,
            restored: false,
        })
    }

    pub fn stdin(&self) -> BorrowedFd<'_> {
        self.stdin.as_fd()
    }

    pub fn stdout(&self) -> BorrowedFd<'_> {
        self.stdout.as_fd()
    }

    pub(crate) fn raw_fds(&self) -> [RawFd; 2] {
        [self.stdin.as_raw_fd(), self.stdout.as_raw_fd()]
    }

    /// Point fd 0 and fd 1 back at the saved originals. Safe to call repeatedly.
    pub fn restore(&self) -> Result<()> {
        flush_stdout();
        bind(self.stdin(), STDIN_FILENO)?;
        bind(self.stdout(), STDOUT_FILENO)
    }

    /// Restore and release the saved copies, reporting a failed restore.
    pub fn finish(mut self) -> Result<()> {
        self.restored = true;
        self.restore()
    }
}

impl Drop for SavedStdio {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = self.restore() {
                tracing::warn!("failed to restore shell stdio: {e}");
            }
        }
    }
}

/// Scoped rebinding of the shell's own fd 0 and fd 1 to a stage's pair.
///
/// Used around builtins so they observe pipe redirection like any external program; the
/// originals come back when the guard drops.
pub struct StdioRedirect<'a> {
    saved: &'a SavedStdio,
}

impl<'a> StdioRedirect<'a> {
    pub fn apply(saved: &'a SavedStdio, pair: &DescriptorPair) -> Result<Self> {
        let guard = Self { saved };
        flush_stdout();
        bind(pair.input(), STDIN_FILENO)?;
        bind(pair.output(), STDOUT_FILENO)?;
        Ok(guard)
    }
}

impl Drop for StdioRedirect<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.saved.restore() {
            tracing::warn!("failed to restore shell stdio after builtin: {e}");
        }
    }
}

/// Make `target` refer to the same open file as `fd`.
pub(crate) fn bind(fd: BorrowedFd<'_>, target: RawFd) -> Result<()> {
    bind_raw(fd.as_raw_fd(), target).map_err(|e| ShellError::descriptor(target, e))
}

/// Allocation-free variant for use between fork and exec.
pub(crate) fn bind_raw(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd == target {
        return Ok(());
    }
    loop {
        match dup2(fd, target) {
            Err(nix::errno::Errno::EINTR) => continue,
            result => return result.map(drop),
        }
    }
}

fn flush_stdout() {
    if let Err(e) = io::stdout().flush() {
        tracing::debug!("flushing stdout: {e}");
    }
}
