use std::io;

use nix::errno::Errno;
use thiserror::Error;

/// Everything that can go wrong while turning one line into running processes.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Storage for stages or arguments could not grow.
    #[error("out of memory while splitting input: {0}")]
    Allocation(#[from] std::collections::TryReserveError),

    /// The OS refused to create a process for a stage.
    #[error("failed creating new process: {0}")]
    ProcessCreation(Errno),

    /// A pipe between two adjacent stages could not be created.
    #[error("failed creating pipe: {0}")]
    Pipe(Errno),

    /// The shell could not duplicate, bind or restore one of its own descriptors.
    #[error("descriptor {fd}: {source}")]
    Descriptor { fd: i32, source: io::Error },

    /// `cd` target missing or inaccessible.
    #[error("cd: {0}")]
    DirectoryChange(String),

    /// Arguments could not be handed to exec (interior NUL byte).
    #[error("{name}: {reason}")]
    Exec { name: String, reason: String },

    /// Waiting for a child failed for a reason other than EINTR.
    #[error("waiting for pid {pid}: {source}")]
    Wait { pid: i32, source: Errno },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ShellError {
    /// Fatal errors terminate the whole shell: there is no consistent state to keep prompting from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::Allocation(_) | ShellError::Descriptor { .. })
    }

    pub(crate) fn descriptor(fd: i32, source: impl Into<io::Error>) -> Self {
        ShellError::Descriptor {
            fd,
            source: source.into(),
        }
    }
}

pub type Result<T, E = ShellError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allocation_and_descriptor_errors_are_fatal() {
        let mut v: Vec<u8> = Vec::new();
        let alloc = v.try_reserve(usize::MAX).unwrap_err();
        assert!(ShellError::Allocation(alloc).is_fatal());
        assert!(ShellError::descriptor(1, Errno::EBADF).is_fatal());
        assert!(!ShellError::ProcessCreation(Errno::EAGAIN).is_fatal());
        assert!(!ShellError::Pipe(Errno::EMFILE).is_fatal());
        assert!(!ShellError::DirectoryChange("nope".into()).is_fatal());
    }

    #[test]
    fn messages_name_the_failing_piece() {
        let err = ShellError::ProcessCreation(Errno::EAGAIN);
        assert!(err.to_string().starts_with("failed creating new process"));
        let err = ShellError::Exec {
            name: "ls".into(),
            reason: "nul byte".into(),
        };
        assert_eq!(err.to_string(), "ls: nul byte");
    }
}
