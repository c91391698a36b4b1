use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use crate::error::{Result, ShellError};
use crate::io_adapters::DescriptorPair;

/// Hands out the [`DescriptorPair`] for each stage of one pipeline, in order.
///
/// Stage 0 reads from a duplicate of the shell's saved stdin and the last stage writes to a
/// duplicate of the saved stdout. Each pair of adjacent stages gets exactly one pipe: its
/// write end becomes the earlier stage's output and its read end is held here until the
/// next call, where it becomes that stage's input.
pub struct Router<'a> {
    stdout: BorrowedFd<'a>,
    current_input: Option<OwnedFd>,
    next_stage: usize,
    stages: usize,
    pipes_created: usize,
}

impl<'a> Router<'a> {
    pub fn new(stdin: BorrowedFd<'a>, stdout: BorrowedFd<'a>, stages: usize) -> Result<Self> {
        let current_input = stdin
            .try_clone_to_owned()
            .map_err(|e| ShellError::descriptor(stdin.as_raw_fd(), e))?;
        Ok(Self {
            stdout,
            current_input: Some(current_input),
            next_stage: 0,
            stages,
            pipes_created: 0,
        })
    }

    /// Descriptors for the next stage, or `None` once every stage has been routed.
    pub fn next_pair(&mut self) -> Option<Result<DescriptorPair>> {
        if self.next_stage >= self.stages {
            return None;
        }
        let input = self.current_input.take()?;
        let stage = self.next_stage;
        self.next_stage += 1;

        let output = if stage + 1 == self.stages {
            self.stdout
                .try_clone_to_owned()
                .map_err(|e| ShellError::descriptor(self.stdout.as_raw_fd(), e))
        } else {
            pipe2(OFlag::O_CLOEXEC)
                .map(|(read, write)| {
                    self.pipes_created += 1;
                    self.current_input = Some(read);
                    write
                })
                .map_err(ShellError::Pipe)
        };

        Some(output.map(|output| {
            tracing::trace!(
                stage,
                input = input.as_raw_fd(),
                output = output.as_raw_fd(),
                "routed stage"
            );
            DescriptorPair::new(input, output)
        }))
    }

    pub fn pipes_created(&self) -> usize {
        self.pipes_created
    }
}
