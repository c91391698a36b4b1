use nix::unistd::Pid;

use crate::error::Result;
use crate::io_adapters::{DescriptorPair, SavedStdio};
use crate::parser::Stage;
use crate::session::Session;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// A process killed by signal `n` reports `128 + n`, as POSIX shells do.
pub type ExitCode = i32;

/// What launching a stage produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A builtin ran to completion inside the shell.
    Finished(ExitCode),
    /// An external program was started and is now a job of the current pipeline.
    Spawned(Pid),
}

/// Everything a command may touch while it is being launched.
pub struct LaunchContext<'a> {
    /// The shell's original stdio, restored after builtins and closed in children.
    pub saved: &'a SavedStdio,
    pub session: &'a mut Session,
    /// Position of the stage within its pipeline.
    pub stage: usize,
}

/// Object-safe trait for any command that can be launched by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Launch the command with `io` as its standard input and output.
    ///
    /// Takes ownership of the pair; the shell's copy is closed when it is dropped here.
    fn execute(self: Box<Self>, io: DescriptorPair, ctx: &mut LaunchContext<'_>) -> Result<Outcome>;
}

/// Factory that tries to create a command from a stage.
///
/// Returns `None` when the factory doesn't recognize the stage's name.
pub trait CommandFactory {
    fn try_create(&self, stage: &Stage) -> Option<Box<dyn ExecutableCommand>>;
}
