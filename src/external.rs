use crate::command::{CommandFactory, ExecutableCommand, LaunchContext, Outcome};
use crate::error::{Result, ShellError};
use crate::interpreter::Factory;
use crate::io_adapters::{DescriptorPair, bind_raw};
use crate::parser::Stage;
use nix::errno::Errno;
use nix::libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::{ForkResult, close, execvp, fork};
use std::ffi::CString;
use std::os::fd::RawFd;

/// Exit status of a child whose program could not be found.
pub const NOT_FOUND_STATUS: i32 = 127;
/// Exit status of a child whose program was found but could not be started.
pub const NOT_EXECUTABLE_STATUS: i32 = 126;

/// Command that is not a builtin.
///
/// The name is resolved by `execvp` in the child, through the inherited `PATH`.
pub struct ExternalCommand {
    name: String,
    argv: Vec<CString>,
}

impl ExternalCommand {
    pub fn new(stage: &Stage) -> Result<Self> {
        let argv = stage
            .argv()
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ShellError::Exec {
                name: stage.name().to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            name: stage.name().to_owned(),
            argv,
        })
    }
}

/// Matches every stage; registered after the builtins.
impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(&self, stage: &Stage) -> Option<Box<dyn ExecutableCommand>> {
        match ExternalCommand::new(stage) {
            Ok(cmd) => Some(Box::new(cmd)),
            Err(e) => Some(Box::new(Unlaunchable(e.to_string()))),
        }
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, io: DescriptorPair, ctx: &mut LaunchContext<'_>) -> Result<Outcome> {
        let [stdin, stdout] = io.raw_fds();
        let [saved_in, saved_out] = ctx.saved.raw_fds();
        let routing = [stdin, stdout, saved_in, saved_out];

        // SAFETY: the shell is single-threaded; the child only binds descriptors, resets
        // SIGPIPE and execs, or reports and exits without returning into shell code.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => exec_child(&self.name, &self.argv, stdin, stdout, &routing),
            Ok(ForkResult::Parent { child }) => {
                tracing::debug!(
                    pid = child.as_raw(),
                    stage = ctx.stage,
                    program = %self.name,
                    "spawned stage"
                );
                ctx.session.jobs.register(child, ctx.stage);
                drop(io);
                Ok(Outcome::Spawned(child))
            }
            Err(errno) => Err(ShellError::ProcessCreation(errno)),
        }
    }
}

/// Child side of a launch. Never returns.
fn exec_child(name: &str, argv: &[CString], stdin: RawFd, stdout: RawFd, routing: &[RawFd]) -> ! {
    let bound = bind_raw(stdin, STDIN_FILENO).and_then(|_| bind_raw(stdout, STDOUT_FILENO));
    if let Err(errno) = bound {
        eprintln!("{name}: cannot set up stdio: {errno}");
        _exit(NOT_EXECUTABLE_STATUS);
    }
    for &fd in routing {
        if fd != STDIN_FILENO && fd != STDOUT_FILENO {
            let _ = close(fd);
        }
    }
    // SAFETY: restoring the default disposition installs no handler code.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);
    }

    let errno = match execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    match errno {
        Errno::ENOENT => {
            eprintln!("{name}: command not found");
            _exit(NOT_FOUND_STATUS)
        }
        other => {
            eprintln!("Error executing program {name}: {}", other.desc());
            _exit(NOT_EXECUTABLE_STATUS)
        }
    }
}

/// Leave the child immediately, without atexit handlers or flushing inherited buffers.
fn _exit(code: i32) -> ! {
    // SAFETY: `_exit` only terminates the calling process.
    unsafe { nix::libc::_exit(code) }
}

/// A stage whose arguments cannot be passed to exec at all.
struct Unlaunchable(String);

impl ExecutableCommand for Unlaunchable {
    fn execute(self: Box<Self>, io: DescriptorPair, _ctx: &mut LaunchContext<'_>) -> Result<Outcome> {
        eprintln!("{}", self.0);
        drop(io);
        Ok(Outcome::Finished(NOT_EXECUTABLE_STATUS))
    }
}
