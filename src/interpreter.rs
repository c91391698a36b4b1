use crate::command::{CommandFactory, ExecutableCommand, ExitCode, LaunchContext, Outcome};
use crate::config::ShellConfig;
use crate::error::{Result, ShellError};
use crate::io_adapters::SavedStdio;
use crate::job::Job;
use crate::line_reader::LineReader;
use crate::parser::{Pipeline, Stage};
use crate::router::Router;
use crate::session::Session;

/// Printed once before the first prompt unless the shell runs quietly.
pub const BANNER: &str = "This is a tiny shell. call 'help' for more info.";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate: builtins and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Turns input lines into running pipelines and waits for them.
///
/// The interpreter owns the [`Session`] and a list of [`CommandFactory`] objects that are
/// queried in order to create a command for each stage. See [`Default`] for the factories
/// included out of the box.
///
/// Example
/// ```
/// use tinysh::Interpreter;
/// let mut sh = Interpreter::default();
/// let status = sh.run_line("true | false").unwrap();
/// assert_eq!(status, 1);
/// assert!(sh.session().jobs.is_empty());
/// ```
pub struct Interpreter {
    session: Session,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            session: Session::new(),
            commands,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn should_exit(&self) -> bool {
        self.session.should_exit
    }

    /// Run one input line to completion and return the status of its last stage.
    ///
    /// A blank line touches no descriptors and leaves the previous status in place.
    pub fn run_line(&mut self, line: &str) -> Result<ExitCode> {
        let pipeline = Pipeline::parse(line)?;
        if pipeline.is_empty() {
            return Ok(self.session.last_status);
        }
        let status = self.run_pipeline(&pipeline)?;
        self.session.last_status = status;
        Ok(status)
    }

    /// Launch every stage without waiting in between, then reap all of them.
    ///
    /// A stage that fails to launch stops the remaining ones from launching; stages that
    /// already run are still waited for. The shell's fd 0 and fd 1 point at their original
    /// targets again when this returns, on every path.
    #[tracing::instrument(level = "debug", skip(self, pipeline), fields(stages = pipeline.len()))]
    pub fn run_pipeline(&mut self, pipeline: &Pipeline) -> Result<ExitCode> {
        let saved = SavedStdio::capture()?;
        let launched = self.launch_stages(pipeline, &saved);
        let reaped = self.session.jobs.drain();
        saved.finish()?;

        let reaped = reaped.unwrap_or_else(|e| {
            eprintln!("{e}");
            Vec::new()
        });
        match launched {
            Ok(last) => Ok(status_of(last, &reaped)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                eprintln!("{e}");
                Ok(1)
            }
        }
    }

    fn launch_stages(&mut self, pipeline: &Pipeline, saved: &SavedStdio) -> Result<Option<Outcome>> {
        let mut router = Router::new(saved.stdin(), saved.stdout(), pipeline.len())?;
        let mut last = None;
        for (index, stage) in pipeline.stages().iter().enumerate() {
            let Some(io) = router.next_pair() else { break };
            let io = io?;
            let cmd = self.create(stage)?;
            let mut ctx = LaunchContext {
                saved,
                session: &mut self.session,
                stage: index,
            };
            last = Some(cmd.execute(io, &mut ctx)?);
        }
        tracing::debug!(pipes = router.pipes_created(), "pipeline launched");
        Ok(last)
    }

    fn create(&self, stage: &Stage) -> Result<Box<dyn ExecutableCommand>> {
        self.commands
            .iter()
            .find_map(|factory| factory.try_create(stage))
            .ok_or_else(|| ShellError::Exec {
                name: stage.name().to_owned(),
                reason: "command not found".into(),
            })
    }

    /// Read-eval loop: prompt, read one line, run it, repeat.
    ///
    /// Ends at end of input, or right after the line on which `exit` ran has fully
    /// drained. Only fatal errors are returned; everything else is reported and the loop
    /// prompts again.
    pub fn repl(&mut self, reader: &mut dyn LineReader, config: &ShellConfig) -> anyhow::Result<()> {
        if config.banner {
            println!("{BANNER}");
        }
        while let Some(line) = reader.read_line(&config.prompt)? {
            reader.add_history(&line);
            match self.run_line(&line) {
                Ok(status) => tracing::trace!(status, "line finished"),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    eprintln!("{e}");
                    self.session.last_status = 1;
                }
            }
            if self.session.should_exit {
                break;
            }
        }
        Ok(())
    }
}

/// Status of the pipeline: whatever its last launched stage produced.
///
/// A last process whose status is unknown counts as a failure.
fn status_of(last: Option<Outcome>, reaped: &[Job]) -> ExitCode {
    match last {
        Some(Outcome::Finished(code)) => code,
        Some(Outcome::Spawned(pid)) => reaped
            .iter()
            .find(|job| job.pid == pid)
            .and_then(|job| job.state.exit_code())
            .unwrap_or(1),
        None => 0,
    }
}

/// The default set of commands, in lookup order:
/// - built-ins: `cd`, `help`, `exit`
/// - external command launcher, which accepts any other name
pub fn default_factories() -> Vec<Box<dyn CommandFactory>> {
    use crate::external::ExternalCommand;
    let mut commands = crate::builtin::factories();
    commands.push(Box::new(Factory::<ExternalCommand>::default()));
    commands
}

impl Default for Interpreter {
    /// Create an interpreter with [`default_factories`].
    fn default() -> Self {
        Self::new(default_factories())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobState;
    use nix::sys::signal::Signal;
    use nix::unistd::Pid;

    fn job(pid: i32, state: JobState) -> Job {
        Job {
            pid: Pid::from_raw(pid),
            stage: 0,
            state,
        }
    }

    #[test]
    fn builtin_status_wins_when_last() {
        assert_eq!(status_of(Some(Outcome::Finished(2)), &[]), 2);
    }

    #[test]
    fn spawned_status_comes_from_reaped_job() {
        let reaped = [job(10, JobState::Exited(0)), job(11, JobState::Exited(4))];
        let last = Some(Outcome::Spawned(Pid::from_raw(11)));
        assert_eq!(status_of(last, &reaped), 4);

        let reaped = [job(12, JobState::Signaled(Signal::SIGKILL))];
        let last = Some(Outcome::Spawned(Pid::from_raw(12)));
        assert_eq!(status_of(last, &reaped), 137);
    }

    #[test]
    fn unknown_last_status_is_failure() {
        let reaped = [job(13, JobState::Exited(0)), job(14, JobState::Lost)];
        assert_eq!(status_of(Some(Outcome::Spawned(Pid::from_raw(14))), &reaped), 1);
        assert_eq!(status_of(Some(Outcome::Spawned(Pid::from_raw(15))), &[]), 1);
    }

    #[test]
    fn nothing_launched_is_success() {
        assert_eq!(status_of(None, &[]), 0);
    }

    #[test]
    fn blank_line_skips_everything() {
        let mut sh = Interpreter::default();
        for line in ["", "\n", "   \t\r\n", " | "] {
            assert_eq!(sh.run_line(line).unwrap(), 0);
        }
        assert!(sh.session().jobs.is_empty());
        assert!(!sh.should_exit());
    }

    #[test]
    fn lookup_prefers_builtins() {
        let sh = Interpreter::default();
        let stage = Stage::new(vec!["help".into()]).unwrap();
        assert!(sh.create(&stage).is_ok());
    }

    #[test]
    fn lookup_without_external_factory_fails() {
        let sh = Interpreter::new(crate::builtin::factories());
        let stage = Stage::new(vec!["ls".into()]).unwrap();
        let err = sh.create(&stage).err().unwrap();
        assert_eq!(err.to_string(), "ls: command not found");
    }
}
