//! Pipelines driven through `Interpreter::new` with extra factories in front of the
//! default ones, to observe how stages are launched and reaped.

use std::cell::RefCell;
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::MetadataExt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use tinysh::command::{CommandFactory, ExecutableCommand, LaunchContext, Outcome};
use tinysh::error::Result;
use tinysh::io_adapters::DescriptorPair;
use tinysh::parser::Stage;
use tinysh::{Interpreter, ShellError, default_factories};

/// A command whose process can never be created.
struct ForkFails;

impl ExecutableCommand for ForkFails {
    fn execute(self: Box<Self>, _io: DescriptorPair, _ctx: &mut LaunchContext<'_>) -> Result<Outcome> {
        Err(ShellError::ProcessCreation(Errno::EAGAIN))
    }
}

struct ForkFailsFactory;

impl CommandFactory for ForkFailsFactory {
    fn try_create(&self, stage: &Stage) -> Option<Box<dyn ExecutableCommand>> {
        (stage.name() == "boom").then(|| Box::new(ForkFails) as Box<dyn ExecutableCommand>)
    }
}

/// Wraps the default factories and records, after every launch, which stage was created
/// and how many jobs the session then tracks.
#[derive(Default)]
struct Recorder {
    created: RefCell<Vec<String>>,
    jobs_after_launch: RefCell<Vec<usize>>,
}

struct Recording {
    inner: Box<dyn ExecutableCommand>,
    recorder: Rc<Recorder>,
}

impl ExecutableCommand for Recording {
    fn execute(self: Box<Self>, io: DescriptorPair, ctx: &mut LaunchContext<'_>) -> Result<Outcome> {
        let Recording { inner, recorder } = *self;
        let outcome = inner.execute(io, ctx)?;
        recorder.jobs_after_launch.borrow_mut().push(ctx.session.jobs.len());
        Ok(outcome)
    }
}

struct RecordingFactory {
    defaults: Vec<Box<dyn CommandFactory>>,
    recorder: Rc<Recorder>,
}

impl CommandFactory for RecordingFactory {
    fn try_create(&self, stage: &Stage) -> Option<Box<dyn ExecutableCommand>> {
        self.recorder.created.borrow_mut().push(stage.name().to_owned());
        let inner = self.defaults.iter().find_map(|f| f.try_create(stage))?;
        Some(Box::new(Recording {
            inner,
            recorder: Rc::clone(&self.recorder),
        }))
    }
}

fn recording_shell() -> (Interpreter, Rc<Recorder>) {
    let recorder = Rc::new(Recorder::default());
    let commands: Vec<Box<dyn CommandFactory>> = vec![
        Box::new(ForkFailsFactory),
        Box::new(RecordingFactory {
            defaults: default_factories(),
            recorder: Rc::clone(&recorder),
        }),
    ];
    (Interpreter::new(commands), recorder)
}

/// Device and inode behind fd 0 and fd 1.
fn stdio_identity() -> [(u64, u64); 2] {
    fn id(fd: BorrowedFd<'_>) -> (u64, u64) {
        let meta = File::from(fd.try_clone_to_owned().unwrap()).metadata().unwrap();
        (meta.dev(), meta.ino())
    }
    [id(io::stdin().as_fd()), id(io::stdout().as_fd())]
}

#[test]
fn every_external_stage_is_one_tracked_process() {
    let (mut sh, recorder) = recording_shell();
    let status = sh.run_line("sleep 0.1 | true | cat | cat").unwrap();
    assert_eq!(status, 0);
    assert_eq!(*recorder.jobs_after_launch.borrow(), vec![1, 2, 3, 4]);
    assert!(sh.session().jobs.is_empty());
}

#[test]
fn failed_process_creation_stops_later_stages_and_drains_earlier_ones() {
    let (mut sh, recorder) = recording_shell();
    let before = stdio_identity();
    let started = Instant::now();

    let status = sh.run_line("sleep 0.2 | boom | sleep 5").unwrap();

    let elapsed = started.elapsed();
    assert_eq!(status, 1);
    assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert_eq!(*recorder.created.borrow(), vec!["sleep"]);
    assert_eq!(*recorder.jobs_after_launch.borrow(), vec![1]);
    assert!(sh.session().jobs.is_empty());
    assert_eq!(stdio_identity(), before);
    assert!(!sh.should_exit());
}
