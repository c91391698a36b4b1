use crate::command::{CommandFactory, ExecutableCommand, ExitCode, LaunchContext, Outcome};
use crate::error::{Result, ShellError};
use crate::interpreter::Factory;
use crate::io_adapters::{DescriptorPair, StdioRedirect};
use crate::parser::Stage;
use crate::session::Session;
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::{self, Write};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. While one runs, the shell's own fd 0 and
/// fd 1 are bound to the stage's descriptors, so `help | cat -n` behaves like any pipe.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "help" or "cd".
    fn name() -> &'static str;

    /// Executes the command. Output goes to `stdout`, which is the stage's output.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> anyhow::Result<ExitCode>;
}

/// Run `body` with the shell's stdio bound to `io`, restoring it afterwards.
fn run_redirected(
    io: DescriptorPair,
    ctx: &mut LaunchContext<'_>,
    body: impl FnOnce(&mut dyn Write, &mut Session) -> ExitCode,
) -> Result<Outcome> {
    let code = {
        let _redirect = StdioRedirect::apply(ctx.saved, &io)?;
        let mut stdout = io::stdout().lock();
        let code = body(&mut stdout, ctx.session);
        stdout.flush()?;
        code
    };
    drop(io);
    Ok(Outcome::Finished(code))
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, io: DescriptorPair, ctx: &mut LaunchContext<'_>) -> Result<Outcome> {
        tracing::debug!(builtin = T::name(), stage = ctx.stage, "running builtin");
        let cmd = *self;
        run_redirected(io, ctx, move |stdout, session| {
            match <T as BuiltinCommand>::execute(cmd, stdout, session) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("{e}");
                    1
                }
            }
        })
    }
}

/// Usage or argument errors reported by `argh` instead of running the builtin.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, io: DescriptorPair, ctx: &mut LaunchContext<'_>) -> Result<Outcome> {
        let InvalidArgs { output, is_error } = *self;
        run_redirected(io, ctx, move |stdout, _| {
            if is_error {
                eprintln!("{}", output.trim_end());
                1
            } else {
                match writeln!(stdout, "{}", output.trim_end()) {
                    Ok(()) => 0,
                    Err(_) => 1,
                }
            }
        })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, stage: &Stage) -> Option<Box<dyn ExecutableCommand>> {
        let name = stage.name();
        if name != T::name() {
            return None;
        }
        Some(match T::from_args(&[name], &verbatim(stage)) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

/// Builtins take no flags: `--` makes argh treat every argument as positional.
fn verbatim(stage: &Stage) -> Vec<&str> {
    std::iter::once("--")
        .chain(stage.args().iter().map(String::as_str))
        .collect()
}

/// Text printed by `help`.
pub const HELP_TEXT: &str = "\
This shell should accept usual linux shell commands. But there are built in commands too:
help - print this message.
cd [directory] - perform chdir command to change directory
exit - closes the shell
";

/// Line printed by `exit`.
pub const FAREWELL: &str = "Bye";

#[derive(FromArgs)]
/// Print the list of built-in commands.
pub struct Help {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> anyhow::Result<ExitCode> {
        stdout.write_all(HELP_TEXT.as_bytes())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory of the shell.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to, taken verbatim; anything after it is ignored.
    pub args: Vec<String>,
}

impl Cd {
    pub fn target(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    fn change_dir(&self) -> Result<()> {
        let target = self
            .target()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ShellError::DirectoryChange("missing directory argument".into()))?;
        env::set_current_dir(target)
            .map_err(|e| ShellError::DirectoryChange(format!("{target}: {e}")))
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, _session: &mut Session) -> anyhow::Result<ExitCode> {
        self.change_dir()?;
        tracing::debug!(cwd = ?env::current_dir().ok(), "changed directory");
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell once the current line has finished.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; accepted so that `exit 0` still exits.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> anyhow::Result<ExitCode> {
        writeln!(stdout, "{FAREWELL}")?;
        session.should_exit = true;
        Ok(0)
    }
}

/// The builtin factories, in lookup order.
pub fn factories() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<Exit>::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(line: &str) -> Stage {
        Stage::new(crate::lexer::split_args(line).unwrap()).unwrap()
    }

    fn parse<T: FromArgs>(line: &str) -> std::result::Result<T, EarlyExit> {
        let stage = stage(line);
        T::from_args(&[stage.name()], &verbatim(&stage))
    }

    #[test]
    fn factories_match_only_their_name() {
        let all = factories();
        for line in ["cd /tmp", "help", "exit"] {
            let hits = all.iter().filter(|f| f.try_create(&stage(line)).is_some()).count();
            assert_eq!(hits, 1, "{line}");
        }
        assert!(all.iter().all(|f| f.try_create(&stage("ls -l")).is_none()));
        assert!(all.iter().all(|f| f.try_create(&stage("CD /tmp")).is_none()));
    }

    #[test]
    fn help_writes_usage() {
        let mut out: Vec<u8> = Vec::new();
        let mut session = Session::new();
        let code = BuiltinCommand::execute(Help { _args: Vec::new() }, &mut out, &mut session).unwrap();
        assert_eq!(code, 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("cd [directory]"));
        assert!(text.contains("exit - closes the shell"));
        assert!(!session.should_exit);
    }

    #[test]
    fn exit_says_bye_and_sets_flag() {
        let mut out: Vec<u8> = Vec::new();
        let mut session = Session::new();
        let exit = parse::<Exit>("exit 3").unwrap();
        let code = BuiltinCommand::execute(exit, &mut out, &mut session).unwrap();
        assert_eq!(code, 0);
        assert_eq!(out, b"Bye\n");
        assert!(session.should_exit);
    }

    #[test]
    fn cd_without_target_fails() {
        let cd = parse::<Cd>("cd").unwrap();
        assert!(cd.target().is_none());
        let err = cd.change_dir().unwrap_err();
        assert!(matches!(err, ShellError::DirectoryChange(_)));
    }

    #[test]
    fn cd_to_missing_dir_keeps_cwd_and_flag() {
        let before = env::current_dir().unwrap();
        let mut session = Session::new();
        let cd = parse::<Cd>("cd /definitely/not/here/tinysh").unwrap();
        let err = BuiltinCommand::execute(cd, &mut Vec::<u8>::new(), &mut session).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here/tinysh"));
        assert_eq!(env::current_dir().unwrap(), before);
        assert!(!session.should_exit);
    }

    #[test]
    fn builtin_arguments_are_never_flags() {
        assert!(parse::<Help>("help me").is_ok());
        assert!(parse::<Help>("help --help").is_ok());
        assert_eq!(parse::<Cd>("cd --help").unwrap().target(), Some("--help"));
        assert_eq!(parse::<Cd>("cd -dir extra").unwrap().target(), Some("-dir"));
        assert_eq!(parse::<Cd>("cd -- x").unwrap().target(), Some("--"));
    }

    #[test]
    fn help_with_flag_like_argument_prints_usage() {
        let factory = Factory::<Help>::default();
        assert!(factory.try_create(&stage("help --help")).is_some());
        let help = parse::<Help>("help -x").unwrap();
        let mut out: Vec<u8> = Vec::new();
        BuiltinCommand::execute(help, &mut out, &mut Session::new()).unwrap();
        assert_eq!(out, HELP_TEXT.as_bytes());
    }
}
