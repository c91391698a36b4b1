use argh::FromArgs;

/// Prompt printed before every line unless overridden.
pub const DEFAULT_PROMPT: &str = "> ";

#[derive(FromArgs, Debug)]
/// A tiny shell: runs commands and pipelines of commands joined with `|`.
pub struct Args {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// prompt printed before each line.
    pub prompt: String,

    #[argh(switch, short = 'q')]
    /// do not print the startup banner.
    pub quiet: bool,

    #[argh(switch)]
    /// read lines without line editing, even on a terminal.
    pub plain: bool,
}

/// Settings of one interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    pub banner: bool,
    /// Use the line editor when stdin is a terminal.
    pub line_editor: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            banner: true,
            line_editor: true,
        }
    }
}

impl From<Args> for ShellConfig {
    fn from(args: Args) -> Self {
        Self {
            prompt: args.prompt,
            banner: !args.quiet,
            line_editor: !args.plain,
        }
    }
}
