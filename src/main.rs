use std::io::{self, IsTerminal};
use std::process::ExitCode;

use tinysh::Interpreter;
use tinysh::config::{Args, ShellConfig};
use tinysh::line_reader::{EditorReader, PlainReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Diagnostics go to stderr so they never enter a pipeline (respects RUST_LOG).
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Args = argh::from_env();
    let config = ShellConfig::from(args);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tinysh: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &ShellConfig) -> anyhow::Result<()> {
    let mut sh = Interpreter::default();
    if config.line_editor && io::stdin().is_terminal() {
        let mut reader = EditorReader::new()?;
        sh.repl(&mut reader, config)
    } else {
        let mut reader = PlainReader::new(io::stdin().lock(), io::stdout());
        sh.repl(&mut reader, config)
    }
}
