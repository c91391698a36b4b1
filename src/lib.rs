//! A tiny interactive shell that runs pipelines of external programs and builtins.
//!
//! One input line is split on `|` into stages ([`parser::Pipeline`]). The
//! [`router::Router`] wires a pipe between every pair of adjacent stages and the shell's
//! saved standard streams at both ends. Builtins (`cd`, `help`, `exit`) run inside the
//! shell with its fd 0 and fd 1 temporarily rebound; every other stage is forked and
//! exec'd without waiting, so all stages of a line run concurrently. The
//! [`job::JobTable`] then reaps every process before the prompt comes back.
//!
//! Descriptors are owned by move-only values from [`io_adapters`], so each one is
//! closed exactly once on every path, including failed launches.
//!
//! The main entry point is [`Interpreter`].

mod builtin;
pub mod command;
pub mod config;
pub mod error;
mod external;
mod interpreter;
pub mod io_adapters;
pub mod job;
pub mod lexer;
pub mod line_reader;
pub mod parser;
pub mod router;
pub mod session;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{BANNER, Interpreter, default_factories};
pub use builtin::{FAREWELL, HELP_TEXT};
pub use error::ShellError;
