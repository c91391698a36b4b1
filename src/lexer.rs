//! Lexical analysis for the shell's input lines.
//!
//! The grammar is deliberately flat: a line is split on the pipe delimiter into stage
//! strings, and each stage string is split on runs of whitespace into arguments.
//! There is no quoting and no escaping; a `|` always separates stages.

use crate::error::Result;

/// The only operator the shell understands.
pub const PIPE_DELIMITER: char = '|';

/// Empty vector with room for `n` items, or `ShellError::Allocation`.
fn reserved<T>(n: usize) -> Result<Vec<T>> {
    let mut items = Vec::new();
    items.try_reserve_exact(n)?;
    Ok(items)
}

/// Split a raw line into pipeline-stage strings.
///
/// Each stage is cut at the first line-ending character, so a trailing `"\n"` or `"\r\n"`
/// never reaches the argument splitter. Stages are returned verbatim otherwise: a stage
/// made only of whitespace is kept here and dropped later by the parser.
///
/// Example
/// ```
/// use tinysh::lexer::split_stages;
/// assert_eq!(split_stages("ls -l | wc\n").unwrap(), vec!["ls -l ", " wc"]);
/// ```
pub fn split_stages(line: &str) -> Result<Vec<&str>> {
    let mut stages = reserved(line.matches(PIPE_DELIMITER).count() + 1)?;
    stages.extend(line.split(PIPE_DELIMITER).map(|stage| match stage.find(['\r', '\n']) {
        Some(end) => &stage[..end],
        None => stage,
    }));
    Ok(stages)
}

/// Split one stage string into its argument vector.
///
/// Consecutive separators collapse, leading and trailing separators are ignored and no
/// empty argument is ever produced. An empty result denotes a no-op stage.
pub fn split_args(stage: &str) -> Result<Vec<String>> {
    let mut args = reserved(stage.split_whitespace().count())?;
    for word in stage.split_whitespace() {
        let mut arg = String::new();
        arg.try_reserve_exact(word.len())?;
        arg.push_str(word);
        args.push(arg);
    }
    Ok(args)
}
