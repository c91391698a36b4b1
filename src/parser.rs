use crate::error::Result;
use crate::lexer::{split_args, split_stages};

/// One command of a pipeline: the program (or builtin) name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    argv: Vec<String>,
}

impl Stage {
    /// Build a stage from a non-empty argument vector.
    ///
    /// Returns `None` for an empty vector; a stage without a name has nothing to run.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() { None } else { Some(Self { argv }) }
    }

    /// Argument 0.
    pub fn name(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments after the name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// The ordered stages built from one input line.
///
/// Stages that split into no arguments are removed while parsing. Removing a stage is the
/// same as forwarding its input straight to the next stage, so `a | | b` runs as `a | b`
/// and a trailing `|` leaves the last real stage writing to the shell's output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn parse(line: &str) -> Result<Self> {
        let raw = split_stages(line)?;
        let mut stages = Vec::new();
        stages.try_reserve_exact(raw.len())?;
        for stage in raw {
            stages.extend(Stage::new(split_args(stage)?));
        }
        Ok(Self { stages })
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}
