use crate::command::ExitCode;
use crate::job::JobTable;

/// State owned by the interactive loop and shared with every command it launches.
///
/// - `should_exit`: set by `exit`; the loop checks it only after the current pipeline drained.
/// - `jobs`: external processes of the pipeline being run; empty between lines.
/// - `last_status`: exit status of the last stage of the previous pipeline.
#[derive(Debug, Default)]
pub struct Session {
    pub should_exit: bool,
    pub jobs: JobTable,
    pub last_status: ExitCode,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_keeps_running() {
        let session = Session::new();
        assert!(!session.should_exit);
        assert!(session.jobs.is_empty());
        assert_eq!(session.last_status, 0);
    }
}
