/// How a daemon's main loop ended
///
/// The daemon never exits the process itself; the host decides what to do
/// with this value. Both variants map to exit status 0 so a supervisor does
/// not mistake a requested shutdown for a crash and restart the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// First termination signal: ticker stopped, in-flight task awaited,
    /// post-stop hook run
    Graceful,
    /// Second termination signal while graceful shutdown was underway;
    /// waiting and cleanup were skipped
    Forced,
}

impl Termination {
    pub fn exit_code(&self) -> i32 {
        0
    }

    pub fn is_graceful(&self) -> bool {
        matches!(self, Termination::Graceful)
    }

    /// End the process with [`exit_code`](Self::exit_code)
    pub fn exit(self) -> ! {
        tracing::info!(termination = ?self, code = self.exit_code(), "process exiting");
        std::process::exit(self.exit_code())
    }
}
