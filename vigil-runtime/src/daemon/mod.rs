mod builder;
mod daemon;
mod state;
mod termination;

pub use builder::DaemonBuilder;
pub use daemon::Daemon;
pub use state::DaemonState;
pub use termination::Termination;
