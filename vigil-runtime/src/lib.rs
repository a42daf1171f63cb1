//! Vigil Runtime - Core runtime for periodic daemons and run-once guards
//!
//! This crate provides the runtime infrastructure re-exported by `vigil`.

mod config;
mod daemon;
mod error;
mod log;
mod once;
mod runnable;
mod signal;
mod time_unit;

// Re-export public API
pub use self::config::{load_toml_config, load_yaml_config, DaemonSettings};
pub use daemon::{Daemon, DaemonBuilder, DaemonState, Termination};
pub use error::{BoxError, ConfigError, DaemonError};
pub use log::{discard_sink, tracing_sink, LogSink};
pub use once::{exec_once_wrap, AsyncExecOnce, ExecOnce};
pub use runnable::Runnable;
pub use signal::{
    signal_channel, ChannelSignals, OsSignals, SignalSender, SignalSource, TerminationTrigger,
    DEFAULT_TRIGGERS,
};
pub use time_unit::TimeUnit;
