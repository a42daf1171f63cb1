//! # Vigil - Periodic Daemons and Run-Once Guards for Rust
//!
//! Two small concurrency primitives for long-running processes.
//!
//! ## Features
//!
//! - **Periodic daemon**: run a task at a fixed interval, skipping ticks while
//!   the previous run is still busy
//! - **Two-stage shutdown**: the first termination signal drains the running
//!   task and runs cleanup, a second one exits at once
//! - **Supervisor friendly**: both shutdown paths end with exit status 0
//! - **Run-once guards**: `ExecOnce` runs a fallible operation until it
//!   succeeds once, no matter how many callers race it
//! - **Config support**: read the interval and triggers from TOML or YAML
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil::Daemon;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let daemon = Daemon::builder()
//!         .interval(Duration::from_secs(5))
//!         .pre_start(|| -> Result<(), std::io::Error> {
//!             println!("warming caches");
//!             Ok(())
//!         })
//!         .post_stop(|| println!("flushing buffers"))
//!         .build();
//!
//!     // Never returns unless the pre-start hook fails
//!     let error = daemon
//!         .exec_until_exit(|| async {
//!             println!("tick");
//!         })
//!         .await;
//!     eprintln!("daemon failed to start: {error}");
//! }
//! ```
//!
//! ## Run once
//!
//! ```rust
//! use vigil::ExecOnce;
//!
//! let migrate = ExecOnce::new(|version: u32| -> Result<(), String> {
//!     println!("migrating to {version}");
//!     Ok(())
//! });
//!
//! migrate.exec(3).unwrap();
//! migrate.exec(3).unwrap(); // no-op
//! assert!(migrate.has_succeeded());
//! ```
//!
//! ## Configuration
//!
//! Create `config/daemon.toml`:
//!
//! ```toml
//! [daemon]
//! interval = "30s"
//! termination_triggers = ["interrupt", "terminate", "hangup"]
//! ```
//!
//! Or `config/daemon.yaml`:
//!
//! ```yaml
//! daemon:
//!   interval: "30s"
//!   termination_triggers: [interrupt, terminate]
//! ```
//!
//! Environment variables with the `APP__` prefix override file values:
//!
//! ```bash
//! export APP__DAEMON__INTERVAL=10s
//! ```

// Re-export core types
pub use vigil_runtime::{
    exec_once_wrap, load_toml_config, load_yaml_config, signal_channel, tracing_sink,
    AsyncExecOnce, ChannelSignals, ConfigError, Daemon, DaemonBuilder, DaemonError,
    DaemonSettings, DaemonState, ExecOnce, LogSink, OsSignals, Runnable, SignalSender,
    SignalSource, Termination, TerminationTrigger, TimeUnit,
};

// Full runtime for less common items
pub use vigil_runtime;
