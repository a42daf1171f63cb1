use thiserror::Error;

/// Boxed error returned by user hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`Daemon::exec`](crate::Daemon::exec)
#[derive(Debug, Error)]
pub enum DaemonError {
    /// `exec` was called on an instance that already ran.
    /// This is a programming error in the caller, the instance can never be reused.
    #[error("each daemon can only run once until process end")]
    DoubleRun,

    /// The pre-start hook failed; no ticker or background task was created
    #[error("pre-start hook failed: {0}")]
    Startup(#[source] BoxError),

    #[error("failed to install termination signal handlers: {0}")]
    SignalSetup(#[from] std::io::Error),
}

/// Errors produced while loading daemon settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid interval '{0}'")]
    InvalidInterval(String),

    #[error("unknown termination trigger '{0}'")]
    UnknownTrigger(String),
}
