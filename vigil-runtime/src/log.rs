use std::sync::Arc;

/// Receives human readable lifecycle messages from a daemon
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Sink that drops every message
pub fn discard_sink() -> LogSink {
    Arc::new(|_msg: &str| {})
}

/// Sink that forwards every message to `tracing` at info level
pub fn tracing_sink() -> LogSink {
    Arc::new(|msg: &str| tracing::info!(target: "vigil::daemon", "{msg}"))
}
