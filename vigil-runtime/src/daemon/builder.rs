use super::daemon::Daemon;
use crate::config::DaemonSettings;
use crate::error::{BoxError, ConfigError};
use crate::log::LogSink;
use crate::signal::{SignalSource, TerminationTrigger};
use config::Config;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type PreStartHook = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;
pub(crate) type PostStopHook = Arc<dyn Fn() + Send + Sync>;

/// Unresolved daemon options; anything left `None` gets its default on `exec`
#[derive(Default)]
pub(crate) struct DaemonOptions {
    pub(crate) interval: Option<Duration>,
    pub(crate) termination_triggers: Option<Vec<TerminationTrigger>>,
    pub(crate) pre_start: Option<PreStartHook>,
    pub(crate) post_stop: Option<PostStopHook>,
    pub(crate) log_sink: Option<LogSink>,
    pub(crate) signal_source: Option<Box<dyn SignalSource>>,
}

/// Builder for a [`Daemon`]
///
/// Every option is optional:
///
/// | option | default |
/// |---|---|
/// | `interval` | smallest positive duration, i.e. as fast as the timer allows |
/// | `termination_triggers` | interrupt, terminate |
/// | `pre_start` | succeeds immediately |
/// | `post_stop` | no-op |
/// | `log_sink` | discards messages |
/// | `signal_source` | operating system signals for the configured triggers |
#[derive(Default)]
pub struct DaemonBuilder {
    pub(crate) options: DaemonOptions,
}

impl DaemonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from the `[daemon]` table of a loaded config
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use vigil_runtime::{load_toml_config, DaemonBuilder};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = load_toml_config("config/daemon.toml")?;
    /// let daemon = DaemonBuilder::from_config(&config)?
    ///     .post_stop(|| println!("flushed"))
    ///     .build();
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new().with_settings(&DaemonSettings::from_config(config)?)
    }

    /// Apply settings; keys absent from `settings` keep their current value
    pub fn with_settings(mut self, settings: &DaemonSettings) -> Result<Self, ConfigError> {
        if let Some(interval) = settings.interval()? {
            self.options.interval = Some(interval);
        }
        if let Some(triggers) = settings.termination_triggers()? {
            self.options.termination_triggers = Some(triggers);
        }
        Ok(self)
    }

    /// Time between ticks. A zero interval counts as unset.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.options.interval = Some(interval);
        self
    }

    pub fn termination_triggers<I>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = TerminationTrigger>,
    {
        let mut unique: Vec<TerminationTrigger> = Vec::new();
        for trigger in triggers {
            if !unique.contains(&trigger) {
                unique.push(trigger);
            }
        }
        self.options.termination_triggers = Some(unique);
        self
    }

    /// Hook run once before the main loop; an error aborts `exec`
    pub fn pre_start<F, E>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.options.pre_start = Some(Arc::new(move || -> Result<(), BoxError> {
            hook().map_err(Into::into)
        }));
        self
    }

    /// Hook run once during graceful shutdown, after the last task finished
    pub fn post_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.options.post_stop = Some(Arc::new(hook));
        self
    }

    pub fn log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.options.log_sink = Some(Arc::new(sink));
        self
    }

    /// Replace the operating system signals with another source,
    /// e.g. [`ChannelSignals`](crate::ChannelSignals)
    pub fn signal_source<S>(mut self, source: S) -> Self
    where
        S: SignalSource + 'static,
    {
        self.options.signal_source = Some(Box::new(source));
        self
    }

    /// Build the daemon (does not start it yet)
    pub fn build(self) -> Daemon {
        Daemon::from_options(self.options)
    }
}
