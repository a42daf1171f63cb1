use super::builder::{DaemonBuilder, DaemonOptions, PostStopHook, PreStartHook};
use super::state::{AtomicState, DaemonState};
use super::termination::Termination;
use crate::error::{BoxError, DaemonError};
use crate::log::{discard_sink, LogSink};
use crate::runnable::Runnable;
use crate::signal::{OsSignals, SignalSource, TerminationTrigger, DEFAULT_TRIGGERS};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Periodic task runner with a two-stage shutdown
///
/// Every `interval` the daemon tries to start the task. If the previous run
/// is still going the tick is skipped, never queued. The first termination
/// signal stops the ticker, waits for the running task, runs the post-stop
/// hook and ends the loop with [`Termination::Graceful`]. A second signal
/// while that is in progress ends the loop at once with
/// [`Termination::Forced`].
///
/// A daemon runs once per lifetime; see [`exec`](Self::exec).
pub struct Daemon {
    state: AtomicState,
    shutdown_count: AtomicUsize,
    task_in_flight: Arc<tokio::sync::Mutex<()>>,
    options: Mutex<Option<DaemonOptions>>,
}

/// Options with every default filled in
struct Resolved {
    interval: Duration,
    triggers: Vec<TerminationTrigger>,
    pre_start: PreStartHook,
    post_stop: PostStopHook,
    log: LogSink,
    /// Opened only once the pre-start hook succeeded
    signal_source: Option<Box<dyn SignalSource>>,
}

impl DaemonOptions {
    fn resolve(self) -> Resolved {
        let interval = self
            .interval
            .filter(|interval| !interval.is_zero())
            .unwrap_or(Duration::from_nanos(1));
        let triggers = self
            .termination_triggers
            .filter(|triggers| !triggers.is_empty())
            .unwrap_or_else(|| DEFAULT_TRIGGERS.to_vec());
        let pre_start: PreStartHook = match self.pre_start {
            Some(hook) => hook,
            None => Arc::new(|| -> Result<(), BoxError> { Ok(()) }),
        };
        let post_stop: PostStopHook = match self.post_stop {
            Some(hook) => hook,
            None => Arc::new(|| {}),
        };

        Resolved {
            interval,
            triggers,
            pre_start,
            post_stop,
            log: self.log_sink.unwrap_or_else(discard_sink),
            signal_source: self.signal_source,
        }
    }
}

impl Resolved {
    /// Take the injected source, or install OS handlers for the triggers
    fn open_signals(&mut self) -> Result<Box<dyn SignalSource>, DaemonError> {
        match self.signal_source.take() {
            Some(source) => Ok(source),
            None => Ok(Box::new(OsSignals::new(&self.triggers)?)),
        }
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Daemon {
    pub fn builder() -> DaemonBuilder {
        DaemonBuilder::new()
    }

    pub(crate) fn from_options(options: DaemonOptions) -> Self {
        Self {
            state: AtomicState::new(),
            shutdown_count: AtomicUsize::new(0),
            task_in_flight: Arc::new(tokio::sync::Mutex::new(())),
            options: Mutex::new(Some(options)),
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state.load()
    }

    /// Termination signals received so far; non-zero means shutdown started
    pub fn shutdown_count(&self) -> usize {
        self.shutdown_count.load(Ordering::Acquire)
    }

    /// Run `task` every interval until a termination signal arrives
    ///
    /// Returns [`DaemonError::DoubleRun`] if this instance already ran, and
    /// [`DaemonError::Startup`] if the pre-start hook fails (in which case
    /// nothing was started). Otherwise it only returns once shutdown is done;
    /// the caller decides how to end the process, usually with
    /// [`Termination::exit`].
    pub async fn exec<R>(&self, task: R) -> Result<Termination, DaemonError>
    where
        R: Runnable + 'static,
    {
        if !self.state.try_start() {
            error!("daemon exec called twice");
            return Err(DaemonError::DoubleRun);
        }

        let options = self
            .options
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();

        let mut resolved = options.resolve();

        let pre_start = Arc::clone(&resolved.pre_start);
        if let Err(e) = run_pre_start(pre_start, Arc::clone(&resolved.log)).await {
            self.state.store(DaemonState::Terminated);
            return Err(e);
        }

        // Signal handlers outlive the daemon, so nothing is installed before pre-start succeeds
        let signals = match resolved.open_signals() {
            Ok(signals) => signals,
            Err(e) => {
                error!(error = %e, "failed to install termination signal handlers");
                self.state.store(DaemonState::Terminated);
                return Err(e);
            }
        };

        self.main_loop(resolved, signals, Arc::new(task)).await
    }

    /// [`exec`](Self::exec), then end the process on termination.
    /// Only returns if the daemon could not start.
    pub async fn exec_until_exit<R>(&self, task: R) -> DaemonError
    where
        R: Runnable + 'static,
    {
        match self.exec(task).await {
            Ok(termination) => termination.exit(),
            Err(e) => e,
        }
    }

    async fn main_loop<R>(
        &self,
        resolved: Resolved,
        mut signals: Box<dyn SignalSource>,
        task: Arc<R>,
    ) -> Result<Termination, DaemonError>
    where
        R: Runnable + 'static,
    {
        let Resolved {
            interval,
            triggers,
            post_stop,
            log,
            ..
        } = resolved;

        info!(
            interval_ms = interval.as_secs_f64() * 1000.0,
            triggers = ?triggers,
            "daemon main loop starting"
        );
        log("start main loop...");

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticking = true;
        let mut signals_open = true;
        let mut runs: JoinSet<()> = JoinSet::new();
        let mut shutdown: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick(), if ticking => {
                    match Arc::clone(&self.task_in_flight).try_lock_owned() {
                        Ok(in_flight) => {
                            let task = Arc::clone(&task);
                            runs.spawn(async move {
                                let _in_flight = in_flight;
                                task.run().await;
                            });
                        }
                        Err(_) => {
                            debug!("previous task still running, tick skipped");
                            log("prev task takes too long, skip this round");
                        }
                    }
                }

                received = signals.recv(), if signals_open => {
                    let Some(trigger) = received else {
                        debug!("signal source closed");
                        signals_open = false;
                        continue;
                    };
                    if !triggers.contains(&trigger) {
                        debug!(%trigger, "ignoring signal that is not a termination trigger");
                        continue;
                    }

                    let count = self.shutdown_count.fetch_add(1, Ordering::AcqRel) + 1;
                    if count > 1 {
                        warn!(
                            %trigger,
                            shutdown_count = count,
                            "forced exit: skipping wait for running task and post-stop hook"
                        );
                        log("force exit, running task and post-stop hook are abandoned");
                        self.state.store(DaemonState::Terminated);
                        runs.detach_all();
                        return Ok(Termination::Forced);
                    }

                    info!(%trigger, "graceful shutdown requested");
                    self.state.store(DaemonState::ShuttingDown);
                    log("graceful shutdown");
                    log("stop ticker...");
                    ticking = false;
                    shutdown = Some(tokio::spawn(shutdown_sequence(
                        Arc::clone(&self.task_in_flight),
                        Arc::clone(&post_stop),
                        Arc::clone(&log),
                    )));
                }

                Some(joined) = runs.join_next() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!(error = %e, "scheduled task panicked");
                        }
                    }
                }

                finished = wait_for(&mut shutdown), if shutdown.is_some() => {
                    if let Err(e) = finished {
                        error!(error = %e, "shutdown sequence did not complete cleanly");
                    }
                    self.state.store(DaemonState::Terminated);
                    info!("daemon stopped gracefully");
                    return Ok(Termination::Graceful);
                }
            }
        }
    }
}

async fn run_pre_start(hook: PreStartHook, log: LogSink) -> Result<(), DaemonError> {
    log("run pre-start hook");
    debug!("running pre-start hook");

    let outcome = match tokio::task::spawn_blocking(move || hook()).await {
        Ok(outcome) => outcome,
        Err(join_error) => Err(format!("pre-start hook panicked: {join_error}").into()),
    };

    if let Err(e) = outcome {
        error!(error = %e, "pre-start hook failed");
        log(&format!("pre-start hook failed: {e}"));
        return Err(DaemonError::Startup(e));
    }
    Ok(())
}

/// Wait for the running task, then run the post-stop hook.
/// The ticker is already stopped, so no new task can take the lock.
async fn shutdown_sequence(
    task_in_flight: Arc<tokio::sync::Mutex<()>>,
    post_stop: PostStopHook,
    log: LogSink,
) {
    log("wait for running task...");
    let _idle = task_in_flight.lock_owned().await;

    log("run post-stop hook");
    if let Err(e) = tokio::task::spawn_blocking(move || post_stop()).await {
        error!(error = %e, "post-stop hook panicked");
    }

    log("done");
}

async fn wait_for(handle: &mut Option<JoinHandle<()>>) -> Result<(), tokio::task::JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
