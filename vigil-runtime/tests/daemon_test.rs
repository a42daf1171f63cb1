use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use vigil_runtime::{
    signal_channel, Daemon, DaemonError, DaemonState, Runnable, Termination, TerminationTrigger,
};

const DEADLINE: Duration = Duration::from_secs(5);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[derive(Clone, Default)]
struct Messages(Arc<Mutex<Vec<String>>>);

impl Messages {
    fn sink(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let messages = Arc::clone(&self.0);
        move |msg: &str| messages.lock().unwrap().push(msg.to_string())
    }

    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count_containing(&self, needle: &str) -> usize {
        self.all().iter().filter(|m| m.contains(needle)).count()
    }

    fn position(&self, needle: &str) -> Option<usize> {
        self.all().iter().position(|m| m.contains(needle))
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(DEADLINE, async {
        while !condition() {
            tokio::time::sleep(ms(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Task that counts its runs and sleeps for `busy`
fn counting_task(runs: &Arc<AtomicUsize>, busy: Duration) -> impl Runnable + 'static {
    let runs = Arc::clone(runs);
    move || {
        let runs = Arc::clone(&runs);
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(busy).await;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_exec_returns_double_run() {
    let (signals, source) = signal_channel();
    let daemon = Arc::new(Daemon::builder().interval(ms(5)).signal_source(source).build());
    let runs = Arc::new(AtomicUsize::new(0));

    let first = {
        let daemon = Arc::clone(&daemon);
        let task = counting_task(&runs, Duration::ZERO);
        tokio::spawn(async move { daemon.exec(task).await })
    };
    wait_until(|| runs.load(Ordering::SeqCst) > 0).await;

    let second = daemon.exec(|| async {}).await;
    assert!(matches!(second, Err(DaemonError::DoubleRun)));

    // first loop keeps ticking
    let before = runs.load(Ordering::SeqCst);
    wait_until(|| runs.load(Ordering::SeqCst) > before).await;
    assert_eq!(daemon.state(), DaemonState::Running);

    assert!(signals.send(TerminationTrigger::Interrupt));
    let termination = tokio::time::timeout(DEADLINE, first)
        .await
        .expect("daemon should stop")
        .expect("join")
        .expect("exec");
    assert_eq!(termination, Termination::Graceful);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_pre_start_aborts_exec() {
    let (_signals, source) = signal_channel();
    let runs = Arc::new(AtomicUsize::new(0));
    let post_stops = Arc::new(AtomicUsize::new(0));
    let messages = Messages::default();

    let daemon = Daemon::builder()
        .interval(ms(5))
        .signal_source(source)
        .log_sink(messages.sink())
        .pre_start(|| Err::<(), _>(std::io::Error::other("database unreachable")))
        .post_stop({
            let post_stops = Arc::clone(&post_stops);
            move || {
                post_stops.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build();

    match daemon.exec(counting_task(&runs, Duration::ZERO)).await {
        Err(DaemonError::Startup(e)) => assert!(e.to_string().contains("database unreachable")),
        other => panic!("expected startup error, got {other:?}"),
    }

    tokio::time::sleep(ms(50)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 0, "no tick may fire");
    assert_eq!(post_stops.load(Ordering::SeqCst), 0);
    assert_eq!(daemon.state(), DaemonState::Terminated);
    assert_eq!(messages.count_containing("start main loop"), 0);

    // the instance is spent
    assert!(matches!(daemon.exec(|| async {}).await, Err(DaemonError::DoubleRun)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_pre_start_is_a_startup_error() {
    let (_signals, source) = signal_channel();
    let daemon = Daemon::builder()
        .signal_source(source)
        .pre_start(|| -> Result<(), std::io::Error> { panic!("bad config") })
        .build();

    let result = daemon.exec(|| async {}).await;
    assert!(matches!(result, Err(DaemonError::Startup(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_task_skips_ticks_and_never_overlaps() {
    let (signals, source) = signal_channel();
    let messages = Messages::default();
    let runs = Arc::new(AtomicUsize::new(0));
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    let daemon = Daemon::builder()
        .interval(ms(10))
        .signal_source(source)
        .log_sink(messages.sink())
        .build();

    let task = {
        let (runs, active, max_active) =
            (Arc::clone(&runs), Arc::clone(&active), Arc::clone(&max_active));
        move || {
            let (runs, active, max_active) =
                (Arc::clone(&runs), Arc::clone(&active), Arc::clone(&max_active));
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(ms(50)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        }
    };

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(ms(200)).await;
        signals.send(TerminationTrigger::Terminate);
    });

    let termination = tokio::time::timeout(DEADLINE, daemon.exec(task))
        .await
        .expect("daemon should stop")
        .expect("exec");
    stopper.await.expect("stopper");

    assert_eq!(termination, Termination::Graceful);
    assert_eq!(max_active.load(Ordering::SeqCst), 1, "task ran concurrently");
    let runs = runs.load(Ordering::SeqCst);
    assert!((2..=5).contains(&runs), "unexpected run count {runs}");
    assert!(messages.count_containing("skip this round") >= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_signal_waits_for_task_then_runs_post_stop() {
    let (signals, source) = signal_channel();
    let messages = Messages::default();
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));
    let post_stops = Arc::new(AtomicUsize::new(0));
    let saw_finished = Arc::new(AtomicBool::new(false));

    let daemon = Arc::new(
        Daemon::builder()
            .interval(ms(10))
            .signal_source(source)
            .log_sink(messages.sink())
            .post_stop({
                let (finished, post_stops, saw_finished) =
                    (Arc::clone(&finished), Arc::clone(&post_stops), Arc::clone(&saw_finished));
                move || {
                    saw_finished.store(finished.load(Ordering::SeqCst), Ordering::SeqCst);
                    post_stops.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build(),
    );

    let task = {
        let (started, finished) = (Arc::clone(&started), Arc::clone(&finished));
        move || {
            let (started, finished) = (Arc::clone(&started), Arc::clone(&finished));
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(ms(100)).await;
                finished.store(true, Ordering::SeqCst);
            }
        }
    };

    let handle = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move { daemon.exec(task).await })
    };
    wait_until(|| started.load(Ordering::SeqCst) == 1).await;
    assert!(signals.send(TerminationTrigger::Interrupt));

    wait_until(|| daemon.state() != DaemonState::Running).await;
    assert_eq!(daemon.shutdown_count(), 1);

    let termination = tokio::time::timeout(DEADLINE, handle)
        .await
        .expect("daemon should stop")
        .expect("join")
        .expect("exec");

    assert_eq!(termination, Termination::Graceful);
    assert_eq!(termination.exit_code(), 0);
    assert_eq!(post_stops.load(Ordering::SeqCst), 1);
    assert!(saw_finished.load(Ordering::SeqCst), "post-stop ran before the task finished");
    assert_eq!(started.load(Ordering::SeqCst), 1, "no task may start after shutdown began");
    assert_eq!(daemon.state(), DaemonState::Terminated);

    let graceful = messages.position("graceful shutdown").expect("graceful logged");
    let waiting = messages.position("wait for running task").expect("wait logged");
    let post_stop = messages.position("run post-stop hook").expect("post-stop logged");
    let done = messages.position("done").expect("done logged");
    assert!(graceful < waiting && waiting < post_stop && post_stop < done);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_signal_forces_exit_without_cleanup() {
    let (signals, source) = signal_channel();
    let messages = Messages::default();
    let runs = Arc::new(AtomicUsize::new(0));
    let post_stops = Arc::new(AtomicUsize::new(0));

    let daemon = Arc::new(
        Daemon::builder()
            .interval(ms(5))
            .signal_source(source)
            .log_sink(messages.sink())
            .post_stop({
                let post_stops = Arc::clone(&post_stops);
                move || {
                    post_stops.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build(),
    );

    let handle = {
        let daemon = Arc::clone(&daemon);
        let task = counting_task(&runs, Duration::from_secs(3));
        tokio::spawn(async move { daemon.exec(task).await })
    };
    wait_until(|| runs.load(Ordering::SeqCst) == 1).await;

    let started = Instant::now();
    assert!(signals.send(TerminationTrigger::Terminate));
    assert!(signals.send(TerminationTrigger::Terminate));

    let termination = tokio::time::timeout(DEADLINE, handle)
        .await
        .expect("daemon should stop")
        .expect("join")
        .expect("exec");

    assert_eq!(termination, Termination::Forced);
    assert_eq!(termination.exit_code(), 0);
    assert!(started.elapsed() < Duration::from_secs(1), "forced exit waited for the task");
    assert_eq!(post_stops.load(Ordering::SeqCst), 0);
    assert_eq!(daemon.shutdown_count(), 2);
    assert_eq!(daemon.state(), DaemonState::Terminated);
    assert_eq!(messages.count_containing("force exit"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn signals_outside_the_trigger_set_are_ignored() {
    let (signals, source) = signal_channel();
    let daemon = Arc::new(
        Daemon::builder()
            .interval(ms(5))
            .termination_triggers([TerminationTrigger::Hangup])
            .signal_source(source)
            .build(),
    );

    let handle = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move { daemon.exec(|| async {}).await })
    };

    assert!(signals.send(TerminationTrigger::Interrupt));
    assert!(signals.send(TerminationTrigger::Terminate));
    tokio::time::sleep(ms(30)).await;
    assert_eq!(daemon.state(), DaemonState::Running);
    assert_eq!(daemon.shutdown_count(), 0);

    assert!(signals.send(TerminationTrigger::Hangup));
    let termination = tokio::time::timeout(DEADLINE, handle)
        .await
        .expect("daemon should stop")
        .expect("join")
        .expect("exec");
    assert_eq!(termination, Termination::Graceful);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn closed_signal_source_keeps_ticking() {
    let (signals, source) = signal_channel();
    let runs = Arc::new(AtomicUsize::new(0));
    let daemon = Arc::new(Daemon::builder().interval(ms(5)).signal_source(source).build());

    let handle = {
        let daemon = Arc::clone(&daemon);
        let task = counting_task(&runs, Duration::ZERO);
        tokio::spawn(async move { daemon.exec(task).await })
    };
    drop(signals);

    wait_until(|| runs.load(Ordering::SeqCst) >= 3).await;
    assert_eq!(daemon.state(), DaemonState::Running);
    handle.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_task_does_not_stop_the_schedule() {
    let (signals, source) = signal_channel();
    let runs = Arc::new(AtomicUsize::new(0));
    let daemon = Daemon::builder().interval(ms(5)).signal_source(source).build();

    let task = {
        let runs = Arc::clone(&runs);
        move || {
            let runs = Arc::clone(&runs);
            async move {
                if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run fails");
                }
            }
        }
    };

    let stopper = {
        let runs = Arc::clone(&runs);
        tokio::spawn(async move {
            wait_until(|| runs.load(Ordering::SeqCst) >= 3).await;
            signals.send(TerminationTrigger::Interrupt);
        })
    };

    let termination = tokio::time::timeout(DEADLINE, daemon.exec(task))
        .await
        .expect("daemon should stop")
        .expect("exec");
    stopper.await.expect("stopper");
    assert_eq!(termination, Termination::Graceful);
}

struct Heartbeat {
    beats: AtomicUsize,
}

impl Runnable for Heartbeat {
    fn run(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.beats.fetch_add(1, Ordering::SeqCst);
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn default_interval_runs_as_fast_as_possible() {
    let (signals, source) = signal_channel();
    let heartbeat = Arc::new(Heartbeat {
        beats: AtomicUsize::new(0),
    });
    let daemon = Daemon::builder().signal_source(source).build();

    let task = {
        let heartbeat = Arc::clone(&heartbeat);
        move || {
            let heartbeat = Arc::clone(&heartbeat);
            async move { heartbeat.run().await }
        }
    };

    let stopper = {
        let heartbeat = Arc::clone(&heartbeat);
        tokio::spawn(async move {
            wait_until(|| heartbeat.beats.load(Ordering::SeqCst) >= 5).await;
            signals.send(TerminationTrigger::Interrupt);
        })
    };

    let termination = tokio::time::timeout(DEADLINE, daemon.exec(task))
        .await
        .expect("daemon should stop")
        .expect("exec");
    stopper.await.expect("stopper");
    assert!(termination.is_graceful());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runnable_struct_can_be_scheduled() {
    let (signals, source) = signal_channel();
    let daemon = Daemon::builder().interval(ms(5)).signal_source(source).build();

    tokio::spawn(async move {
        tokio::time::sleep(ms(40)).await;
        signals.send(TerminationTrigger::Terminate);
    });

    let termination = tokio::time::timeout(
        DEADLINE,
        daemon.exec(Heartbeat {
            beats: AtomicUsize::new(0),
        }),
    )
    .await
    .expect("daemon should stop")
    .expect("exec");
    assert_eq!(termination, Termination::Graceful);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn zero_interval_still_ticks() {
    let (signals, source) = signal_channel();
    let runs = Arc::new(AtomicUsize::new(0));
    let daemon = Daemon::builder()
        .interval(Duration::ZERO)
        .signal_source(source)
        .build();

    let stopper = {
        let runs = Arc::clone(&runs);
        tokio::spawn(async move {
            wait_until(|| runs.load(Ordering::SeqCst) >= 3).await;
            signals.send(TerminationTrigger::Interrupt);
        })
    };

    let termination = tokio::time::timeout(DEADLINE, daemon.exec(counting_task(&runs, Duration::ZERO)))
        .await
        .expect("daemon should stop")
        .expect("exec");
    stopper.await.expect("stopper");
    assert_eq!(termination, Termination::Graceful);
}
