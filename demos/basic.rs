use chrono::Local;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use vigil::{tracing_sink, Daemon};

static COUNTER: AtomicU32 = AtomicU32::new(0);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("🚀 Heartbeat every second. Press Ctrl+C to stop, twice to force.\n");

    let sink = tracing_sink();
    let daemon = Daemon::builder()
        .interval(Duration::from_secs(1))
        .log_sink(move |msg: &str| sink(msg))
        .post_stop(|| {
            println!("✅ {} heartbeats sent", COUNTER.load(Ordering::SeqCst));
        })
        .build();

    let error = daemon
        .exec_until_exit(|| async {
            let count = COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
            let now = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            println!("[{}] 💓 heartbeat #{}", now, count);
        })
        .await;

    eprintln!("daemon failed to start: {error}");
    std::process::exit(1);
}
