use chrono::Local;
use std::time::Duration;
use vigil::Daemon;

/// Ticks every 200ms while each run takes 1s, so most ticks are skipped.
/// Press Ctrl+C during a run to watch shutdown wait for it.
#[tokio::main]
async fn main() {
    let daemon = Daemon::builder()
        .interval(Duration::from_millis(200))
        .log_sink(|msg: &str| {
            let now = Local::now().format("%H:%M:%S%.3f");
            println!("[{}] 📋 {}", now, msg);
        })
        .post_stop(|| println!("🧹 cleanup after the last run"))
        .build();

    let error = daemon
        .exec_until_exit(|| async {
            let now = Local::now().format("%H:%M:%S%.3f");
            println!("[{}] 🐢 slow run started", now);
            tokio::time::sleep(Duration::from_secs(1)).await;
            let now = Local::now().format("%H:%M:%S%.3f");
            println!("[{}] 🐢 slow run finished", now);
        })
        .await;

    eprintln!("daemon failed to start: {error}");
    std::process::exit(1);
}
