use chrono::Local;
use vigil::{load_toml_config, tracing_sink, DaemonBuilder, ExecOnce};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    // Override with e.g. APP__DAEMON__INTERVAL=500ms
    let config = load_toml_config(concat!(env!("CARGO_MANIFEST_DIR"), "/../demos/config/daemon.toml"))?;
    let app_name = config.get_string("app.name").unwrap_or_else(|_| "worker".to_string());

    let connect = ExecOnce::new(|name: String| -> Result<(), std::io::Error> {
        tracing::info!(%name, "connecting to upstream");
        Ok(())
    });

    let sink = tracing_sink();
    let daemon = DaemonBuilder::from_config(&config)?
        .pre_start(move || connect.exec(app_name.clone()))
        .log_sink(move |msg: &str| sink(msg))
        .post_stop(|| tracing::info!("disconnected"))
        .build();

    let termination = daemon
        .exec(|| async {
            let now = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            println!("[{}] 🔄 polling upstream", now);
        })
        .await?;

    println!("stopped: {:?}", termination);
    termination.exit()
}
