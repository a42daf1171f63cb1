use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use vigil::{exec_once_wrap, ExecOnce};

fn main() {
    // Fails twice, then succeeds
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let warm_up = Arc::new(ExecOnce::new(move |region: &'static str| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
            return Err(format!("attempt {} for {} failed", attempt, region));
        }
        println!("🔥 cache warmed for {} on attempt {}", region, attempt);
        Ok(())
    }));

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let warm_up = Arc::clone(&warm_up);
            std::thread::spawn(move || match warm_up.exec("eu-west") {
                Ok(()) => println!("worker {} ✅ ready", worker),
                Err(e) => println!("worker {} ❌ {}", worker, e),
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }
    println!("operation ran {} times\n", attempts.load(Ordering::SeqCst));

    // One guard per wrapping, shared by every call
    let init_logging = exec_once_wrap(|level: &str| -> Result<(), String> {
        println!("📝 logging initialised at {}", level);
        Ok(())
    });
    for _ in 0..3 {
        init_logging("debug").expect("init logging");
    }
}
