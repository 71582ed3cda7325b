//! Multiple event subscribers example
//!
//! This example demonstrates how multiple parts of your application
//! can independently subscribe to task events, and how the status loop
//! reports a summary the same way a long-running notification service
//! would.

use fetch_runner::{Config, Event, StatusLoop, SubmitOptions, TaskRunner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let runner = TaskRunner::new(Config::default()).await?;

    // UI subscriber - renders terminal states
    let mut ui_events = runner.subscribe();
    tokio::spawn(async move {
        println!("[UI] Starting UI event subscriber");
        while let Ok(event) = ui_events.recv().await {
            match event {
                Event::Succeeded { key, value, .. } => {
                    println!("[UI] {} -> show image {}", key, value);
                }
                Event::Failed { key, error, .. } => {
                    println!("[UI] {} -> show error: {}", key, error);
                }
                Event::ConnectivityChanged { reachable } => {
                    println!(
                        "[UI] input field {}",
                        if reachable { "enabled" } else { "disabled" }
                    );
                }
                _ => {}
            }
        }
    });

    // Audit subscriber - logs every event
    let mut audit_events = runner.subscribe();
    tokio::spawn(async move {
        println!("[audit] Starting audit event subscriber");
        while let Ok(event) = audit_events.recv().await {
            println!("[audit] {:?}", event);
        }
    });

    // Status loop - periodic summary, the way a foreground service
    // posts a recurring notification
    let status_loop = StatusLoop::with_log_reporter(runner.clone());
    tokio::spawn(async move {
        status_loop.run().await;
    });

    // Submit a couple of fetches under different keys
    for url in [
        "https://example.com/a.png",
        "https://example.com/b.png",
    ] {
        let handle = runner.submit(url, url, SubmitOptions::default()).await?;
        let state = handle.await_terminal().await;
        println!("{url} finished as {state:?}");
    }

    println!("summary: {:?}", runner.summary());

    runner.shutdown().await?;
    Ok(())
}
