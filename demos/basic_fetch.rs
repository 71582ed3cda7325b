//! Basic fetch example
//!
//! This example demonstrates the core functionality of fetch-runner:
//! - Building a configuration
//! - Creating a runner instance
//! - Subscribing to events
//! - Submitting a fetch task and waiting for its terminal state

use std::time::Duration;

use fetch_runner::config::{Config, RunnerConfig};
use fetch_runner::{Event, SubmitOptions, TaskRunner, TaskState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    // Build configuration
    let config = Config {
        runner: RunnerConfig {
            max_concurrent_tasks: 2,
            default_timeout: Duration::from_secs(10),
            ..Default::default()
        },
        ..Default::default()
    };

    // Create runner instance
    let runner = TaskRunner::new(config).await?;

    // Subscribe to events
    let mut events = runner.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Queued { id, key } => {
                    println!("✓ Queued task #{}: {}", id, key);
                }
                Event::Started { id, .. } => {
                    println!("→ Task #{} running", id);
                }
                Event::Succeeded { id, value, .. } => {
                    println!("✓ Task #{} loaded {}", id, value);
                }
                Event::Failed { id, kind, error, .. } => {
                    println!("✗ Task #{} failed ({:?}): {}", id, kind, error);
                }
                Event::Cancelled { id, .. } => {
                    println!("– Task #{} cancelled", id);
                }
                other => {
                    println!("  {:?}", other);
                }
            }
        }
    });

    // Submit a fetch; the URL doubles as the de-duplication key
    let url = "https://example.com/image.png";
    let handle = runner
        .submit(url, url, SubmitOptions::default())
        .await?;

    // Wait for the terminal state
    match handle.await_terminal().await {
        TaskState::Succeeded { value } => {
            println!("Image URI ready for display: {value}");
        }
        TaskState::Failed { kind, message } => {
            println!("Could not load image ({kind:?}): {message}");
        }
        TaskState::Cancelled => {
            println!("Load was cancelled");
        }
        other => {
            println!("Unexpected non-terminal state: {other:?}");
        }
    }

    runner.shutdown().await?;
    Ok(())
}
