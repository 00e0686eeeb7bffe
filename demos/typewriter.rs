//! Typewriter Example
//!
//! Types a line to stdout one base64-encoded character at a time, as an SSE
//! client would receive it.
//!
//! Run with: cargo run -p streamer_demos --bin typewriter -- "hello, 世界"

use std::time::Duration;

use session::{SessionManager, WriterTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hello, world".to_string());

    let manager = SessionManager::default();
    let handle = manager.open_channel("typewriter", WriterTransport::new("stdout", tokio::io::stdout()));

    manager
        .send_typewriter("typewriter", &text, Some(Duration::from_millis(40)))
        .await?;
    manager.send_end_and_complete(&handle).await;
    handle.closed().await;

    tracing::info!(chars = text.chars().count(), "Done");
    Ok(())
}
