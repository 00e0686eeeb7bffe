//! SSE Server Example
//!
//! Serves server-sent events over a bare TCP listener, one session per
//! connection.
//!
//! - `GET /stream/<id>` streams a token every 200 ms until 50 tokens are out
//! - `GET /stop/<id>` asks the dispatcher for `<id>` to stop
//!
//! Run with: cargo run -p streamer_demos --bin sse_server [config.toml]
//! then: curl -N http://127.0.0.1:8080/stream/alpha

use std::path::Path;
use std::time::Duration;

use config_loader::ConfigLoader;
use dispatcher::StreamProcessor;
use futures::StreamExt;
use session::{SessionManager, WriterTransport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = ConfigLoader::load_or_default(std::env::args().nth(1).as_deref().map(Path::new))?;
    let manager = SessionManager::new(config);
    let _janitor = manager
        .stop_signals()
        .spawn_janitor(manager.stop_signals().ttl());

    let listener = TcpListener::bind(ADDR).await?;
    tracing::info!(addr = ADDR, "SSE server listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        let manager = manager.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(manager, socket).await {
                tracing::warn!(peer = %peer, error = %e, "Connection failed");
            }
        });
    }
}

async fn handle_connection(
    manager: SessionManager,
    socket: TcpStream,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    // drain headers
    let mut header = String::new();
    while reader.read_line(&mut header).await? > 2 {
        header.clear();
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");

    if let Some(id) = path.strip_prefix("/stop/") {
        manager.request_stop(id);
        write_half
            .write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n")
            .await?;
        return Ok(());
    }

    let Some(id) = path.strip_prefix("/stream/").filter(|id| !id.is_empty()) else {
        write_half
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await?;
        return Ok(());
    };

    write_half
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\
              Cache-Control: no-cache\r\nConnection: close\r\n\r\n",
        )
        .await?;

    let handle = manager.open_channel(id, WriterTransport::new("tcp", write_half));
    tracing::info!(session_id = id, "Stream opened");

    let tokens = tokio_stream_ticks(Duration::from_millis(200))
        .take(50)
        .map(|n| Some(format!("token {n}")));

    StreamProcessor::new(&manager, handle.clone(), id)
        .on_item_error(|err| tracing::warn!(error = %err, "Token dropped"))
        .process(tokens);

    handle.closed().await;
    tracing::info!(session_id = id, reason = ?handle.close_reason(), "Stream closed");
    Ok(())
}

fn tokio_stream_ticks(period: Duration) -> impl futures::Stream<Item = u64> + Send + 'static {
    futures::stream::unfold(0u64, move |n| async move {
        if n > 0 {
            tokio::time::sleep(period).await;
        }
        Some((n, n + 1))
    })
}
