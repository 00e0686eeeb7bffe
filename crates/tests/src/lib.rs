//! # Integration Tests
//!
//! End-to-end tests across the workspace crates.
//!
//! - Wire format snapshots
//! - Producer to response body through real transports
//! - Registry consistency under concurrent sessions

#[cfg(test)]
mod contract_tests {
    use contracts::DataFrame;

    #[test]
    fn test_sse_wire_format() {
        assert_eq!(
            DataFrame::data("first\nsecond").to_sse(),
            "event: data\ndata: first\ndata: second\n\n"
        );
    }

    #[test]
    fn test_end_frame_shape() {
        let end = DataFrame::end();
        assert!(end.is_terminal());
        assert_eq!(end, DataFrame::end());

        let body: serde_json::Value = serde_json::from_str(end.data_str()).unwrap();
        assert_eq!(body["end"], true);
        assert!(body["timestamp"].is_i64());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::{spawn_dispatch, Dispatcher, StreamProcessor, Termination};
    use futures::stream::{self, StreamExt};
    use session::{ChannelTransport, RecordingTransport, SessionManager, WriterTransport};
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    async fn collect_body(mut rx: mpsc::Receiver<Bytes>) -> String {
        let mut body = String::new();
        while let Some(chunk) = rx.recv().await {
            body.push_str(std::str::from_utf8(&chunk).unwrap());
        }
        body
    }

    /// Producer -> Dispatcher -> ChannelTransport -> response body
    #[tokio::test]
    async fn test_e2e_channel_body() {
        let manager = SessionManager::default();
        let (transport, rx) = ChannelTransport::pair(16);
        let handle = manager.open_channel("chat-1", transport);

        spawn_dispatch(
            &manager,
            handle,
            "chat-1",
            stream::iter(vec![Some("hello"), None, Some("world")]),
        );

        let body = tokio::time::timeout(Duration::from_secs(2), collect_body(rx))
            .await
            .expect("body never finished");

        assert!(body.starts_with(
            "event: data\ndata: hello\n\nevent: data\ndata: world\n\nevent: end\ndata: {\"end\":true"
        ));
        assert!(body.ends_with("}\n\n"));
        assert!(!manager.exists("chat-1"));
    }

    /// Stop request mid-stream through a byte writer
    #[tokio::test]
    async fn test_e2e_stop_over_writer() {
        let manager = SessionManager::default();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let handle = manager.open_channel("chat-2", WriterTransport::new("duplex", server));

        let stopper = manager.clone();
        let producer = stream::iter(0..).map(move |n: u32| {
            if n == 3 {
                stopper.request_stop("chat-2");
            }
            Some(format!("token-{n}"))
        });

        let summary = Dispatcher::new(handle, "chat-2", manager.stop_signals().clone())
            .run(producer)
            .await;

        let mut body = String::new();
        let mut client = client;
        client.read_to_string(&mut body).await.unwrap();

        assert_eq!(summary.termination, Termination::Stopped);
        assert_eq!(summary.frames_sent, 4);
        assert_eq!(body.matches("event: data").count(), 4);
        assert_eq!(body.matches("event: end").count(), 1);
        assert!(manager.stop_signals().is_empty());
    }

    /// A client that goes away ends an endless dispatch and cleans up
    #[tokio::test]
    async fn test_e2e_client_disconnect() {
        let manager = SessionManager::default();
        let (transport, mut rx) = ChannelTransport::pair(1);
        let handle = manager.open_channel("chat-3", transport);

        let task = spawn_dispatch(&manager, handle.clone(), "chat-3", stream::repeat(Some("tick")));

        assert!(rx.recv().await.is_some());
        drop(rx);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("dispatch kept running after disconnect")
            .unwrap();

        assert!(handle.state().is_closed());
        assert!(!manager.exists("chat-3"));
    }

    /// The channel timer ends a producer that never runs dry, and the
    /// upstream feeding it is aborted
    #[tokio::test(start_paused = true)]
    async fn test_e2e_timeout_aborts_upstream() {
        let manager = SessionManager::default();
        let (transport, frames) = RecordingTransport::new("mem");
        let handle =
            manager.open_channel_with_timeout("slow", transport, Duration::from_millis(50));

        let (tx, rx) = mpsc::channel::<Option<String>>(4);
        let upstream_done = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&upstream_done);
        let upstream = tokio::spawn(async move {
            for n in 0u64.. {
                if tx.send(Some(n.to_string())).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            done.store(true, Ordering::SeqCst);
        });
        manager.attach_upstream("slow", upstream.abort_handle());

        let producer =
            stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        let summary = Dispatcher::new(handle.clone(), "slow", manager.stop_signals().clone())
            .run(producer)
            .await;

        assert_eq!(summary.termination, Termination::ChannelClosed);
        assert_eq!(handle.close_reason().map(|e| e.reason()), Some("timeout"));
        assert_eq!(frames.end_count(), 0);
        assert!(upstream.await.unwrap_err().is_cancelled());
        assert!(!upstream_done.load(Ordering::SeqCst));
        assert!(!manager.exists("slow"));
    }

    /// Buffered processor: two full flushes and a partial one
    #[tokio::test]
    async fn test_e2e_buffered_processor() {
        let manager = SessionManager::default();
        let (transport, frames) = RecordingTransport::new("mem");
        let handle = manager.open_channel("batch", transport);

        StreamProcessor::new(&manager, handle, "batch")
            .with_buffer(10)
            .process(stream::iter((0..5).map(|_| Some("abcde"))))
            .await
            .unwrap();

        assert_eq!(frames.data(), vec!["abcdeabcde", "abcdeabcde", "abcde"]);
        assert_eq!(frames.events().last().map(String::as_str), Some("end"));
    }

    /// Many concurrent sessions, half stopped, registry ends empty
    #[tokio::test]
    async fn test_e2e_registry_consistency() {
        let manager = SessionManager::default();
        let mut tasks = Vec::new();
        let mut recordings = Vec::new();

        for i in 0..32 {
            let id = format!("s-{i}");
            let (transport, frames) = RecordingTransport::new(id.clone());
            let handle = manager.open_channel(id.clone(), transport);
            if i % 2 == 0 {
                manager.request_stop(id.clone());
            }
            tasks.push(spawn_dispatch(
                &manager,
                handle,
                id,
                stream::iter((0..20).map(|n| Some(n.to_string()))),
            ));
            recordings.push((i, frames));
        }
        assert_eq!(manager.registry().len(), 32);

        for task in tasks {
            task.await.unwrap();
        }

        assert!(manager.registry().is_empty());
        for (i, frames) in recordings {
            assert_eq!(frames.end_count(), 1);
            let expected = if i % 2 == 0 { 0 } else { 20 };
            assert_eq!(frames.data().len(), expected, "session {i}");
        }
    }

    /// Loaded configuration flows into manager-driven dispatch
    #[tokio::test]
    async fn test_e2e_config_driven_manager() {
        let config = ConfigLoader::load_from_str(
            r#"
            [session]
            default_timeout_ms = 250
            stop_signal_ttl_secs = 2

            [dispatch]
            end_timestamp = "live"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();
        let manager = SessionManager::new(config);

        assert_eq!(manager.stop_signals().ttl(), Duration::from_secs(2));

        let (transport, frames) = RecordingTransport::new("mem");
        let handle = manager.open_channel("cfg", transport);
        assert_eq!(handle.timeout(), Some(Duration::from_millis(250)));

        spawn_dispatch(&manager, handle.clone(), "cfg", stream::iter(vec![Some("x")]))
            .await
            .unwrap();

        let end = frames.last().unwrap();
        assert!(end.is_terminal());
        let stamp: serde_json::Value = serde_json::from_str(end.data_str()).unwrap();
        assert!(stamp["timestamp"].as_i64().unwrap() >= contracts::now_millis() - 5_000);
    }

    /// One-shot send on a detached channel
    #[tokio::test]
    async fn test_e2e_send_once() {
        let manager = SessionManager::default();
        let (transport, rx) = ChannelTransport::pair(4);

        let handle = manager.send_once(transport, "only").await;
        let body = collect_body(rx).await;

        assert_eq!(body, "event: data\ndata: only\n\n");
        assert!(handle.state().is_closed());
        assert!(manager.registry().is_empty());
    }
}
