#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use voxbridge::infrastructure::engine::ManagedEngineConfig;

/// What the stub inference server observed, in arrival order across all
/// connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubEvent {
    Binary(usize),
    Text(String),
}

/// In-process stand-in for the inference server's listening socket.
///
/// Speaks the same framed protocol: accumulates binary chunks until the
/// length from the 8-byte header is satisfied, replies with the configured
/// text, and resets utterance state on the session terminator.
pub struct StubEngineServer {
    pub port: u16,
    pub events: Arc<Mutex<Vec<StubEvent>>>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl StubEngineServer {
    pub async fn start(reply: &str) -> Self {
        Self::start_with_delay(reply, Duration::ZERO).await
    }

    pub async fn start_with_delay(reply: &str, reply_delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let events: Arc<Mutex<Vec<StubEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let reply = reply.to_string();
        let accept_events = Arc::clone(&events);
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let reply = reply.clone();
                let events = Arc::clone(&accept_events);
                tokio::spawn(async move {
                    serve_connection(stream, reply, reply_delay, events).await;
                });
            }
        });

        Self {
            port,
            events,
            accept_task,
        }
    }

    /// Stop accepting connections, simulating the inference server's port
    /// going away.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }

    pub fn events(&self) -> Vec<StubEvent> {
        self.events.lock().unwrap().clone()
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    reply: String,
    reply_delay: Duration,
    events: Arc<Mutex<Vec<StubEvent>>>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    let mut buf: Vec<u8> = Vec::new();
    let mut expected: Option<usize> = None;

    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Binary(bytes)) => {
                events
                    .lock()
                    .unwrap()
                    .push(StubEvent::Binary(bytes.len()));
                buf.extend_from_slice(&bytes);

                if expected.is_none() && buf.len() >= 8 {
                    let payload_len =
                        i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
                    expected = Some(8 + payload_len);
                }

                if expected.is_some_and(|total| buf.len() >= total) {
                    if !reply_delay.is_zero() {
                        tokio::time::sleep(reply_delay).await;
                    }
                    if ws.send(Message::Text(reply.clone().into())).await.is_err() {
                        return;
                    }
                    buf.clear();
                    expected = None;
                }
            }
            Ok(Message::Text(text)) => {
                events
                    .lock()
                    .unwrap()
                    .push(StubEvent::Text(text.as_str().to_string()));
                buf.clear();
                expected = None;
            }
            Ok(Message::Ping(payload)) => {
                let _ = ws.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(_)) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// A fake engine binary that starts and keeps running, standing in for a
/// healthy inference server process.
pub fn write_sleep_script(dir: &Path) -> PathBuf {
    write_script(dir, "fake-engine.sh", "#!/bin/sh\nsleep 600\n")
}

/// A fake engine binary that prints to stderr and dies immediately.
pub fn write_failing_script(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "failing-engine.sh",
        "#!/bin/sh\necho 'failed to load model: bad tensor shape' >&2\nexit 7\n",
    )
}

pub fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Create a model directory with the standard transducer file set.
pub fn write_model_dir(base: &Path, dir_name: &str) -> PathBuf {
    let dir = base.join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    for file in [
        "tokens.txt",
        "encoder.int8.onnx",
        "decoder.int8.onnx",
        "joiner.int8.onnx",
    ] {
        std::fs::write(dir.join(file), b"fixture").unwrap();
    }
    dir
}

/// Engine configuration with timeouts short enough for tests. Proactive
/// restarts are disabled; tests that exercise them opt back in.
pub fn test_engine_config(base_dir: &Path, binary: &Path, port: u16) -> ManagedEngineConfig {
    ManagedEngineConfig {
        base_dir: base_dir.to_path_buf(),
        server_binary: binary.to_path_buf(),
        provider: "cpu".to_string(),
        num_threads: 1,
        port,
        max_utterance_secs: 60,
        restart_interval: Duration::ZERO,
        gate_wait: Duration::from_secs(5),
        ready_timeout: Duration::from_secs(3),
        connect_timeout: Duration::from_secs(1),
        response_timeout: Duration::from_secs(3),
    }
}

/// Mono samples of a given length, values within [-1, 1].
pub fn fake_samples(count: usize) -> Vec<f32> {
    (0..count)
        .map(|i| ((i % 100) as f32 / 100.0) - 0.5)
        .collect()
}
