use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Payload writes never exceed this many bytes per message.
pub const CHUNK_SIZE: usize = 10_240;

/// Sent after each exchange so the server resets per-utterance state.
pub const SESSION_TERMINATOR: &str = "Done";

/// Literal reply meaning no speech was detected.
pub const EMPTY_SENTINEL: &str = "<EMPTY>";

/// Readiness probes use a short open timeout so polling stays responsive.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("connect to engine on port {port} failed: {detail}")]
    ConnectFailed { port: u16, detail: String },
    #[error("connect to engine on port {port} timed out after {timeout_secs}s")]
    ConnectTimeout { port: u16, timeout_secs: u64 },
    #[error("send to engine failed: {0}")]
    SendFailed(String),
    #[error("receive from engine failed: {0}")]
    RecvFailed(String),
    #[error("engine closed the connection before responding")]
    ClosedEarly,
    #[error("no response from engine within {timeout_secs}s")]
    ResponseTimeout { timeout_secs: u64 },
}

/// One open connection to the engine subprocess's listening port.
///
/// The managed adapter keeps at most one of these alive across requests and
/// recreates it when the liveness probe fails.
pub struct WireConnection {
    ws: WsStream,
    port: u16,
}

impl WireConnection {
    pub async fn open(port: u16, connect_timeout: Duration) -> Result<Self, WireError> {
        let url = format!("ws://127.0.0.1:{port}");
        let (ws, _) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| WireError::ConnectTimeout {
                port,
                timeout_secs: connect_timeout.as_secs(),
            })?
            .map_err(|e| WireError::ConnectFailed {
                port,
                detail: e.to_string(),
            })?;
        Ok(Self { ws, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Cheap liveness check on an existing connection.
    pub async fn probe(&mut self) -> Result<(), WireError> {
        self.ws
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(|e| WireError::SendFailed(e.to_string()))
    }

    /// Run one framed exchange: header + chunked samples out, one response
    /// message in, then the session terminator.
    pub async fn transcribe(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        response_timeout: Duration,
    ) -> Result<String, WireError> {
        let frame = encode_frame(samples, sample_rate);
        for chunk in frame.chunks(CHUNK_SIZE) {
            self.ws
                .send(Message::Binary(Bytes::copy_from_slice(chunk)))
                .await
                .map_err(|e| WireError::SendFailed(e.to_string()))?;
        }

        let raw = tokio::time::timeout(response_timeout, self.read_response())
            .await
            .map_err(|_| WireError::ResponseTimeout {
                timeout_secs: response_timeout.as_secs(),
            })??;

        self.ws
            .send(Message::Text(SESSION_TERMINATOR.into()))
            .await
            .map_err(|e| WireError::SendFailed(e.to_string()))?;

        Ok(parse_response(&raw))
    }

    async fn read_response(&mut self) -> Result<String, WireError> {
        loop {
            match self.ws.next().await {
                None => return Err(WireError::ClosedEarly),
                Some(Err(e)) => return Err(WireError::RecvFailed(e.to_string())),
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_string()),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(Message::Close(_))) => return Err(WireError::ClosedEarly),
                Some(Ok(_)) => continue,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// 8-byte little-endian header (sample rate, payload byte length) followed
/// by the raw f32 samples.
pub fn encode_frame(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let payload_len = samples.len() * 4;
    let mut buf = Vec::with_capacity(8 + payload_len);
    buf.extend_from_slice(&(sample_rate as i32).to_le_bytes());
    buf.extend_from_slice(&(payload_len as i32).to_le_bytes());
    for sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    buf
}

/// Interpret a response as JSON with a `text` field, falling back to plain
/// text. The empty-audio sentinel normalizes to an empty string. Both engine
/// transports (structured and bare-text) are supported this way.
pub fn parse_response(raw: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        if let Some(text) = value.get("text").and_then(|t| t.as_str()) {
            return text.trim().to_string();
        }
    }

    let text = raw.trim();
    if text == EMPTY_SENTINEL {
        String::new()
    } else {
        text.to_string()
    }
}

/// Open a throwaway connection, send the terminator and close. Used by the
/// supervisor's readiness polling: success means the engine is accepting
/// and answering protocol traffic.
pub async fn probe_handshake(port: u16) -> Result<(), WireError> {
    let mut conn = WireConnection::open(port, HANDSHAKE_TIMEOUT).await?;
    conn.ws
        .send(Message::Text(SESSION_TERMINATOR.into()))
        .await
        .map_err(|e| WireError::SendFailed(e.to_string()))?;
    conn.close().await;
    Ok(())
}
