mod helpers;

use std::time::Duration;

use helpers::{StubEngineServer, StubEvent};
use voxbridge::infrastructure::engine::wire::{
    self, encode_frame, parse_response, WireConnection, WireError, CHUNK_SIZE,
};

#[test]
fn given_samples_when_encoding_frame_then_header_carries_rate_and_byte_length() {
    let samples = helpers::fake_samples(16_000);

    let frame = encode_frame(&samples, 16_000);

    assert_eq!(frame.len(), 8 + 64_000);
    assert_eq!(i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]), 16_000);
    assert_eq!(i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]), 64_000);
}

#[test]
fn given_json_reply_when_parsing_then_text_field_wins() {
    assert_eq!(parse_response(r#"{"text": "  hello world "}"#), "hello world");
}

#[test]
fn given_plain_text_reply_when_parsing_then_it_is_trimmed() {
    assert_eq!(parse_response("  hello world \n"), "hello world");
}

#[test]
fn given_empty_sentinel_when_parsing_then_empty_string() {
    assert_eq!(parse_response("<EMPTY>"), "");
    assert_eq!(parse_response(" <EMPTY> "), "");
}

#[tokio::test]
async fn given_one_second_of_audio_when_transcribing_then_frame_is_chunked_and_terminated() {
    let stub = StubEngineServer::start("hello").await;
    let samples = helpers::fake_samples(16_000);

    let mut conn = WireConnection::open(stub.port, Duration::from_secs(1))
        .await
        .unwrap();
    let text = conn
        .transcribe(&samples, 16_000, Duration::from_secs(3))
        .await
        .unwrap();
    conn.close().await;

    assert_eq!(text, "hello");

    let events = stub.events();
    let binary_sizes: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            StubEvent::Binary(n) => Some(*n),
            _ => None,
        })
        .collect();

    // 8 header bytes + 64000 payload bytes split at the chunk ceiling.
    assert_eq!(binary_sizes.len(), 7);
    assert!(binary_sizes.iter().all(|n| *n <= CHUNK_SIZE));
    assert_eq!(binary_sizes.iter().sum::<usize>(), 8 + 64_000);

    // Terminator arrives after the full frame.
    assert_eq!(events.last(), Some(&StubEvent::Text("Done".to_string())));
}

#[tokio::test]
async fn given_slow_engine_when_transcribing_then_response_timeout() {
    let stub = StubEngineServer::start_with_delay("late", Duration::from_secs(5)).await;
    let samples = helpers::fake_samples(160);

    let mut conn = WireConnection::open(stub.port, Duration::from_secs(1))
        .await
        .unwrap();
    let result = conn
        .transcribe(&samples, 16_000, Duration::from_millis(200))
        .await;

    assert!(matches!(result, Err(WireError::ResponseTimeout { .. })));
}

#[tokio::test]
async fn given_listening_stub_when_probing_handshake_then_ok() {
    let stub = StubEngineServer::start("unused").await;
    assert!(wire::probe_handshake(stub.port).await.is_ok());
}

#[tokio::test]
async fn given_no_listener_when_probing_handshake_then_error() {
    let stub = StubEngineServer::start("unused").await;
    let port = stub.port;
    stub.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(wire::probe_handshake(port).await.is_err());
}
