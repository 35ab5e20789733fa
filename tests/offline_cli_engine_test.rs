mod helpers;

use std::time::Duration;

use voxbridge::application::ports::{EngineError, SpeechEngine};
use voxbridge::domain::EngineState;
use voxbridge::infrastructure::engine::{parse_cli_output, OfflineCliConfig, OfflineCliEngine};

const MODEL_DIR: &str = "sherpa-onnx-nemo-test-model-int8";
const MODEL_ID: &str = "test-model-int8";

fn cli_engine(base: &tempfile::TempDir, script_body: &str) -> OfflineCliEngine {
    helpers::write_model_dir(base.path(), MODEL_DIR);
    let script = helpers::write_script(base.path(), "fake-cli.sh", script_body);

    OfflineCliEngine::new(OfflineCliConfig {
        base_dir: base.path().to_path_buf(),
        cli_binary: script,
        provider: "cpu".to_string(),
        num_threads: 1,
        run_timeout: Duration::from_secs(5),
    })
}

// Echoes the wav path (always the last argument) the way the inference CLI
// does, then the recognized text on the next line.
const ECHO_CLI: &str = "#!/bin/sh\n\
for last; do :; done\n\
echo \"decoding ${last}\"\n\
echo \"hello from cli\"\n";

#[tokio::test]
async fn given_loaded_model_when_transcribing_then_cli_stdout_is_parsed() {
    let base = tempfile::tempdir().unwrap();
    let engine = cli_engine(&base, ECHO_CLI);
    engine.load_model(MODEL_ID).await.unwrap();

    let text = engine
        .transcribe(&helpers::fake_samples(1_600), 16_000)
        .await
        .unwrap();

    assert_eq!(text, "hello from cli");
}

#[tokio::test]
async fn given_no_model_when_transcribing_then_not_ready() {
    let base = tempfile::tempdir().unwrap();
    let engine = cli_engine(&base, ECHO_CLI);

    let result = engine.transcribe(&helpers::fake_samples(160), 16_000).await;

    assert!(matches!(result, Err(EngineError::NotReady { .. })));
}

#[tokio::test]
async fn given_cli_exits_nonzero_when_transcribing_then_stderr_is_surfaced() {
    let base = tempfile::tempdir().unwrap();
    let engine = cli_engine(&base, "#!/bin/sh\necho 'inference crashed' >&2\nexit 3\n");
    engine.load_model(MODEL_ID).await.unwrap();

    let result = engine.transcribe(&helpers::fake_samples(160), 16_000).await;

    match result {
        Err(EngineError::TranscriptionFailed { detail }) => {
            assert!(detail.contains("inference crashed"), "detail: {detail}");
        }
        other => panic!("expected TranscriptionFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn given_unknown_model_when_loading_then_not_found_and_error_state() {
    let base = tempfile::tempdir().unwrap();
    let engine = cli_engine(&base, ECHO_CLI);

    let result = engine.load_model("no-such-model").await;

    assert!(matches!(result, Err(EngineError::ModelNotFound { .. })));
    assert_eq!(engine.get_status().await.state, EngineState::Error);
}

#[tokio::test]
async fn given_loaded_model_when_getting_status_then_cli_adapter_without_subprocess_fields() {
    let base = tempfile::tempdir().unwrap();
    let engine = cli_engine(&base, ECHO_CLI);
    engine.load_model(MODEL_ID).await.unwrap();

    let status = engine.get_status().await;

    assert_eq!(status.adapter, "offline-cli");
    assert_eq!(status.state, EngineState::Loaded);
    assert!(status.pid.is_none());
    assert!(status.port.is_none());
    assert!(status.health.is_none());
}

#[test]
fn given_text_on_filename_line_when_parsing_then_it_is_kept() {
    let stdout = "some log line\n/tmp/audio.wav hello there\n";
    assert_eq!(parse_cli_output(stdout, "/tmp/audio.wav"), "hello there");
}

#[test]
fn given_text_on_following_lines_when_parsing_then_lines_are_joined() {
    let stdout = "loading model\n/tmp/audio.wav\nhello\nworld\n";
    assert_eq!(parse_cli_output(stdout, "/tmp/audio.wav"), "hello world");
}

#[test]
fn given_no_filename_when_parsing_then_last_nonempty_line_wins() {
    let stdout = "loading model\nhello from fallback\n\n";
    assert_eq!(
        parse_cli_output(stdout, "/tmp/audio.wav"),
        "hello from fallback"
    );
}
