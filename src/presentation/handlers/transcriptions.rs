use std::io::Cursor;
use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::application::ports::EngineError;
use crate::presentation::state::AppState;

/// OpenAI-compatible transcription endpoint.
///
/// Accepts multipart form-data with a WAV `file` field and an optional
/// `response_format` (`verbose_json` default, `json`, or plain `text`).
pub async fn transcriptions_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let started = Instant::now();

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut response_format = "verbose_json".to_string();
    let mut language = "en".to_string();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                match name.as_str() {
                    "file" => match field.bytes().await {
                        Ok(bytes) => file_bytes = Some(bytes.to_vec()),
                        Err(e) => return bad_request(&format!("failed to read file field: {e}")),
                    },
                    "response_format" => {
                        if let Ok(value) = field.text().await {
                            response_format = value;
                        }
                    }
                    "language" => {
                        if let Ok(value) = field.text().await {
                            language = value;
                        }
                    }
                    _ => {}
                }
            }
            Ok(None) => break,
            Err(e) => return bad_request(&format!("malformed multipart body: {e}")),
        }
    }

    let Some(bytes) = file_bytes else {
        return bad_request("missing 'file' field");
    };

    let (samples, sample_rate) = match decode_wav(&bytes) {
        Ok(decoded) => decoded,
        Err(e) => return bad_request(&format!("failed to decode WAV upload: {e}")),
    };

    let audio_secs = samples.len() as f64 / sample_rate as f64;

    match state.engine.transcribe(&samples, sample_rate).await {
        Ok(text) => {
            let processing_secs = started.elapsed().as_secs_f64();
            let rtf = if audio_secs > 0.0 {
                processing_secs / audio_secs
            } else {
                0.0
            };
            tracing::info!(
                audio_secs,
                processing_secs,
                rtf,
                chars = text.len(),
                "transcription completed"
            );
            shape_response(&response_format, &language, audio_secs, text)
        }
        Err(e) => engine_error_response(e),
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn engine_error_response(error: EngineError) -> Response {
    let status = match &error {
        EngineError::ModelNotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::LockTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::NotReady { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(error = %error, "transcription request failed");
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn shape_response(format: &str, language: &str, audio_secs: f64, text: String) -> Response {
    let duration = (audio_secs * 100.0).round() / 100.0;
    match format {
        "json" => (StatusCode::OK, Json(json!({ "text": text }))).into_response(),
        "text" => (StatusCode::OK, text).into_response(),
        _ => (
            StatusCode::OK,
            Json(json!({
                "text": text,
                "language": language,
                "duration": duration,
                "segments": [{
                    "id": 0,
                    "start": 0.0,
                    "end": duration,
                    "text": text,
                    "no_speech_prob": 0.0,
                }],
            })),
        )
            .into_response(),
    }
}

/// Decode a WAV upload into mono f32 samples. Multi-channel input keeps the
/// first channel only.
fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32), String> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| e.to_string());
    let mut reader = reader?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
    };

    let samples = interleaved.iter().step_by(channels).copied().collect();
    Ok((samples, spec.sample_rate))
}
