use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{AvailableModel, EngineState, HealthSnapshot};

/// Port for speech-to-text engines.
///
/// Any STT backend (managed subprocess, one-shot CLI) must implement this
/// interface to be usable by the HTTP layer.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Transcribe mono float32 samples to text. Empty string means no
    /// speech was detected.
    async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, EngineError>;

    /// Load (or switch to) a specific model by id.
    async fn load_model(&self, model_id: &str) -> Result<(), EngineError>;

    /// Unload the currently loaded model, freeing resources. Safe to call
    /// when nothing is loaded.
    async fn unload_model(&self);

    /// Current engine status snapshot.
    async fn get_status(&self) -> EngineStatus;

    /// Models available for loading under the configured base directory.
    async fn list_available(&self) -> Vec<AvailableModel>;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model '{model_id}' not found in {base_dir} (searched: {model_id}/, sherpa-onnx-nemo-{model_id}/)")]
    ModelNotFound { model_id: String, base_dir: String },
    #[error("model '{model_id}' is incomplete: {detail}")]
    ModelIncomplete { model_id: String, detail: String },
    #[error("engine startup failed: {detail}")]
    StartupFailed { detail: String },
    #[error("engine not ready (state={state}); load a model first")]
    NotReady { state: EngineState },
    #[error("lock acquisition timed out after {waited_secs}s; another request may be stuck")]
    LockTimeout { waited_secs: u64 },
    #[error("transcription failed: {detail}")]
    TranscriptionFailed { detail: String },
}

/// Status payload returned by `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub state: EngineState,
    pub adapter: &'static str,
    pub provider: String,
    pub model_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub connection_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
