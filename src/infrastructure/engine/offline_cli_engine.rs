use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::application::ports::{EngineError, EngineStatus, SpeechEngine};
use crate::domain::{AvailableModel, EngineState, ModelFiles, ModelIdentity};

use super::model_layout;

const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct OfflineCliConfig {
    pub base_dir: PathBuf,
    pub cli_binary: PathBuf,
    pub provider: String,
    pub num_threads: u32,
    pub run_timeout: Duration,
}

impl Default for OfflineCliConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/models"),
            cli_binary: PathBuf::from("sherpa-onnx-offline"),
            provider: "cuda".to_string(),
            num_threads: 4,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

struct CliInner {
    state: EngineState,
    identity: Option<ModelIdentity>,
    last_error: Option<String>,
}

/// Stateless engine adapter: one short-lived CLI process per request.
///
/// Samples are written to a temporary WAV file, the inference CLI runs to
/// completion, and its stdout is parsed for the transcription. No persistent
/// connection and no restart logic; `load_model` only resolves files.
pub struct OfflineCliEngine {
    config: OfflineCliConfig,
    inner: Mutex<CliInner>,
}

impl OfflineCliEngine {
    pub fn new(config: OfflineCliConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CliInner {
                state: EngineState::Unloaded,
                identity: None,
                last_error: None,
            }),
        }
    }

    async fn run_cli(&self, files: &ModelFiles, wav_path: &Path) -> Result<String, EngineError> {
        let mut command = Command::new(&self.config.cli_binary);
        command
            .arg(format!("--encoder={}", files.encoder.display()))
            .arg(format!("--decoder={}", files.decoder.display()))
            .arg(format!("--joiner={}", files.joiner.display()))
            .arg(format!("--tokens={}", files.tokens.display()))
            .arg(format!("--provider={}", self.config.provider))
            .arg(format!("--num-threads={}", self.config.num_threads))
            .arg("--model-type=transducer")
            .arg(wav_path);

        let output = tokio::time::timeout(self.config.run_timeout, command.output())
            .await
            .map_err(|_| EngineError::TranscriptionFailed {
                detail: format!(
                    "inference CLI timed out after {}s",
                    self.config.run_timeout.as_secs()
                ),
            })?
            .map_err(|e| EngineError::TranscriptionFailed {
                detail: format!("failed to run '{}': {e}", self.config.cli_binary.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::TranscriptionFailed {
                detail: format!(
                    "inference CLI exited with code {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_cli_output(&stdout, &wav_path.display().to_string()))
    }
}

#[async_trait]
impl SpeechEngine for OfflineCliEngine {
    async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, EngineError> {
        let files = {
            let inner = self.inner.lock().await;
            match (&inner.state, inner.identity.as_ref()) {
                (EngineState::Loaded, Some(identity)) => identity.files.clone(),
                _ => return Err(EngineError::NotReady { state: inner.state }),
            }
        };

        let wav = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .map_err(|e| EngineError::TranscriptionFailed {
                detail: format!("temp wav: {e}"),
            })?;
        write_wav_f32(wav.path(), samples, sample_rate)?;

        let text = self.run_cli(&files, wav.path()).await?;
        tracing::debug!(chars = text.len(), "CLI transcription completed");
        Ok(text)
    }

    async fn load_model(&self, model_id: &str) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;

        let already_loaded = inner.state == EngineState::Loaded
            && inner
                .identity
                .as_ref()
                .is_some_and(|identity| identity.model_id == model_id);
        if already_loaded {
            tracing::info!(model_id, "model already loaded");
            return Ok(());
        }

        inner.state = EngineState::Loading;
        tracing::info!(model_id, "loading model");

        match model_layout::resolve(&self.config.base_dir, model_id) {
            Ok(identity) => {
                tracing::info!(
                    model_id,
                    directory = %identity.directory.display(),
                    provider = %self.config.provider,
                    "model loaded"
                );
                inner.identity = Some(identity);
                inner.state = EngineState::Loaded;
                inner.last_error = None;
                Ok(())
            }
            Err(e) => {
                inner.state = EngineState::Error;
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn unload_model(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(identity) = inner.identity.take() {
            tracing::info!(model_id = %identity.model_id, "unloading model");
        }
        inner.state = EngineState::Unloaded;
    }

    async fn get_status(&self) -> EngineStatus {
        let inner = self.inner.lock().await;
        EngineStatus {
            model_id: inner.identity.as_ref().map(|i| i.model_id.clone()),
            state: inner.state,
            adapter: "offline-cli",
            provider: self.config.provider.clone(),
            model_dir: self.config.base_dir.display().to_string(),
            model_path: inner
                .identity
                .as_ref()
                .map(|i| i.directory.display().to_string()),
            port: None,
            pid: None,
            connection_open: false,
            uptime_secs: None,
            health: None,
            error: inner.last_error.clone(),
        }
    }

    async fn list_available(&self) -> Vec<AvailableModel> {
        model_layout::list_models(&self.config.base_dir)
    }
}

/// The CLI echoes the input filename before the recognized text. Everything
/// after the filename line (including text on the same line) is the
/// transcription; when the filename never appears, fall back to the last
/// non-empty line.
pub fn parse_cli_output(stdout: &str, wav_path: &str) -> String {
    let mut text_lines: Vec<&str> = Vec::new();
    let mut found_filename = false;

    for line in stdout.lines() {
        if !found_filename {
            if let Some(idx) = line.find(wav_path) {
                found_filename = true;
                let after = line[idx + wav_path.len()..].trim();
                if !after.is_empty() {
                    text_lines.push(after);
                }
            }
            continue;
        }
        text_lines.push(line);
    }

    if text_lines.is_empty() {
        if let Some(last) = stdout.lines().rev().find(|l| !l.trim().is_empty()) {
            text_lines.push(last);
        }
    }

    text_lines.join(" ").trim().to_string()
}

fn write_wav_f32(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), EngineError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let to_engine_error = |e: hound::Error| EngineError::TranscriptionFailed {
        detail: format!("write wav: {e}"),
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(to_engine_error)?;
    for sample in samples {
        writer.write_sample(*sample).map_err(to_engine_error)?;
    }
    writer.finalize().map_err(to_engine_error)
}
