use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::ports::{EngineError, EngineStatus, SpeechEngine};
use crate::domain::{AvailableModel, EngineState, HealthMetrics, ModelFiles, ModelIdentity};

use super::model_layout;
use super::supervisor::{EngineProcess, LaunchSpec};
use super::wire::{WireConnection, WireError};

const DEFAULT_GATE_WAIT: Duration = Duration::from_secs(130);
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Clone)]
pub struct ManagedEngineConfig {
    pub base_dir: PathBuf,
    pub server_binary: PathBuf,
    pub provider: String,
    pub num_threads: u32,
    pub port: u16,
    pub max_utterance_secs: u32,
    /// Subprocess uptime after which the next transcribe restarts it first.
    /// Zero disables proactive restarts.
    pub restart_interval: Duration,
    pub gate_wait: Duration,
    pub ready_timeout: Duration,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl Default for ManagedEngineConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/models"),
            server_binary: PathBuf::from("sherpa-onnx-offline-websocket-server"),
            provider: "cuda".to_string(),
            num_threads: 4,
            port: 7100,
            max_utterance_secs: 600,
            restart_interval: DEFAULT_RESTART_INTERVAL,
            gate_wait: DEFAULT_GATE_WAIT,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

struct EngineInner {
    state: EngineState,
    identity: Option<ModelIdentity>,
    process: Option<EngineProcess>,
    connection: Option<WireConnection>,
    metrics: HealthMetrics,
    last_error: Option<String>,
}

/// Engine adapter that owns the inference server as a managed subprocess.
///
/// Model switching restarts the subprocess with the new model's file paths.
/// Transcription reuses one persistent connection, recovers from transient
/// failures with a single restart-and-retry, and proactively restarts the
/// subprocess once its uptime crosses the configured threshold.
///
/// All state-mutating operations are serialized through one mutex gate with
/// a bounded wait, so a model switch can never interleave with an in-flight
/// transcription.
pub struct ManagedSocketEngine {
    config: ManagedEngineConfig,
    inner: Mutex<EngineInner>,
}

impl ManagedSocketEngine {
    pub fn new(config: ManagedEngineConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(EngineInner {
                state: EngineState::Unloaded,
                identity: None,
                process: None,
                connection: None,
                metrics: HealthMetrics::default(),
                last_error: None,
            }),
        }
    }

    async fn lock_gate(&self) -> Result<tokio::sync::MutexGuard<'_, EngineInner>, EngineError> {
        tokio::time::timeout(self.config.gate_wait, self.inner.lock())
            .await
            .map_err(|_| EngineError::LockTimeout {
                waited_secs: self.config.gate_wait.as_secs(),
            })
    }

    /// Start the subprocess for the given model files and wait for it to
    /// answer protocol handshakes. On readiness failure the process is
    /// force-stopped before the error is returned.
    async fn start_process(&self, files: &ModelFiles) -> Result<EngineProcess, EngineError> {
        let spec = LaunchSpec {
            binary: &self.config.server_binary,
            port: self.config.port,
            provider: &self.config.provider,
            num_threads: self.config.num_threads,
            max_utterance_secs: self.config.max_utterance_secs,
            files,
        };

        let mut process = EngineProcess::launch(&spec).map_err(|e| EngineError::StartupFailed {
            detail: e.to_string(),
        })?;

        if let Err(e) = process.wait_ready(self.config.ready_timeout).await {
            let pid = process
                .pid()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            process.stop().await;
            return Err(EngineError::StartupFailed {
                detail: format!("{e} (pid={pid})"),
            });
        }

        Ok(process)
    }

    /// Restart with the current model configuration. Used by both the
    /// reactive (failed attempt) and proactive (uptime threshold) paths.
    /// A failed restart moves the adapter to the error state.
    async fn restart(&self, inner: &mut EngineInner) -> Result<(), EngineError> {
        let Some(identity) = inner.identity.clone() else {
            return Err(EngineError::NotReady { state: inner.state });
        };

        if let Some(connection) = inner.connection.take() {
            connection.close().await;
        }
        if let Some(process) = inner.process.take() {
            process.stop().await;
        }

        tracing::info!(model_id = %identity.model_id, "restarting engine subprocess");

        match self.start_process(&identity.files).await {
            Ok(process) => {
                inner.process = Some(process);
                inner.metrics.record_restart();
                Ok(())
            }
            Err(e) => {
                inner.state = EngineState::Error;
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// One transcription attempt over the persistent connection, validating
    /// it with a liveness probe first and reopening it when the probe fails.
    /// The connection is closed and discarded on any protocol error.
    async fn attempt(
        &self,
        inner: &mut EngineInner,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<String, WireError> {
        let mut connection = match inner.connection.take() {
            Some(mut connection) => {
                if connection.probe().await.is_ok() {
                    connection
                } else {
                    tracing::debug!("persistent connection failed liveness probe, reopening");
                    connection.close().await;
                    WireConnection::open(self.config.port, self.config.connect_timeout).await?
                }
            }
            None => WireConnection::open(self.config.port, self.config.connect_timeout).await?,
        };

        match connection
            .transcribe(samples, sample_rate, self.config.response_timeout)
            .await
        {
            Ok(text) => {
                inner.connection = Some(connection);
                Ok(text)
            }
            Err(e) => {
                connection.close().await;
                Err(e)
            }
        }
    }

    /// Close the connection, stop the subprocess and clear the identity.
    async fn teardown(&self, inner: &mut EngineInner) {
        if let Some(identity) = inner.identity.take() {
            tracing::info!(model_id = %identity.model_id, "unloading model");
        }
        if let Some(connection) = inner.connection.take() {
            connection.close().await;
        }
        if let Some(process) = inner.process.take() {
            process.stop().await;
        }
        inner.state = EngineState::Unloaded;
    }
}

#[async_trait]
impl SpeechEngine for ManagedSocketEngine {
    async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, EngineError> {
        let mut guard = self.lock_gate().await?;
        let inner = &mut *guard;

        if inner.state != EngineState::Loaded || inner.process.is_none() {
            return Err(EngineError::NotReady { state: inner.state });
        }

        if !self.config.restart_interval.is_zero() {
            let stale = inner
                .process
                .as_ref()
                .is_some_and(|p| p.started().elapsed() >= self.config.restart_interval);
            if stale {
                tracing::info!(
                    interval_secs = self.config.restart_interval.as_secs(),
                    "proactive restart threshold reached"
                );
                self.restart(inner).await?;
            }
        }

        inner.metrics.record_request();

        // A subprocess that died between requests is the first failure; skip
        // straight to the restart instead of probing a dead port.
        let process_exited = inner.process.as_mut().is_none_or(|p| p.has_exited());
        let first_error = if process_exited {
            tracing::warn!("engine subprocess exited between requests");
            "engine subprocess exited between requests".to_string()
        } else {
            match self.attempt(inner, samples, sample_rate).await {
                Ok(text) => {
                    inner.metrics.record_success();
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "transcription attempt failed, restarting engine");
                    e.to_string()
                }
            }
        };

        inner.metrics.record_error();

        if let Err(restart_error) = self.restart(inner).await {
            return Err(EngineError::TranscriptionFailed {
                detail: format!("{first_error}; engine restart failed: {restart_error}"),
            });
        }

        match self.attempt(inner, samples, sample_rate).await {
            Ok(text) => {
                inner.metrics.record_success();
                tracing::info!("transcription recovered after engine restart");
                Ok(text)
            }
            Err(retry_error) => {
                inner.metrics.record_error();
                Err(EngineError::TranscriptionFailed {
                    detail: format!(
                        "first attempt: {first_error}; retry after restart: {retry_error}"
                    ),
                })
            }
        }
    }

    async fn load_model(&self, model_id: &str) -> Result<(), EngineError> {
        let mut guard = self.lock_gate().await?;
        let inner = &mut *guard;

        let already_loaded = inner.state == EngineState::Loaded
            && inner
                .identity
                .as_ref()
                .is_some_and(|identity| identity.model_id == model_id);
        if already_loaded {
            tracing::info!(model_id, "model already loaded");
            return Ok(());
        }

        if inner.identity.is_some() {
            self.teardown(inner).await;
        }

        inner.state = EngineState::Loading;
        tracing::info!(model_id, "loading model");

        let identity = match model_layout::resolve(&self.config.base_dir, model_id) {
            Ok(identity) => identity,
            Err(e) => {
                inner.state = EngineState::Error;
                inner.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        inner.metrics.reset();

        match self.start_process(&identity.files).await {
            Ok(process) => {
                tracing::info!(
                    model_id,
                    pid = process.pid(),
                    port = self.config.port,
                    provider = %self.config.provider,
                    "model loaded"
                );
                inner.process = Some(process);
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
        let mut guard = self.inner.lock().await;
        self.teardown(&mut guard).await;
    }

    async fn get_status(&self) -> EngineStatus {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let mut state = inner.state;
        let mut error = inner.last_error.clone();
        let mut pid = None;
        let mut uptime_secs = None;

        if let Some(process) = inner.process.as_mut() {
            if process.has_exited() {
                // Read-time consistency check only; the stored state is not
                // mutated here.
                if state == EngineState::Loaded {
                    state = EngineState::Error;
                    error = Some("engine subprocess exited unexpectedly".to_string());
                }
            } else {
                pid = process.pid();
                uptime_secs = Some(process.started().elapsed().as_secs());
            }
        }

        EngineStatus {
            model_id: inner.identity.as_ref().map(|i| i.model_id.clone()),
            state,
            adapter: "managed-socket",
            provider: self.config.provider.clone(),
            model_dir: self.config.base_dir.display().to_string(),
            model_path: inner
                .identity
                .as_ref()
                .map(|i| i.directory.display().to_string()),
            port: Some(self.config.port),
            pid,
            connection_open: inner.connection.is_some(),
            uptime_secs,
            health: Some(inner.metrics.snapshot()),
            error,
        }
    }

    async fn list_available(&self) -> Vec<AvailableModel> {
        model_layout::list_models(&self.config.base_dir)
    }
}
