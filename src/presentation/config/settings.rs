use std::path::PathBuf;
use std::time::Duration;

use crate::infrastructure::engine::{EngineAdapterKind, ManagedEngineConfig, OfflineCliConfig};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub adapter: EngineAdapterKind,
    pub model_dir: PathBuf,
    pub provider: String,
    pub num_threads: u32,
    pub default_model: String,
    /// Local port the managed inference server listens on.
    pub engine_port: u16,
    pub max_utterance_secs: u32,
    /// Proactive subprocess restart interval; zero disables it.
    pub restart_interval_hours: u64,
    pub ws_binary: PathBuf,
    pub cli_binary: PathBuf,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    /// Read configuration from the environment, falling back to the same
    /// defaults the inference containers ship with.
    pub fn from_env() -> Result<Self, SettingsError> {
        let adapter: EngineAdapterKind = env_or("ADAPTER_TYPE", "managed-socket")
            .parse()
            .map_err(SettingsError::Invalid)?;

        Ok(Self {
            server: ServerSettings {
                port: env_parse_or("LISTEN_PORT", 8000),
            },
            engine: EngineSettings {
                adapter,
                model_dir: PathBuf::from(env_or("MODEL_DIR", "/models")),
                provider: env_or("SHERPA_PROVIDER", "cuda"),
                num_threads: env_parse_or("SHERPA_NUM_THREADS", 4),
                default_model: env_or("DEFAULT_MODEL", "parakeet-tdt-0.6b-v2-int8"),
                engine_port: env_parse_or("WS_LOCAL_PORT", 7100),
                max_utterance_secs: env_parse_or("SHERPA_MAX_UTTERANCE", 600),
                restart_interval_hours: env_parse_or("RESTART_INTERVAL_HOURS", 12),
                ws_binary: PathBuf::from(env_or(
                    "SHERPA_WS_BIN",
                    "sherpa-onnx-offline-websocket-server",
                )),
                cli_binary: PathBuf::from(env_or("SHERPA_OFFLINE_BIN", "sherpa-onnx-offline")),
            },
        })
    }

    pub fn managed_engine_config(&self) -> ManagedEngineConfig {
        ManagedEngineConfig {
            base_dir: self.engine.model_dir.clone(),
            server_binary: self.engine.ws_binary.clone(),
            provider: self.engine.provider.clone(),
            num_threads: self.engine.num_threads,
            port: self.engine.engine_port,
            max_utterance_secs: self.engine.max_utterance_secs,
            restart_interval: Duration::from_secs(self.engine.restart_interval_hours * 3600),
            ..ManagedEngineConfig::default()
        }
    }

    pub fn offline_cli_config(&self) -> OfflineCliConfig {
        OfflineCliConfig {
            base_dir: self.engine.model_dir.clone(),
            cli_binary: self.engine.cli_binary.clone(),
            provider: self.engine.provider.clone(),
            num_threads: self.engine.num_threads,
            ..OfflineCliConfig::default()
        }
    }
}
