use std::str::FromStr;
use std::sync::Arc;

use crate::application::ports::SpeechEngine;

use super::managed_engine::{ManagedEngineConfig, ManagedSocketEngine};
use super::offline_cli_engine::{OfflineCliConfig, OfflineCliEngine};

/// The closed set of engine adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAdapterKind {
    /// One-shot CLI invocation per request.
    OfflineCli,
    /// Managed inference server subprocess with a persistent connection.
    ManagedSocket,
}

impl FromStr for EngineAdapterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subprocess" | "offline-cli" => Ok(EngineAdapterKind::OfflineCli),
            "managed-websocket" | "managed-socket" => Ok(EngineAdapterKind::ManagedSocket),
            other => Err(format!(
                "unknown adapter type '{other}'; valid options: subprocess, managed-socket"
            )),
        }
    }
}

pub struct EngineFactory;

impl EngineFactory {
    pub fn create(
        kind: EngineAdapterKind,
        managed: ManagedEngineConfig,
        cli: OfflineCliConfig,
    ) -> Arc<dyn SpeechEngine> {
        match kind {
            EngineAdapterKind::ManagedSocket => Arc::new(ManagedSocketEngine::new(managed)),
            EngineAdapterKind::OfflineCli => Arc::new(OfflineCliEngine::new(cli)),
        }
    }
}
