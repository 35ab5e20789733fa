use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::domain::ModelFiles;

use super::wire;

/// How much of the child's stderr is surfaced when startup fails.
const STDERR_CAPTURE_BYTES: usize = 4096;

const READY_POLL_INITIAL: Duration = Duration::from_millis(500);
const READY_POLL_CAP: Duration = Duration::from_secs(3);
const GRACEFUL_STOP_WAIT: Duration = Duration::from_secs(5);
const FORCE_KILL_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to spawn '{binary}': {source}")]
    SpawnFailed {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine process exited during startup (code={code:?}): {stderr}")]
    ExitedDuringStartup { code: Option<i32>, stderr: String },
    #[error("engine did not become ready within {waited_secs}s")]
    NeverReady { waited_secs: u64 },
    #[error("i/o error while supervising engine process: {0}")]
    Io(#[from] std::io::Error),
}

/// Command line for the external inference server. Flag names are a
/// compatibility contract with the sherpa-onnx binary.
pub struct LaunchSpec<'a> {
    pub binary: &'a Path,
    pub port: u16,
    pub provider: &'a str,
    pub num_threads: u32,
    pub max_utterance_secs: u32,
    pub files: &'a ModelFiles,
}

/// Owns one external inference server process. Exactly one live handle per
/// adapter; explicitly stopped on unload, restart and shutdown.
pub struct EngineProcess {
    child: Child,
    pid: Option<u32>,
    port: u16,
    started: Instant,
}

impl EngineProcess {
    pub fn launch(spec: &LaunchSpec<'_>) -> Result<Self, SupervisorError> {
        let mut command = Command::new(spec.binary);
        command
            .arg(format!("--port={}", spec.port))
            .arg(format!("--provider={}", spec.provider))
            .arg(format!("--encoder={}", spec.files.encoder.display()))
            .arg(format!("--decoder={}", spec.files.decoder.display()))
            .arg(format!("--joiner={}", spec.files.joiner.display()))
            .arg(format!("--tokens={}", spec.files.tokens.display()))
            .arg(format!("--num-threads={}", spec.num_threads))
            .arg(format!("--max-utterance-length={}", spec.max_utterance_secs))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| SupervisorError::SpawnFailed {
            binary: spec.binary.display().to_string(),
            source,
        })?;
        let pid = child.id();

        tracing::info!(
            binary = %spec.binary.display(),
            port = spec.port,
            provider = spec.provider,
            pid,
            "engine subprocess started"
        );

        Ok(Self {
            child,
            pid,
            port: spec.port,
            started: Instant::now(),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// True once the child has an exit status.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Poll the engine port with a protocol handshake at exponential backoff
    /// until it answers, the child exits, or the timeout elapses.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), SupervisorError> {
        let deadline = Instant::now() + timeout;
        let mut delay = READY_POLL_INITIAL;

        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait()? {
                let stderr = self.read_stderr_tail().await;
                tracing::error!(
                    pid = self.pid,
                    code = status.code(),
                    stderr = %stderr,
                    "engine process exited during startup"
                );
                return Err(SupervisorError::ExitedDuringStartup {
                    code: status.code(),
                    stderr,
                });
            }

            if wire::probe_handshake(self.port).await.is_ok() {
                tracing::info!(port = self.port, pid = self.pid, "engine ready");
                return Ok(());
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 3 / 2).min(READY_POLL_CAP);
        }

        Err(SupervisorError::NeverReady {
            waited_secs: timeout.as_secs(),
        })
    }

    async fn read_stderr_tail(&mut self) -> String {
        let Some(mut stderr) = self.child.stderr.take() else {
            return String::new();
        };
        let mut buf = vec![0u8; STDERR_CAPTURE_BYTES];
        match tokio::time::timeout(Duration::from_secs(1), stderr.read(&mut buf)).await {
            Ok(Ok(n)) => String::from_utf8_lossy(&buf[..n]).trim().to_string(),
            _ => String::new(),
        }
    }

    /// Escalating stop: graceful signal, bounded wait, then forced kill.
    /// A process that is already gone counts as success.
    pub async fn stop(mut self) {
        if self.has_exited() {
            tracing::debug!(pid = self.pid, "engine process already exited");
            return;
        }

        if let Some(pid) = self.pid {
            tracing::info!(pid, "sending SIGTERM to engine process");
            match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) => {}
                Err(Errno::ESRCH) => return,
                Err(e) => tracing::warn!(pid, error = %e, "SIGTERM failed"),
            }

            match tokio::time::timeout(GRACEFUL_STOP_WAIT, self.child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::info!(pid, code = status.code(), "engine process exited gracefully");
                    return;
                }
                Ok(Err(e)) => tracing::warn!(pid, error = %e, "wait after SIGTERM failed"),
                Err(_) => tracing::warn!(pid, "engine process ignored SIGTERM, killing"),
            }
        }

        let _ = self.child.start_kill();
        let _ = tokio::time::timeout(FORCE_KILL_WAIT, self.child.wait()).await;
    }
}
