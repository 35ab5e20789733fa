use std::time::Instant;

use serde::Serialize;

/// In-memory health counters for one engine adapter.
///
/// Scoped to the lifetime of the currently loaded model: every (re)load
/// resets the counters to zero. No persistence.
#[derive(Debug, Default)]
pub struct HealthMetrics {
    requests: u64,
    errors: u64,
    consecutive_errors: u32,
    restarts: u32,
    last_restart: Option<Instant>,
}

impl HealthMetrics {
    /// A transcription request entered the engine.
    pub fn record_request(&mut self) {
        self.requests += 1;
    }

    /// An attempt completed successfully.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    /// An attempt failed. Recorded even when a later retry recovers.
    pub fn record_error(&mut self) {
        self.errors += 1;
        self.consecutive_errors += 1;
    }

    /// The subprocess was restarted (reactive or proactive).
    pub fn record_restart(&mut self) {
        self.restarts += 1;
        self.last_restart = Some(Instant::now());
    }

    pub fn reset(&mut self) {
        *self = HealthMetrics::default();
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            requests: self.requests,
            errors: self.errors,
            consecutive_errors: self.consecutive_errors,
            restarts: self.restarts,
            last_restart_secs_ago: self.last_restart.map(|t| t.elapsed().as_secs()),
        }
    }
}

/// Point-in-time copy of the counters, safe to serialize into status payloads.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub consecutive_errors: u32,
    pub restarts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_restart_secs_ago: Option<u64>,
}
