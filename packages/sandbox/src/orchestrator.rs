// ABOUTME: Drives one sandbox worker from launch to termination
// ABOUTME: Bounds the wait with a timeout and always terminates the worker, whatever the outcome

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use evald_config::defaults;

use crate::error::{Result, SandboxError};
use crate::frame::FrameToken;
use crate::runtime::{Permissions, SandboxRuntime, WorkerSpec};
use crate::types::ExecutionOutcome;

/// Lifecycle of one worker as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    AwaitingResult,
    Resolved,
    TimedOut,
    Terminated,
}

impl WorkerState {
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        match (self, next) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Created, AwaitingResult) => true,
            (AwaitingResult, Resolved) | (AwaitingResult, TimedOut) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Created => "created",
            WorkerState::AwaitingResult => "awaiting_result",
            WorkerState::Resolved => "resolved",
            WorkerState::TimedOut => "timed_out",
            WorkerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

struct Lifecycle {
    worker_id: Option<Uuid>,
    state: WorkerState,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            worker_id: None,
            state: WorkerState::Created,
        }
    }

    fn advance(&mut self, next: WorkerState) {
        if !self.state.can_transition_to(next) {
            warn!(worker_id = ?self.worker_id, from = %self.state, to = %next, "Ignoring invalid worker state transition");
            return;
        }
        debug!(worker_id = ?self.worker_id, from = %self.state, to = %next, "Worker state changed");
        self.state = next;
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bound on the wait for the worker's message
    pub timeout: Duration,
    pub permissions: Permissions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(defaults::EXECUTION_TIMEOUT_MS),
            permissions: Permissions::minimal(),
        }
    }
}

/// Runs staged scripts, one fresh worker per call.
///
/// Calls are independent; any number may run at once.
pub struct Orchestrator {
    runtime: Arc<dyn SandboxRuntime>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, config: OrchestratorConfig) -> Self {
        Self { runtime, config }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub fn runtime_name(&self) -> &'static str {
        self.runtime.name()
    }

    /// Launch a worker on `script_url` and wait for its one message, a line
    /// marked with `frame_token`.
    ///
    /// The worker is terminated before this returns, on every path.
    pub async fn execute(
        &self,
        script_url: Url,
        frame_token: FrameToken,
    ) -> Result<ExecutionOutcome> {
        let mut lifecycle = Lifecycle::new();
        let started = Instant::now();

        let spec = WorkerSpec {
            script_url,
            permissions: self.config.permissions.clone(),
            frame_token,
        };

        let mut handle = match self.runtime.launch(spec).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(runtime = self.runtime.name(), error = %e, "Failed to launch sandbox worker");
                lifecycle.advance(WorkerState::Terminated);
                return Err(e);
            }
        };
        lifecycle.worker_id = Some(handle.id());
        lifecycle.advance(WorkerState::AwaitingResult);

        let received = tokio::time::timeout(self.config.timeout, handle.recv()).await;
        lifecycle.advance(match received {
            Ok(_) => WorkerState::Resolved,
            Err(_) => WorkerState::TimedOut,
        });

        if let Err(e) = handle.terminate().await {
            error!(worker_id = %handle.id(), error = %e, "Failed to terminate sandbox worker");
        }
        lifecycle.advance(WorkerState::Terminated);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let result = match received {
            Ok(Ok(message)) => ExecutionOutcome::from_message(message),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SandboxError::Timeout {
                millis: self.config.timeout.as_millis() as u64,
            }),
        };

        match &result {
            Ok(outcome) => info!(
                worker_id = %handle.id(),
                success = outcome.is_success(),
                elapsed_ms,
                "Sandbox execution finished"
            ),
            Err(e) => warn!(worker_id = %handle.id(), error = %e, elapsed_ms, "Sandbox execution failed"),
        }

        result
    }
}
