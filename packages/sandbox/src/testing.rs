// ABOUTME: Scripted sandbox runtime for tests
// ABOUTME: Lets callers decide per launch whether a worker answers, stalls, exits or fails to start

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{Result, SandboxError};
use crate::runtime::{SandboxRuntime, WorkerHandle, WorkerProcess, WorkerSpec};
use crate::types::ExecutionOutcome;

/// What a scripted worker does once launched
#[derive(Debug, Clone)]
pub enum ScriptedBehavior {
    /// Post this message immediately
    Respond(Value),
    /// Post this message after the delay
    Delayed(Duration, Value),
    /// Never post, stay alive until terminated
    Silent,
    /// Exit without posting
    Exit,
    /// Fail to start
    LaunchError(String),
}

type Script = dyn Fn(&WorkerSpec) -> ScriptedBehavior + Send + Sync;

#[derive(Default)]
struct Counters {
    launched: AtomicUsize,
    terminated: AtomicUsize,
}

pub struct ScriptedRuntime {
    script: Box<Script>,
    counters: Arc<Counters>,
}

impl ScriptedRuntime {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&WorkerSpec) -> ScriptedBehavior + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Workers successfully launched
    pub fn launched(&self) -> usize {
        self.counters.launched.load(Ordering::SeqCst)
    }

    /// Workers terminated, counted once per worker
    pub fn terminated(&self) -> usize {
        self.counters.terminated.load(Ordering::SeqCst)
    }

    /// Workers launched but not yet terminated
    pub fn live(&self) -> usize {
        self.launched().saturating_sub(self.terminated())
    }
}

#[async_trait]
impl SandboxRuntime for ScriptedRuntime {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn launch(&self, spec: WorkerSpec) -> Result<WorkerHandle> {
        let (tx, rx) = oneshot::channel();
        let mut keepalive = None;

        match (self.script)(&spec) {
            ScriptedBehavior::LaunchError(reason) => return Err(SandboxError::LaunchFailed(reason)),
            ScriptedBehavior::Respond(message) => {
                let _ = tx.send(Ok(message));
            }
            ScriptedBehavior::Delayed(delay, message) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Ok(message));
                });
            }
            ScriptedBehavior::Silent => keepalive = Some(tx),
            ScriptedBehavior::Exit => drop(tx),
        }
        self.counters.launched.fetch_add(1, Ordering::SeqCst);

        let process = ScriptedProcess {
            counters: self.counters.clone(),
            keepalive,
            terminated: false,
        };
        Ok(WorkerHandle::new(Uuid::new_v4(), rx, Box::new(process)))
    }
}

struct ScriptedProcess {
    counters: Arc<Counters>,
    keepalive: Option<oneshot::Sender<Result<Value>>>,
    terminated: bool,
}

#[async_trait]
impl WorkerProcess for ScriptedProcess {
    async fn terminate(&mut self) -> Result<()> {
        self.keepalive = None;
        if !self.terminated {
            self.terminated = true;
            self.counters.terminated.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// The message a worker would post for `outcome`
pub fn response_message(outcome: &ExecutionOutcome) -> Value {
    let data = match outcome {
        ExecutionOutcome::Success(report) => json!({
            "ok": true,
            "logs": report.logs,
            "duration": report.duration,
        }),
        ExecutionOutcome::Failure(failure) => json!({
            "ok": false,
            "error": failure.error,
            "duration": failure.duration,
        }),
    };
    json!({ "type": "response", "data": data })
}
