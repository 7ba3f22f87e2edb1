// ABOUTME: Sandbox runtime trait and worker handle
// ABOUTME: Abstracts the isolation primitive so the orchestrator only sees launch, one message, terminate

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use url::Url;
use uuid::Uuid;

use crate::error::{Result, SandboxError};
use crate::frame::FrameToken;

pub mod deno;

pub use deno::DenoRuntime;

/// Capabilities granted to a worker. Anything not listed here is denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permissions {
    pub allow_net: bool,
    pub allow_env: bool,
    /// Hosts (optionally `host:port`) refused even when network access is on
    pub deny_net: Vec<String>,
}

impl Permissions {
    /// Network and environment access, nothing else
    pub fn minimal() -> Self {
        Self {
            allow_net: true,
            allow_env: true,
            deny_net: Vec::new(),
        }
    }

    pub fn with_denied_hosts(mut self, hosts: impl IntoIterator<Item = String>) -> Self {
        self.deny_net.extend(hosts);
        self
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::minimal()
    }
}

/// What to run and with which capabilities
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Location the worker loads the staged wrapper from
    pub script_url: Url,
    pub permissions: Permissions,
    /// Token the staged wrapper marks its result with
    pub frame_token: FrameToken,
}

/// Control side of a running worker
#[async_trait]
pub trait WorkerProcess: Send {
    /// Forcefully stop the worker and reap it. Calling it on a worker that
    /// already exited is not an error.
    async fn terminate(&mut self) -> Result<()>;
}

/// One isolated execution context, bound to one staged script.
///
/// The handle yields at most one message. Dropping it must stop the worker,
/// so implementations of [`WorkerProcess`] kill on drop.
pub struct WorkerHandle {
    id: Uuid,
    inbox: Option<oneshot::Receiver<Result<Value>>>,
    process: Box<dyn WorkerProcess>,
}

impl WorkerHandle {
    pub fn new(
        id: Uuid,
        inbox: oneshot::Receiver<Result<Value>>,
        process: Box<dyn WorkerProcess>,
    ) -> Self {
        Self {
            id,
            inbox: Some(inbox),
            process,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the worker's message. A closed channel, or a second call,
    /// reports [`SandboxError::WorkerExited`].
    pub async fn recv(&mut self) -> Result<Value> {
        let Some(inbox) = self.inbox.as_mut() else {
            return Err(SandboxError::WorkerExited);
        };
        let received = inbox.await;
        self.inbox = None;
        received.map_err(|_| SandboxError::WorkerExited)?
    }

    pub async fn terminate(&mut self) -> Result<()> {
        self.inbox = None;
        self.process.terminate().await
    }
}

/// Isolation primitive capable of launching workers
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Start a worker for `spec`. The returned handle owns the worker.
    async fn launch(&self, spec: WorkerSpec) -> Result<WorkerHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopProcess;

    #[async_trait]
    impl WorkerProcess for NoopProcess {
        async fn terminate(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_minimal_permissions_grant_only_net_and_env() {
        let permissions = Permissions::minimal();
        assert!(permissions.allow_net);
        assert!(permissions.allow_env);
        assert!(permissions.deny_net.is_empty());
    }

    #[tokio::test]
    async fn test_handle_yields_one_message() {
        let (tx, rx) = oneshot::channel();
        let mut handle = WorkerHandle::new(Uuid::new_v4(), rx, Box::new(NoopProcess));
        tx.send(Ok(serde_json::json!({"n": 1}))).unwrap();

        assert!(handle.recv().await.is_ok());
        assert!(matches!(handle.recv().await, Err(SandboxError::WorkerExited)));
    }

    #[tokio::test]
    async fn test_closed_inbox_means_worker_exited() {
        let (tx, rx) = oneshot::channel::<Result<Value>>();
        let mut handle = WorkerHandle::new(Uuid::new_v4(), rx, Box::new(NoopProcess));
        drop(tx);

        assert!(matches!(handle.recv().await, Err(SandboxError::WorkerExited)));
    }
}
