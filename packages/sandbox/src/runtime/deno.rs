// ABOUTME: Deno child-process sandbox runtime
// ABOUTME: Runs the staged wrapper with `deno run`, an explicit permission allowlist and a scrubbed environment

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use evald_config::{constants, defaults};

use super::{Permissions, SandboxRuntime, WorkerHandle, WorkerProcess, WorkerSpec};
use crate::error::{Result, SandboxError};
use crate::frame;

/// Launches one `deno run` process per worker.
///
/// Workers get only the permissions in their [`WorkerSpec`]; file system,
/// subprocess, FFI and system information access stay denied, prompts are
/// disabled, and the V8 heap is capped. Each worker gets a private
/// `DENO_DIR` that is removed with the worker, so the fetched wrapper and its
/// compiled output never outlive the run.
pub struct DenoRuntime {
    deno_path: PathBuf,
    max_heap_mb: u32,
    max_message_bytes: usize,
    cache_root: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl DenoRuntime {
    pub fn new(deno_path: impl Into<PathBuf>) -> Self {
        // Host secrets stay out of `Deno.env`.
        let env = constants::WORKER_ENV_PASSTHROUGH
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
            .collect();

        Self {
            deno_path: deno_path.into(),
            max_heap_mb: defaults::MAX_HEAP_MB,
            max_message_bytes: defaults::MAX_MESSAGE_BYTES,
            cache_root: None,
            env,
        }
    }

    pub fn with_max_heap_mb(mut self, max_heap_mb: u32) -> Self {
        self.max_heap_mb = max_heap_mb;
        self
    }

    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Create per-worker cache directories under `root` instead of the
    /// system temp directory
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Report the runtime version, which also checks the binary is usable
    pub async fn version(&self) -> Result<String> {
        let output = Command::new(self.program()?)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            return Err(SandboxError::LaunchFailed(format!(
                "{} --version exited with {}",
                self.deno_path.display(),
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Command-line arguments for one worker
    pub fn args(&self, spec: &WorkerSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--quiet".to_string(),
            "--no-prompt".to_string(),
            "--no-config".to_string(),
        ];
        args.extend(permission_flags(&spec.permissions));
        args.push(format!("--v8-flags=--max-old-space-size={}", self.max_heap_mb));
        args.push(spec.script_url.to_string());
        args
    }

    /// Absolute path of the binary. The worker's environment has no `PATH`,
    /// so lookup happens against the host's.
    fn program(&self) -> Result<PathBuf> {
        which::which(&self.deno_path).map_err(|e| {
            SandboxError::LaunchFailed(format!("{}: {}", self.deno_path.display(), e))
        })
    }

    fn cache_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("evald-worker-");
        let dir = match &self.cache_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| {
            SandboxError::LaunchFailed(format!("Failed to create worker cache directory: {}", e))
        })
    }

    fn command(&self, program: &Path, spec: &WorkerSpec, deno_dir: &Path) -> Command {
        let mut command = Command::new(program);
        command
            .args(self.args(spec))
            .env_clear()
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(constants::DENO_DIR, deno_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn launch_error(&self, err: std::io::Error) -> SandboxError {
        SandboxError::LaunchFailed(format!("{}: {}", self.deno_path.display(), err))
    }
}

impl Default for DenoRuntime {
    fn default() -> Self {
        Self::new(defaults::DENO_PATH)
    }
}

fn permission_flags(permissions: &Permissions) -> Vec<String> {
    let mut flags = Vec::new();
    if permissions.allow_net {
        flags.push("--allow-net".to_string());
        if !permissions.deny_net.is_empty() {
            flags.push(format!("--deny-net={}", permissions.deny_net.join(",")));
        }
    }
    if permissions.allow_env {
        flags.push("--allow-env".to_string());
    }
    flags
}

#[async_trait]
impl SandboxRuntime for DenoRuntime {
    fn name(&self) -> &'static str {
        "deno"
    }

    async fn launch(&self, spec: WorkerSpec) -> Result<WorkerHandle> {
        let program = self.program()?;
        let cache_dir = self.cache_dir()?;

        let mut child = self
            .command(&program, &spec, cache_dir.path())
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SandboxError::LaunchFailed("Failed to capture worker stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            SandboxError::LaunchFailed("Failed to capture worker stderr".to_string())
        })?;

        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(frame::pump_stdout(
            stdout,
            spec.frame_token.marker(),
            self.max_message_bytes,
            tx,
            id,
        ));
        tokio::spawn(frame::pump_stderr(stderr, id));

        info!(worker_id = %id, pid = ?child.id(), "Launched sandbox worker");

        let process = DenoProcess {
            id,
            child,
            cache_dir: Some(cache_dir),
        };
        Ok(WorkerHandle::new(id, rx, Box::new(process)))
    }
}

struct DenoProcess {
    id: Uuid,
    // Dropped before `cache_dir`, so the kill is issued first.
    child: Child,
    cache_dir: Option<TempDir>,
}

impl DenoProcess {
    fn remove_cache_dir(&mut self) -> Result<()> {
        if let Some(dir) = self.cache_dir.take() {
            if let Err(e) = dir.close() {
                warn!(worker_id = %self.id, error = %e, "Failed to remove worker cache directory");
                return Err(e.into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerProcess for DenoProcess {
    async fn terminate(&mut self) -> Result<()> {
        if let Some(status) = self.child.try_wait()? {
            debug!(worker_id = %self.id, %status, "Worker already exited");
            return self.remove_cache_dir();
        }

        if let Err(e) = self.child.kill().await {
            warn!(worker_id = %self.id, error = %e, "Failed to kill worker");
            return Err(e.into());
        }
        debug!(worker_id = %self.id, "Worker killed");
        self.remove_cache_dir()
    }
}
