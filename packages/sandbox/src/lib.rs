// ABOUTME: Sandbox execution for untrusted scripts
// ABOUTME: Generates the wrapper, launches an isolated worker and collects its single result

pub mod error;
pub mod frame;
pub mod orchestrator;
pub mod runtime;
pub mod types;
pub mod wrapper;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types
pub use error::{Result, SandboxError};
pub use frame::{FrameToken, FRAME_PREFIX};
pub use orchestrator::{Orchestrator, OrchestratorConfig, WorkerState};
pub use runtime::{
    DenoRuntime, Permissions, SandboxRuntime, WorkerHandle, WorkerProcess, WorkerSpec,
};
pub use types::{ExecutionFailure, ExecutionOutcome, ExecutionReport, LogEntry, LogLevel};
pub use wrapper::{generate_wrapper, WRAPPER_CONTENT_TYPE};
