// ABOUTME: Core type definitions for sandbox execution
// ABOUTME: Log entries, the execution outcome, and parsing of the worker's single message

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SandboxError};

/// Console method that produced a log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
    Trace,
    /// Any other console method (`table`, `dir`, `count`, ...), kept verbatim
    #[serde(untagged)]
    Other(String),
}

/// One intercepted console call, arguments snapshotted as JSON at call time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub args: Vec<Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, args: Vec<Value>) -> Self {
        Self { level, args }
    }
}

/// Success record: console output in call order and elapsed milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub logs: Vec<LogEntry>,
    pub duration: f64,
}

/// Failure record reported by the wrapper itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub error: String,
    pub duration: f64,
}

/// The single result produced by one worker
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(ExecutionReport),
    Failure(ExecutionFailure),
}

/// Outcome as the wrapper serializes it: `{ok, logs?, error?, duration}`
#[derive(Deserialize)]
struct OutcomeRecord {
    ok: bool,
    #[serde(default)]
    logs: Vec<LogEntry>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    duration: f64,
}

impl ExecutionOutcome {
    /// Interpret a worker message. Anything other than
    /// `{type: "response", data: <outcome>}` is rejected with the whole
    /// message attached.
    pub fn from_message(message: Value) -> Result<Self> {
        let is_response = message.get("type").and_then(Value::as_str) == Some("response");
        let record = match message.get("data") {
            Some(data) if is_response => serde_json::from_value::<OutcomeRecord>(data.clone()).ok(),
            _ => None,
        };

        let Some(record) = record else {
            return Err(SandboxError::UnexpectedMessage(message));
        };

        Ok(if record.ok {
            ExecutionOutcome::Success(ExecutionReport {
                logs: record.logs,
                duration: record.duration,
            })
        } else {
            ExecutionOutcome::Failure(ExecutionFailure {
                error: record.error.unwrap_or_else(|| "Unknown error".to_string()),
                duration: record.duration,
            })
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }
}
