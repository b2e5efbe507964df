use thiserror::Error;

/// Why an adapter call produced nothing usable.
///
/// These are absorbed per tool by the orchestrator; they never abort a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("{tool}: could not start: {message}")]
    Spawn { tool: String, message: String },

    #[error("{tool}: timed out after {duration_ms} ms")]
    Timeout { tool: String, duration_ms: u64 },

    #[error("{tool}: {reason}")]
    Failed { tool: String, reason: String },

    #[error("{tool}: unparseable output: {message}")]
    Parse { tool: String, message: String },
}

impl AdapterError {
    pub fn tool(&self) -> &str {
        match self {
            AdapterError::Spawn { tool, .. }
            | AdapterError::Timeout { tool, .. }
            | AdapterError::Failed { tool, .. }
            | AdapterError::Parse { tool, .. } => tool,
        }
    }
}
