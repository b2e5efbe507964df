use camino::Utf8PathBuf;

/// Unrecoverable audit pipeline failures. Individual tool failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("phase '{phase}' lists tool '{tool}' but no adapter is registered for it")]
    MissingAdapter { phase: String, tool: String },

    #[error("could not build worker pool: {0}")]
    WorkerPool(String),
}

/// Failures that end a fix session before or after its attempts.
///
/// Failures of individual fixes are recorded in the report instead.
#[derive(Debug, thiserror::Error)]
pub enum FixSessionError {
    #[error("another fix session holds {path}")]
    SessionLocked { path: Utf8PathBuf },

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Why project validation rejected a set of fixes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} check failed: {reason}")]
pub struct ValidationFailure {
    pub stage: ValidationStage,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Syntax,
    Smoke,
    Tests,
}

impl std::fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValidationStage::Syntax => "syntax",
            ValidationStage::Smoke => "smoke",
            ValidationStage::Tests => "tests",
        })
    }
}
