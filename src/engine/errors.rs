use thiserror::Error;

/// Library-internal error taxonomy. The CLI layer converts these to
/// `anyhow::Error` at its entry points; everything below the CLI boundary
/// deals in `EngineError` so the store can persist a faithful `error`
/// record without re-parsing a message string.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown worker: {0}")]
    UnknownWorker(String),

    #[error("transport error calling {worker}/{tool}: {message}")]
    TransportError {
        worker: String,
        tool: String,
        message: String,
    },

    #[error("protocol error calling {worker}/{tool}: {message}")]
    ProtocolError {
        worker: String,
        tool: String,
        message: String,
    },

    #[error("tool error from {worker}/{tool}: [{code}] {message}")]
    ToolError {
        worker: String,
        tool: String,
        code: i64,
        message: String,
    },

    #[error("store error: {0}")]
    StoreError(#[from] sqlx::Error),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unknown replay point: worker '{0}' not found in quest plan")]
    UnknownReplayPoint(String),
}

impl EngineError {
    /// Worker name this error occurred against, if any — used to populate
    /// the quest-level `error.worker` field without re-parsing the message.
    pub fn worker(&self) -> Option<&str> {
        match self {
            EngineError::UnknownWorker(w) => Some(w),
            EngineError::TransportError { worker, .. }
            | EngineError::ProtocolError { worker, .. }
            | EngineError::ToolError { worker, .. } => Some(worker),
            _ => None,
        }
    }

    pub fn tool(&self) -> Option<&str> {
        match self {
            EngineError::TransportError { tool, .. }
            | EngineError::ProtocolError { tool, .. }
            | EngineError::ToolError { tool, .. } => Some(tool),
            _ => None,
        }
    }

    /// Whether the retry loop should try again after this error, given the
    /// set of tool-error codes the caller has declared non-retryable.
    pub fn is_retryable(&self, non_retryable_codes: &std::collections::HashSet<i64>) -> bool {
        match self {
            EngineError::TransportError { .. } | EngineError::ProtocolError { .. } => true,
            EngineError::ToolError { code, .. } => !non_retryable_codes.contains(code),
            EngineError::UnknownWorker(_)
            | EngineError::StoreError(_)
            | EngineError::InvalidState(_)
            | EngineError::UnknownReplayPoint(_) => false,
        }
    }
}
