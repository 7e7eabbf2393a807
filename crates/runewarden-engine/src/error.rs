use std::time::Duration;

/// Errors surfaced by steps, actions and the interpreter
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Interaction did not register, the step may retry within its bound
    #[error("step {step} failed transiently: {reason}")]
    TransientStepFailure { step: &'static str, reason: String },

    /// Attempt bound exceeded, aborts the owning chain
    #[error("step {step} failed after {attempts} attempt(s)")]
    TerminalStepFailure { step: &'static str, attempts: u32 },

    /// Interpreter iteration or time budget exceeded
    #[error("chain stuck after {iterations} iteration(s) in {elapsed:?} (last action: {last_action}, last step: {last_step})")]
    Stuck {
        iterations: u64,
        elapsed: Duration,
        last_action: String,
        last_step: String,
    },

    /// Client crashed or failed to launch/join
    #[error("client process failure: {0}")]
    ProcessFailure(String),

    #[error("input arbitration for session {session} did not resolve within {waited:?}")]
    ArbitrationTimeout { session: String, waited: Duration },

    /// Content logic rejected the current world state
    #[error("action {action} failed: {reason}")]
    Action { action: String, reason: String },

    /// Stop was requested and observed at a suspension point
    #[error("execution cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn transient(step: &'static str, reason: impl Into<String>) -> Self {
        Self::TransientStepFailure {
            step,
            reason: reason.into(),
        }
    }

    pub fn action(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Action {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Errors a step absorbs locally by retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStepFailure { .. })
    }

    /// Errors after which the session cannot simply skip to its next run
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, Self::ProcessFailure(_) | Self::Cancelled)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
