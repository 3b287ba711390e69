//! Error taxonomy of the engine. None of these are fatal: the session logs them
//! and carries on without the failed side effect.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Input that is not legal in the current phase. Ignored by the session.
    #[error("{input} ignored while {phase}")]
    InvalidTransition { phase: String, input: String },

    /// Synthesis or noise could not reach an output device.
    #[error("audio backend unavailable: {0}")]
    AudioBackendUnavailable(String),

    /// The high-score store failed to load or save.
    #[error("high-score persistence failed: {0}")]
    PersistenceFailure(String),

    /// Sandbox difficulty that is not finite or lies below the sandbox floor.
    #[error("invalid difficulty {0}")]
    InvalidDifficulty(f64),
}

impl CoreError {
    pub fn invalid(phase: impl std::fmt::Debug, input: impl std::fmt::Debug) -> Self {
        CoreError::InvalidTransition {
            phase: format!("{:?}", phase),
            input: format!("{:?}", input),
        }
    }
}
