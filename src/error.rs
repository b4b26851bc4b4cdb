//! Engine-wide error taxonomy.
//!
//! Guard, action, and execution-bound failures each get their own variant so
//! the executor can decide what gets retried (nothing but actions, and those
//! only inside the action runner) and what lands in the workflow's durable
//! error log.

use std::time::Duration;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid workflow configuration. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A guard raised instead of returning a verdict. Blocks the transition
    /// and propagates unretried.
    #[error("guard evaluation failed for transition '{transition}'")]
    Guard {
        transition: String,
        #[source]
        source: anyhow::Error,
    },

    /// An action exhausted its retry budget. Wraps the last cause.
    #[error("action '{action}' failed after {attempts} attempts")]
    Action {
        action: String,
        place: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The transition-application cap was hit, usually a misconfigured cycle.
    #[error("workflow exceeded maximum iterations ({0})")]
    IterationLimit(u32),

    /// The wall-clock budget for this execute/resume call ran out.
    #[error("workflow execution exceeded maximum time of {0:?}")]
    Timeout(Duration),

    /// Resume target does not exist in the store.
    #[error("workflow with id '{0}' not found")]
    NotFound(String),

    /// Resume attempted on a workflow that already ran to completion.
    #[error("workflow '{0}' is already completed")]
    AlreadyCompleted(String),

    /// Resume attempted on a cancelled workflow.
    #[error("workflow '{0}' has been cancelled")]
    Cancelled(String),

    /// Persistence failure, including lock acquisition. Never retried.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// Stable machine-readable code recorded on the workflow's error log.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Guard { .. } => "guard_failed",
            Self::Action { .. } => "action_failed",
            Self::IterationLimit(_) => "iteration_limit",
            Self::Timeout(_) => "timeout",
            Self::NotFound(_) => "not_found",
            Self::AlreadyCompleted(_) | Self::Cancelled(_) => "invalid_resume",
            Self::Store(_) => "store",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
