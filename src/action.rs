//! Place-entry actions: bounded-retry execution and dispatch.
//!
//! Entering a place runs that place's registered actions in order. Each
//! action gets up to `retry_count` attempts with a fixed delay in between;
//! the first success wins, and exhausting the budget aborts the whole run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::state::{WorkflowErrorRecord, WorkflowState};

/// Text-bearing result produced by an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    content: String,
}

impl ActionResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Caller-supplied logic executed when a workflow enters a place.
///
/// Handlers receive the opaque agent handle and may read and mutate the
/// workflow state. How the result is produced is out of scope for the engine.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        agent: &dyn Agent,
        state: &mut WorkflowState,
    ) -> anyhow::Result<ActionResult>;
}

/// A named action with its retry policy.
///
/// `parallel` is accepted from configuration but has no effect: actions at
/// the same place always run sequentially in registration order.
#[derive(Clone)]
pub struct Action {
    name: String,
    handler: Arc<dyn ActionHandler>,
    retry_count: u32,
    retry_delay: Duration,
    parallel: bool,
}

impl Action {
    pub fn new(name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            parallel: false,
        }
    }

    /// Total number of attempts before the action is considered failed.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Fixed delay between attempts. No backoff, no jitter.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("retry_count", &self.retry_count)
            .field("retry_delay", &self.retry_delay)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

/// Executes one action with bounded retry and fixed delay.
#[derive(Debug, Default)]
pub struct ActionRunner;

impl ActionRunner {
    pub fn new() -> Self {
        Self
    }

    /// Attempt `action` up to its retry count. The first success
    /// short-circuits; exhausting the budget raises a terminal failure
    /// wrapping the last cause.
    pub async fn run(
        &self,
        action: &Action,
        place: &str,
        agent: &dyn Agent,
        state: &mut WorkflowState,
    ) -> Result<ActionResult> {
        let mut attempt = 0;
        let mut last_cause = None;

        while attempt < action.retry_count() {
            debug!(
                action = action.name(),
                attempt = attempt + 1,
                max_attempts = action.retry_count(),
                "executing action"
            );

            match action.handler.execute(agent, state).await {
                Ok(result) => return Ok(result),
                Err(cause) => {
                    attempt += 1;

                    if attempt < action.retry_count() {
                        warn!(
                            action = action.name(),
                            attempt,
                            max_attempts = action.retry_count(),
                            error = %cause,
                            "action failed, retrying"
                        );
                        last_cause = Some(cause);
                        sleep(action.retry_delay()).await;
                    } else {
                        last_cause = Some(cause);
                    }
                }
            }
        }

        error!(
            action = action.name(),
            attempts = action.retry_count(),
            "action failed after all retry attempts"
        );

        Err(Error::Action {
            action: action.name().to_string(),
            place: place.to_string(),
            attempts: action.retry_count(),
            source: last_cause
                .unwrap_or_else(|| anyhow::anyhow!("action was configured with zero attempts")),
        })
    }
}

/// Maps a newly entered place to its ordered action list and runs the list
/// through the [`ActionRunner`].
pub struct ActionDispatcher {
    place_actions: HashMap<String, Vec<Action>>,
    runner: ActionRunner,
}

impl ActionDispatcher {
    pub(crate) fn new(place_actions: HashMap<String, Vec<Action>>) -> Self {
        Self {
            place_actions,
            runner: ActionRunner::new(),
        }
    }

    /// Run the actions registered for `place`, in registration order.
    ///
    /// On each success, `last_result`, `last_action`, and `last_place` are
    /// merged into the context; the last writer wins. On terminal failure the
    /// error record is appended to the state before the error propagates and
    /// aborts the run.
    pub async fn dispatch(
        &self,
        place: &str,
        agent: &dyn Agent,
        state: &mut WorkflowState,
    ) -> Result<()> {
        let Some(actions) = self.place_actions.get(place) else {
            return Ok(());
        };
        if actions.is_empty() {
            return Ok(());
        }

        info!(
            place,
            action_count = actions.len(),
            workflow = state.id(),
            "executing actions for place"
        );

        for action in actions {
            match self.runner.run(action, place, agent, state).await {
                Ok(result) => {
                    state.set_context_value("last_result", json!(result.content()));
                    state.set_context_value("last_action", json!(action.name()));
                    state.set_context_value("last_place", json!(place));

                    debug!(
                        action = action.name(),
                        place, "action executed successfully"
                    );
                }
                Err(err) => {
                    let cause = std::error::Error::source(&err).map(|s| s.to_string());
                    let mut record =
                        WorkflowErrorRecord::new(err.to_string(), place, err.code())
                            .with_context("action", json!(action.name()));
                    if let Some(cause) = cause {
                        record = record.with_cause(cause);
                    }
                    state.add_error(record);

                    error!(
                        action = action.name(),
                        place,
                        error = %err,
                        "action execution failed"
                    );

                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
