//! Drives a [`WorkflowState`] through a definition until no transition is
//! enabled, a bound is exceeded, or something fails.
//!
//! Each step recomputes the enabled transitions in declaration order, applies
//! the first one, dispatches entry actions for the newly entered places, and
//! persists through the store. Resume picks up from the last persisted
//! marking, never from the initial place.

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::action::{ActionDispatcher, ActionResult};
use crate::agent::Agent;
use crate::builder::WorkflowConfig;
use crate::definition::Definition;
use crate::error::{Error, Result};
use crate::guard::GuardEvaluator;
use crate::state::{WorkflowErrorRecord, WorkflowState, WorkflowStatus};
use crate::store::WorkflowStore;

const DEFAULT_MAX_ITERATIONS: u32 = 100;
const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(300);
const DEFAULT_COMPLETION_MESSAGE: &str = "Workflow completed successfully";

/// Executes workflows against an injected store.
///
/// One `execute`/`resume` call drives one workflow id sequentially; the
/// executor itself never serializes two callers racing on the same id.
pub struct WorkflowExecutor {
    name: String,
    definition: Definition,
    guards: GuardEvaluator,
    dispatcher: ActionDispatcher,
    store: Arc<dyn WorkflowStore>,
    max_iterations: u32,
    max_execution_time: Duration,
}

impl WorkflowExecutor {
    pub fn new(config: WorkflowConfig, store: Arc<dyn WorkflowStore>) -> Self {
        let (name, definition, place_actions, transition_guards) = config.into_parts();
        Self {
            name,
            definition,
            guards: GuardEvaluator::new(transition_guards),
            dispatcher: ActionDispatcher::new(place_actions),
            store,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_execution_time: DEFAULT_MAX_EXECUTION_TIME,
        }
    }

    /// Cap on transition applications per execute/resume call. Guards against
    /// misconfigured cycles; exceeding it is fatal and unretried.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Wall-clock budget per execute/resume call, checked between steps only.
    pub fn with_max_execution_time(mut self, max_execution_time: Duration) -> Self {
        self.max_execution_time = max_execution_time;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    /// Run the workflow to completion, failure, or bound exceeded.
    ///
    /// Returns the last action result, or a default completion result when no
    /// action ever produced one. On any error the state is persisted with
    /// status Failed and exactly one error record before the error returns.
    pub async fn execute(
        &self,
        agent: &dyn Agent,
        state: &mut WorkflowState,
    ) -> Result<ActionResult> {
        info!(id = state.id(), workflow = self.name, "workflow started");

        match self.run_to_completion(agent, state).await {
            Ok(result) => {
                info!(id = state.id(), "workflow completed");
                Ok(result)
            }
            Err(err) => {
                self.record_failure(state, &err).await;
                Err(err)
            }
        }
    }

    /// Running save, loop, completion save. Every fallible step funnels here
    /// so the callers record and persist the failure in one place.
    async fn run_to_completion(
        &self,
        agent: &dyn Agent,
        state: &mut WorkflowState,
    ) -> Result<ActionResult> {
        state.set_status(WorkflowStatus::Running);
        self.store.save(state).await?;

        let started = Instant::now();
        let result = self.run_loop(agent, state, started).await?;

        state.set_status(WorkflowStatus::Completed);
        self.store.save(state).await?;
        Ok(result)
    }

    /// Resume a previously persisted workflow by id.
    ///
    /// Fails when the id is unknown or the workflow is already Completed or
    /// Cancelled. A Failed workflow gets its error log cleared and continues
    /// from the last persisted marking.
    pub async fn resume(&self, id: &str, agent: &dyn Agent) -> Result<ActionResult> {
        let mut state = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        match state.status() {
            WorkflowStatus::Completed => return Err(Error::AlreadyCompleted(id.to_string())),
            WorkflowStatus::Cancelled => return Err(Error::Cancelled(id.to_string())),
            WorkflowStatus::Failed => {
                state.clear_errors();
                info!(id, "cleared errors for failed workflow");
            }
            WorkflowStatus::Pending | WorkflowStatus::Running => {}
        }

        info!(
            id,
            current_place = state.current_place().as_deref().unwrap_or(""),
            "resuming workflow"
        );

        match self.run_to_completion(agent, &mut state).await {
            Ok(result) => {
                info!(id, "workflow resumed and completed");
                Ok(result)
            }
            Err(err) => {
                self.record_failure(&mut state, &err).await;
                Err(err)
            }
        }
    }

    async fn run_loop(
        &self,
        agent: &dyn Agent,
        state: &mut WorkflowState,
        started: Instant,
    ) -> Result<ActionResult> {
        let mut last_result = None;

        for iteration in 1..=self.max_iterations {
            // Bounds are checked between steps only, never mid-action.
            if started.elapsed() > self.max_execution_time {
                return Err(Error::Timeout(self.max_execution_time));
            }

            let marking = state.marking();
            if marking.is_empty() {
                return Err(Error::Config(format!(
                    "workflow '{}' has no current place",
                    state.id()
                )));
            }

            debug!(
                iteration,
                place = state.current_place().as_deref().unwrap_or(""),
                "current workflow place"
            );

            let mut fired = None;
            for transition in self.definition.transitions() {
                if self.guards.is_enabled(transition, state)? {
                    fired = Some(transition.clone());
                    break;
                }
            }

            let Some(transition) = fired else {
                debug!("no more transitions available, workflow complete");
                return Ok(last_result
                    .unwrap_or_else(|| ActionResult::text(DEFAULT_COMPLETION_MESSAGE)));
            };

            debug!(
                transition = transition.name(),
                from = ?transition.from(),
                to = ?transition.to(),
                "applying transition"
            );

            let mut marking = state.marking();
            for place in transition.from() {
                marking.take(place);
            }
            for place in transition.to() {
                marking.add(place);
            }
            state.set_marking(&marking);

            for place in transition.to() {
                self.dispatcher.dispatch(place, agent, state).await?;
            }

            self.store.save(state).await?;

            if let Some(content) = state.context().get("last_result").and_then(|v| v.as_str()) {
                last_result = Some(ActionResult::text(content));
            }
        }

        Err(Error::IterationLimit(self.max_iterations))
    }

    /// Record the failure on the state, mark it Failed, and persist. Action
    /// failures were already appended by the dispatcher; everything else gets
    /// its single record here.
    async fn record_failure(&self, state: &mut WorkflowState, err: &Error) {
        if !matches!(err, Error::Action { .. }) {
            let place = state.current_place().unwrap_or_default();
            let mut record = WorkflowErrorRecord::new(err.to_string(), place, err.code());
            if let Error::Guard { transition, source } = err {
                record = record
                    .with_cause(source.to_string())
                    .with_context("transition", json!(transition));
            } else if let Some(source) = std::error::Error::source(err) {
                record = record.with_cause(source.to_string());
            }
            state.add_error(record);
        }

        state.set_status(WorkflowStatus::Failed);

        // Best effort: a save failure here must not mask the original error.
        if let Err(save_err) = self.store.save(state).await {
            error!(id = state.id(), error = %save_err, "failed to persist failed workflow state");
        }

        error!(id = state.id(), error = %err, "workflow failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionHandler};
    use crate::agent::NullAgent;
    use crate::builder::WorkflowBuilder;
    use crate::store::{InMemoryWorkflowStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EchoHandler(&'static str);

    #[async_trait]
    impl ActionHandler for EchoHandler {
        async fn execute(
            &self,
            _agent: &dyn Agent,
            _state: &mut WorkflowState,
        ) -> anyhow::Result<ActionResult> {
            Ok(ActionResult::text(self.0))
        }
    }

    fn linear_builder() -> WorkflowBuilder {
        WorkflowBuilder::new("linear")
            .add_place("a")
            .add_place("b")
            .add_place("c")
            .initial_place("a")
            .add_transition("go1", "a", "b")
            .add_transition("go2", "b", "c")
    }

    #[tokio::test]
    async fn actionless_run_returns_the_default_result() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let executor = WorkflowExecutor::new(linear_builder().build().unwrap(), store.clone());
        let mut state = WorkflowState::at_place("wf", "a");

        let result = executor.execute(&NullAgent, &mut state).await.unwrap();

        assert_eq!(result.content(), "Workflow completed successfully");
        assert_eq!(state.status(), WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn last_action_result_is_returned() {
        let config = linear_builder()
            .add_action_for_place("b", Action::new("at-b", Arc::new(EchoHandler("from b"))))
            .add_action_for_place("c", Action::new("at-c", Arc::new(EchoHandler("from c"))))
            .build()
            .unwrap();
        let executor = WorkflowExecutor::new(config, Arc::new(InMemoryWorkflowStore::new()));
        let mut state = WorkflowState::at_place("wf", "a");

        let result = executor.execute(&NullAgent, &mut state).await.unwrap();

        assert_eq!(result.content(), "from c");
        assert_eq!(state.context()["last_place"], json!("c"));
    }

    #[tokio::test]
    async fn empty_marking_is_a_configuration_error() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let executor = WorkflowExecutor::new(linear_builder().build().unwrap(), store.clone());
        let mut state = WorkflowState::new("wf-empty");

        let err = executor.execute(&NullAgent, &mut state).await.unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(state.status(), WorkflowStatus::Failed);
        // The failure was persisted before the error surfaced.
        let stored = store.load("wf-empty").await.unwrap().unwrap();
        assert_eq!(stored.status(), WorkflowStatus::Failed);
        assert_eq!(stored.errors().len(), 1);
        assert_eq!(stored.errors()[0].code, "config");
    }

    #[tokio::test]
    async fn exhausted_time_budget_fails_between_steps() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let executor = WorkflowExecutor::new(linear_builder().build().unwrap(), store)
            .with_max_execution_time(Duration::ZERO);
        let mut state = WorkflowState::at_place("wf", "a");

        // Instant::elapsed is nonzero by the first between-step check.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let err = executor.execute(&NullAgent, &mut state).await.unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(state.status(), WorkflowStatus::Failed);
        assert_eq!(state.errors()[0].code, "timeout");
    }

    struct FailingStore;

    #[async_trait]
    impl WorkflowStore for FailingStore {
        async fn save(&self, _state: &WorkflowState) -> StoreResult<()> {
            Err(StoreError::backend("storage unavailable"))
        }

        async fn load(&self, _id: &str) -> StoreResult<Option<WorkflowState>> {
            Ok(None)
        }

        async fn remove(&self, _id: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    /// Accepts a fixed number of saves, then fails every further one.
    struct QuotaStore {
        allowed: u32,
        saves: AtomicU32,
    }

    impl QuotaStore {
        fn new(allowed: u32) -> Self {
            Self {
                allowed,
                saves: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl WorkflowStore for QuotaStore {
        async fn save(&self, _state: &WorkflowState) -> StoreResult<()> {
            if self.saves.fetch_add(1, Ordering::SeqCst) < self.allowed {
                Ok(())
            } else {
                Err(StoreError::backend("write quota exhausted"))
            }
        }

        async fn load(&self, _id: &str) -> StoreResult<Option<WorkflowState>> {
            Ok(None)
        }

        async fn remove(&self, _id: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn initial_save_failure_is_recorded_and_marks_the_state_failed() {
        let executor =
            WorkflowExecutor::new(linear_builder().build().unwrap(), Arc::new(FailingStore));
        let mut state = WorkflowState::at_place("wf", "a");

        let err = executor.execute(&NullAgent, &mut state).await.unwrap_err();

        assert!(matches!(err, Error::Store(_)));
        assert_eq!(state.status(), WorkflowStatus::Failed);
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].code, "store");
        assert!(state.errors()[0].message.contains("storage unavailable"));
    }

    #[tokio::test]
    async fn completion_save_failure_is_recorded_and_marks_the_state_failed() {
        // Running save plus one save per step succeed; the completion save
        // is the fourth and fails.
        let store = Arc::new(QuotaStore::new(3));
        let executor = WorkflowExecutor::new(linear_builder().build().unwrap(), store);
        let mut state = WorkflowState::at_place("wf", "a");

        let err = executor.execute(&NullAgent, &mut state).await.unwrap_err();

        assert!(matches!(err, Error::Store(_)));
        assert_eq!(state.status(), WorkflowStatus::Failed);
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].place, "c");
        assert_eq!(state.errors()[0].code, "store");
    }

    #[tokio::test]
    async fn resume_save_failure_is_recorded_and_marks_the_state_failed() {
        // The single allowed save serves the load side only; the Running
        // save on resume fails immediately.
        let store = Arc::new(InMemoryWorkflowStore::new());
        store
            .save(&WorkflowState::at_place("wf-stuck", "b"))
            .await
            .unwrap();

        struct LoadOnlyStore(InMemoryWorkflowStore);

        #[async_trait]
        impl WorkflowStore for LoadOnlyStore {
            async fn save(&self, _state: &WorkflowState) -> StoreResult<()> {
                Err(StoreError::backend("storage unavailable"))
            }

            async fn load(&self, id: &str) -> StoreResult<Option<WorkflowState>> {
                self.0.load(id).await
            }

            async fn remove(&self, id: &str) -> StoreResult<()> {
                self.0.remove(id).await
            }
        }

        let executor = WorkflowExecutor::new(
            linear_builder().build().unwrap(),
            Arc::new(LoadOnlyStore(store.as_ref().clone())),
        );

        let err = executor.resume("wf-stuck", &NullAgent).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn resume_of_unknown_id_fails() {
        let executor = WorkflowExecutor::new(
            linear_builder().build().unwrap(),
            Arc::new(InMemoryWorkflowStore::new()),
        );

        let err = executor.resume("missing", &NullAgent).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn resume_of_terminal_statuses_fails() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let executor =
            WorkflowExecutor::new(linear_builder().build().unwrap(), store.clone());

        let mut completed = WorkflowState::at_place("wf-done", "c");
        completed.set_status(WorkflowStatus::Completed);
        store.save(&completed).await.unwrap();

        let mut cancelled = WorkflowState::at_place("wf-gone", "b");
        cancelled.set_status(WorkflowStatus::Cancelled);
        store.save(&cancelled).await.unwrap();

        assert!(matches!(
            executor.resume("wf-done", &NullAgent).await.unwrap_err(),
            Error::AlreadyCompleted(_)
        ));
        assert!(matches!(
            executor.resume("wf-gone", &NullAgent).await.unwrap_err(),
            Error::Cancelled(_)
        ));
    }

    #[tokio::test]
    async fn guard_error_is_recorded_once_with_transition_context() {
        let config = linear_builder()
            .add_guard_for_transition("go1", |_: &WorkflowState| {
                Err(anyhow::anyhow!("guard backend unavailable"))
            })
            .build()
            .unwrap();
        let store = Arc::new(InMemoryWorkflowStore::new());
        let executor = WorkflowExecutor::new(config, store.clone());
        let mut state = WorkflowState::at_place("wf", "a");

        let err = executor.execute(&NullAgent, &mut state).await.unwrap_err();

        assert!(matches!(err, Error::Guard { .. }));
        let stored = store.load("wf").await.unwrap().unwrap();
        assert_eq!(stored.status(), WorkflowStatus::Failed);
        assert_eq!(stored.errors().len(), 1);
        let record = &stored.errors()[0];
        assert_eq!(record.code, "guard_failed");
        assert_eq!(record.place, "a");
        assert_eq!(record.context["transition"], json!("go1"));
        assert!(record.cause.as_deref().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn state_is_persisted_after_every_step() {
        let store = Arc::new(InMemoryWorkflowStore::new());
        let executor =
            WorkflowExecutor::new(linear_builder().build().unwrap(), store.clone());
        let mut state = WorkflowState::at_place("wf", "a");

        executor.execute(&NullAgent, &mut state).await.unwrap();

        let stored = store.load("wf").await.unwrap().unwrap();
        assert_eq!(stored.status(), WorkflowStatus::Completed);
        assert!(stored.marking().is_marked("c"));
        assert!(!stored.marking().is_marked("a"));
    }
}
