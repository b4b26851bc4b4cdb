//! Mutable, serializable workflow state.
//!
//! A [`WorkflowState`] is created fresh per workflow instance, mutated in
//! place through a run, persisted after every step, and reloaded on resume.
//! The marking lives inside the context map under [`MARKING_KEY`] so a single
//! JSON document round-trips the whole execution position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Reserved context key holding the marking.
pub const MARKING_KEY: &str = "__marking";

/// Run status of a workflow instance.
///
/// Pending → Running → {Completed, Failed, Cancelled}; a Failed workflow can
/// be resumed back into Running. Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Place → token count map.
///
/// This engine only exercises counts in {0,1}, but the representation keeps
/// full counts so multi-token nets stay expressible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marking(BTreeMap<String, u64>);

impl Marking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marking with a single token at `place`.
    pub fn with_place(place: impl Into<String>) -> Self {
        let mut marking = Self::new();
        marking.add(place);
        marking
    }

    pub fn tokens(&self, place: &str) -> u64 {
        self.0.get(place).copied().unwrap_or(0)
    }

    pub fn is_marked(&self, place: &str) -> bool {
        self.tokens(place) > 0
    }

    /// Add one token at `place`.
    pub fn add(&mut self, place: impl Into<String>) {
        *self.0.entry(place.into()).or_insert(0) += 1;
    }

    /// Remove one token from `place`. Places at zero are dropped from the map
    /// so serialized markings stay sparse.
    pub fn take(&mut self, place: &str) {
        if let Some(count) = self.0.get_mut(place) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.0.remove(place);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Marked places in lexicographic order.
    pub fn places(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Immutable record of a failure, appended to the state's error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowErrorRecord {
    pub message: String,
    /// Place the workflow occupied when the failure happened.
    pub place: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowErrorRecord {
    pub fn new(
        message: impl Into<String>,
        place: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            place: place.into(),
            code: code.into(),
            cause: None,
            context: Map::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Serializable aggregate driven by the executor: id, context (marking
/// included), status, and an append-only error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    id: String,
    #[serde(default)]
    context: Map<String, Value>,
    #[serde(default)]
    metadata: Map<String, Value>,
    status: WorkflowStatus,
    #[serde(default)]
    errors: Vec<WorkflowErrorRecord>,
}

impl WorkflowState {
    /// New pending state with an empty context. The caller assigns the id;
    /// ids must be unique per workflow instance.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context: Map::new(),
            metadata: Map::new(),
            status: WorkflowStatus::Pending,
            errors: Vec::new(),
        }
    }

    /// New pending state positioned at `place` with a single token.
    pub fn at_place(id: impl Into<String>, place: impl Into<String>) -> Self {
        let mut state = Self::new(id);
        state.set_marking(&Marking::with_place(place));
        state
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.merge_context(context);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn set_status(&mut self, status: WorkflowStatus) {
        self.status = status;
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Merge entries into the context. Existing keys are overwritten, so the
    /// last writer wins.
    pub fn merge_context(&mut self, entries: Map<String, Value>) {
        for (key, value) in entries {
            self.context.insert(key, value);
        }
    }

    /// Set a single context entry.
    pub fn set_context_value(&mut self, key: impl Into<String>, value: Value) {
        self.context.insert(key.into(), value);
    }

    /// Current marking parsed out of the reserved context key. Missing or
    /// malformed entries read as an empty marking.
    pub fn marking(&self) -> Marking {
        self.context
            .get(MARKING_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    /// Persist the marking into the reserved context key.
    pub fn set_marking(&mut self, marking: &Marking) {
        // Markings are small maps of integers; serialization cannot fail.
        let value = serde_json::to_value(marking).unwrap_or(Value::Null);
        self.context.insert(MARKING_KEY.to_string(), value);
    }

    /// First marked place, if any.
    pub fn current_place(&self) -> Option<String> {
        self.marking().places().next().map(str::to_string)
    }

    pub fn errors(&self) -> &[WorkflowErrorRecord] {
        &self.errors
    }

    pub fn add_error(&mut self, error: WorkflowErrorRecord) {
        self.errors.push(error);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }
}
