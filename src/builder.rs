//! Fluent builder producing an immutable [`Definition`] plus frozen action
//! and guard registries.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::Action;
use crate::definition::{Definition, Metadata, Transition};
use crate::error::{Error, Result};
use crate::guard::Guard;

/// Source/destination endpoints for [`WorkflowBuilder::add_transition`].
///
/// Accepts a single place name or an ordered list of them.
pub trait IntoPlaceList {
    fn into_place_list(self) -> Vec<String>;
}

impl IntoPlaceList for &str {
    fn into_place_list(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoPlaceList for String {
    fn into_place_list(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoPlaceList for Vec<String> {
    fn into_place_list(self) -> Vec<String> {
        self
    }
}

impl<const N: usize> IntoPlaceList for [&str; N] {
    fn into_place_list(self) -> Vec<String> {
        self.iter().map(|p| p.to_string()).collect()
    }
}

impl IntoPlaceList for &[&str] {
    fn into_place_list(self) -> Vec<String> {
        self.iter().map(|p| p.to_string()).collect()
    }
}

/// Frozen output of [`WorkflowBuilder::build`]: the definition plus the
/// action and guard registries the executor consumes.
pub struct WorkflowConfig {
    name: String,
    definition: Definition,
    place_actions: HashMap<String, Vec<Action>>,
    transition_guards: HashMap<String, Vec<Arc<dyn Guard>>>,
}

impl WorkflowConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        String,
        Definition,
        HashMap<String, Vec<Action>>,
        HashMap<String, Vec<Arc<dyn Guard>>>,
    ) {
        (
            self.name,
            self.definition,
            self.place_actions,
            self.transition_guards,
        )
    }
}

impl std::fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// Builds workflow definitions.
///
/// Places are idempotent by name and keep declaration order; transitions
/// implicitly register any place they reference; actions and guards append in
/// registration order. `build` does not consume the builder, and a produced
/// [`WorkflowConfig`] is unaffected by later builder mutations or repeat
/// builds.
pub struct WorkflowBuilder {
    name: String,
    places: Vec<String>,
    transitions: Vec<Transition>,
    initial_place: Option<String>,
    place_actions: HashMap<String, Vec<Action>>,
    transition_guards: HashMap<String, Vec<Arc<dyn Guard>>>,
    place_metadata: HashMap<String, Metadata>,
    transition_metadata: HashMap<String, Metadata>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            places: Vec::new(),
            transitions: Vec::new(),
            initial_place: None,
            place_actions: HashMap::new(),
            transition_guards: HashMap::new(),
            place_metadata: HashMap::new(),
            transition_metadata: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a place. Repeat registrations of the same name are no-ops.
    pub fn add_place(mut self, place: impl Into<String>) -> Self {
        self.register_place(place.into());
        self
    }

    pub fn add_place_with_metadata(mut self, place: impl Into<String>, metadata: Metadata) -> Self {
        let place = place.into();
        self.register_place(place.clone());
        if !metadata.is_empty() {
            self.place_metadata.insert(place, metadata);
        }
        self
    }

    /// Set the initial place, implicitly registering it. When unset, the
    /// first declared place becomes the initial place.
    pub fn initial_place(mut self, place: impl Into<String>) -> Self {
        let place = place.into();
        self.register_place(place.clone());
        self.initial_place = Some(place);
        self
    }

    /// Add a transition, implicitly registering any place it references.
    pub fn add_transition(
        mut self,
        name: impl Into<String>,
        from: impl IntoPlaceList,
        to: impl IntoPlaceList,
    ) -> Self {
        let from = from.into_place_list();
        let to = to.into_place_list();

        for place in from.iter().chain(to.iter()) {
            self.register_place(place.clone());
        }

        self.transitions.push(Transition::new(name, from, to));
        self
    }

    pub fn add_transition_with_metadata(
        mut self,
        name: impl Into<String>,
        from: impl IntoPlaceList,
        to: impl IntoPlaceList,
        metadata: Metadata,
    ) -> Self {
        let name = name.into();
        if !metadata.is_empty() {
            self.transition_metadata.insert(name.clone(), metadata);
        }
        self.add_transition(name, from, to)
    }

    /// Append an action to a place's list, implicitly registering the place.
    /// Actions run in registration order when the place is entered.
    pub fn add_action_for_place(mut self, place: impl Into<String>, action: Action) -> Self {
        let place = place.into();
        self.register_place(place.clone());
        self.place_actions.entry(place).or_default().push(action);
        self
    }

    /// Append a guard to a transition's list. Guards evaluate in registration
    /// order and AND together.
    pub fn add_guard_for_transition(
        mut self,
        transition: impl Into<String>,
        guard: impl Guard + 'static,
    ) -> Self {
        self.transition_guards
            .entry(transition.into())
            .or_default()
            .push(Arc::new(guard));
        self
    }

    /// Finalize into an immutable definition plus frozen registries.
    ///
    /// Fails when no place was declared. Can be called repeatedly; each call
    /// snapshots the builder's current contents.
    pub fn build(&self) -> Result<WorkflowConfig> {
        let initial_place = match &self.initial_place {
            Some(place) => place.clone(),
            None => self
                .places
                .first()
                .cloned()
                .ok_or_else(|| Error::Config("workflow has no places".to_string()))?,
        };

        let definition = Definition::new(
            self.places.clone(),
            self.transitions.clone(),
            initial_place,
            self.place_metadata.clone(),
            self.transition_metadata.clone(),
        );

        Ok(WorkflowConfig {
            name: self.name.clone(),
            definition,
            place_actions: self.place_actions.clone(),
            transition_guards: self.transition_guards.clone(),
        })
    }

    fn register_place(&mut self, place: String) {
        if !self.places.contains(&place) {
            self.places.push(place);
        }
    }
}
