//! Immutable workflow definition: places, transitions, and metadata.
//!
//! Definitions are produced by [`crate::builder::WorkflowBuilder`] and shared
//! read-only across executions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Metadata attached to places and transitions.
pub type Metadata = Map<String, Value>;

/// Named arc between ordered source and destination places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    name: String,
    from: Vec<String>,
    to: Vec<String>,
}

impl Transition {
    pub fn new(name: impl Into<String>, from: Vec<String>, to: Vec<String>) -> Self {
        Self {
            name: name.into(),
            from,
            to,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from(&self) -> &[String] {
        &self.from
    }

    pub fn to(&self) -> &[String] {
        &self.to
    }
}

/// Immutable graph of places and transitions.
///
/// Invariants, upheld by the builder: places are unique and ordered by
/// declaration, every transition endpoint is a registered place, and the
/// initial place is in the place set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    places: Vec<String>,
    transitions: Vec<Transition>,
    initial_place: String,
    #[serde(default)]
    place_metadata: HashMap<String, Metadata>,
    #[serde(default)]
    transition_metadata: HashMap<String, Metadata>,
}

impl Definition {
    pub(crate) fn new(
        places: Vec<String>,
        transitions: Vec<Transition>,
        initial_place: String,
        place_metadata: HashMap<String, Metadata>,
        transition_metadata: HashMap<String, Metadata>,
    ) -> Self {
        Self {
            places,
            transitions,
            initial_place,
            place_metadata,
            transition_metadata,
        }
    }

    /// Places in declaration order.
    pub fn places(&self) -> &[String] {
        &self.places
    }

    pub fn has_place(&self, place: &str) -> bool {
        self.places.iter().any(|p| p == place)
    }

    /// Transitions in declaration order. This order is the deterministic
    /// tie-break when several transitions are enabled at once.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn initial_place(&self) -> &str {
        &self.initial_place
    }

    pub fn place_metadata(&self, place: &str) -> Option<&Metadata> {
        self.place_metadata.get(place)
    }

    pub fn transition_metadata(&self, transition: &str) -> Option<&Metadata> {
        self.transition_metadata.get(transition)
    }
}
