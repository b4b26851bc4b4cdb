//! Guard predicates deciding whether a transition may fire.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::definition::Transition;
use crate::error::{Error, Result};
use crate::state::WorkflowState;

/// Predicate attached to a transition.
///
/// Guards registered for the same transition AND together and evaluate in
/// registration order. Returning `Ok(false)` blocks the transition; raising
/// an error blocks it too and the error propagates unretried.
pub trait Guard: Send + Sync {
    fn evaluate(&self, state: &WorkflowState) -> anyhow::Result<bool>;
}

impl<F> Guard for F
where
    F: Fn(&WorkflowState) -> anyhow::Result<bool> + Send + Sync,
{
    fn evaluate(&self, state: &WorkflowState) -> anyhow::Result<bool> {
        self(state)
    }
}

/// Evaluates transition enablement against a marking and the registered
/// guard lists.
pub struct GuardEvaluator {
    transition_guards: HashMap<String, Vec<Arc<dyn Guard>>>,
}

impl GuardEvaluator {
    pub(crate) fn new(transition_guards: HashMap<String, Vec<Arc<dyn Guard>>>) -> Self {
        Self { transition_guards }
    }

    /// A transition is enabled iff every source place holds a token in the
    /// current marking and no registered guard blocks it. An empty guard list
    /// is an unconditional pass.
    pub fn is_enabled(&self, transition: &Transition, state: &WorkflowState) -> Result<bool> {
        let marking = state.marking();
        if !transition.from().iter().all(|place| marking.is_marked(place)) {
            return Ok(false);
        }

        if let Some(guards) = self.transition_guards.get(transition.name()) {
            for guard in guards {
                match guard.evaluate(state) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(
                            transition = transition.name(),
                            workflow = state.id(),
                            "transition blocked by guard"
                        );
                        return Ok(false);
                    }
                    Err(source) => {
                        return Err(Error::Guard {
                            transition: transition.name().to_string(),
                            source,
                        });
                    }
                }
            }
        }

        Ok(true)
    }
}
