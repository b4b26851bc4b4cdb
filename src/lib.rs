//! # Agentflow
//!
//! A place/transition workflow execution engine for AI agent pipelines:
//! guarded transitions, retryable place-entry actions, durable state
//! persistence, and resumable execution.
//!
//! ## Modules
//!
//! - `builder` - Fluent construction of immutable workflow definitions
//! - `definition` - Places, transitions, and metadata
//! - `guard` - Per-transition predicates deciding enablement
//! - `action` - Place-entry actions with bounded retry
//! - `executor` - The state-machine loop: execute and resume
//! - `state` - Serializable workflow state with marking and error log
//! - `store` - Keyed persistence backends (memory, filesystem, Redis)
//! - `agent` - Opaque agent capability threaded into actions
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentflow::{
//!     InMemoryWorkflowStore, NullAgent, WorkflowBuilder, WorkflowExecutor, WorkflowState,
//! };
//!
//! # async fn run() -> agentflow::Result<()> {
//! let config = WorkflowBuilder::new("data-processing")
//!     .initial_place("start")
//!     .add_transition("fetch", "start", "fetching")
//!     .add_transition("process", "fetching", "done")
//!     .build()?;
//!
//! let executor = WorkflowExecutor::new(config, Arc::new(InMemoryWorkflowStore::new()));
//! let mut state = WorkflowState::at_place("job-1", "start");
//! let result = executor.execute(&NullAgent, &mut state).await?;
//! println!("{}", result.content());
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod agent;
pub mod builder;
pub mod definition;
pub mod error;
pub mod executor;
pub mod guard;
pub mod state;
pub mod store;

pub use action::{Action, ActionHandler, ActionResult};
pub use agent::{Agent, NullAgent};
pub use builder::{WorkflowBuilder, WorkflowConfig};
pub use definition::{Definition, Transition};
pub use error::{Error, Result};
pub use executor::WorkflowExecutor;
pub use guard::Guard;
pub use state::{Marking, WorkflowErrorRecord, WorkflowState, WorkflowStatus, MARKING_KEY};
pub use store::{FilesystemWorkflowStore, InMemoryWorkflowStore, StoreError, WorkflowStore};
#[cfg(feature = "redis")]
pub use store::RedisWorkflowStore;
