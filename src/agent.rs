//! Opaque agent capability handed through to place-entry actions.
//!
//! The engine never calls the agent itself; it only threads the handle into
//! each action so caller-supplied logic can talk to whatever model provider
//! sits behind it.

use async_trait::async_trait;

/// Handle to an AI agent backing the workflow's actions.
///
/// Implementations wrap a model provider, a local process, or a test stub.
/// How a prompt turns into a reply is entirely out of scope for the engine.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Send a prompt to the agent and return its text reply.
    async fn prompt(&self, input: &str) -> anyhow::Result<String>;
}

/// Agent that answers every prompt with an empty string.
///
/// Useful for workflows whose actions never consult the agent, and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAgent;

#[async_trait]
impl Agent for NullAgent {
    async fn prompt(&self, _input: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_agent_returns_empty_reply() {
        let agent = NullAgent;
        let reply = agent.prompt("anything").await.unwrap();
        assert!(reply.is_empty());
    }
}
