//! Seams to the external delivery targets.
//!
//! Connector adapters (the per-connector API clients) and internal domain
//! handlers live outside this core; the pool only sees their outcome.

use async_trait::async_trait;
use hub_common::IntegrationEvent;

/// Result of handing an event to an adapter or handler.
#[derive(Debug, Clone)]
pub enum AdapterOutcome {
    Success,
    Failure { error: String, retryable: bool },
}

impl AdapterOutcome {
    pub fn success() -> Self {
        Self::Success
    }

    pub fn failure(error: impl Into<String>, retryable: bool) -> Self {
        Self::Failure {
            error: error.into(),
            retryable,
        }
    }
}

/// Delivers outbound events to the external system behind a connection.
#[async_trait]
pub trait ConnectorAdapter: Send + Sync {
    async fn deliver_outbound(&self, event: &IntegrationEvent) -> AdapterOutcome;
}

/// Applies inbound events to internal domain logic.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle_inbound(&self, event: &IntegrationEvent) -> AdapterOutcome;
}
