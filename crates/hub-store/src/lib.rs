//! Event Store & Retry Engine
//!
//! Owns the durable queue of inbound/outbound integration events, their
//! delivery status, and retry accounting. State machine per event:
//!
//! ```text
//! pending -> processing -> { success | retrying | failed }
//! retrying -> processing (next attempt)
//! ```
//!
//! The store is delay-agnostic: it tracks attempts and state only; retry
//! pacing is the Delivery Worker Pool's concern.

pub mod memory;

use async_trait::async_trait;
use hub_common::{
    ConnectionId, EventDirection, EventId, EventStatus, IntegrationEvent, Result, TenantId,
};

pub use memory::InMemoryEventStore;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Validate and append a new event in `Pending`, returning its id.
    ///
    /// Outbound event types are checked against the Connector Catalog for the
    /// connection's connector; inbound events are accepted as-is and validated
    /// downstream. Unknown or inactive connections are rejected. Validation
    /// failures are never stored.
    async fn enqueue(
        &self,
        direction: EventDirection,
        tenant_id: &TenantId,
        connection_id: &ConnectionId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<EventId>;

    /// Atomically claim up to `limit` events in `Pending` or `Retrying` with
    /// attempts remaining: each is transitioned to `Processing`, its attempt
    /// count incremented, and its last-attempt time stamped. A given event id
    /// is held by at most one claimant until its outcome is recorded.
    async fn claim_next_batch(&self, limit: usize) -> Result<Vec<IntegrationEvent>>;

    /// `Processing -> Success`, stamping the processed time. Idempotent on an
    /// already-successful event.
    async fn record_success(&self, event_id: &EventId) -> Result<()>;

    /// `Processing -> Retrying` while attempts remain, else `Processing ->
    /// Failed`; stores the error detail either way. Idempotent on an
    /// already-failed event.
    async fn record_failure(&self, event_id: &EventId, error_detail: &str) -> Result<()>;

    /// Tenant-scoped lookup.
    async fn find(&self, tenant_id: &TenantId, event_id: &EventId)
        -> Result<Option<IntegrationEvent>>;

    /// Tenant-scoped list of terminally failed events, for the integration
    /// health view.
    async fn list_failed(&self, tenant_id: &TenantId) -> Result<Vec<IntegrationEvent>>;

    /// Tenant-scoped per-connection delivery ledger.
    async fn list_for_connection(
        &self,
        tenant_id: &TenantId,
        connection_id: &ConnectionId,
    ) -> Result<Vec<IntegrationEvent>>;

    /// Tenant-scoped status counts.
    async fn count_by_status(&self, tenant_id: &TenantId, status: EventStatus) -> Result<usize>;
}
