//! Integration Hub Shared Types
//!
//! Core domain types shared across the hub crates:
//! - IntegrationEvent: a unit of work moving between the platform and an external system
//! - SyncJob: a bulk synchronization run against one connection
//! - WebhookEndpoint: a tenant's registered delivery target for outbound events
//! - Connection: a tenant's configured connector instance (external registry record)
//! - HubError: the hub-wide error taxonomy
//!
//! All tenant data is strictly partitioned: every entity carries a `tenant_id`
//! and read paths must filter by it.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod clock;
pub mod ids;
pub mod registry;

pub use catalog::{ConnectorCatalog, ConnectorSpec, StaticCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{ConnectionId, EndpointId, EventId, JobId, TenantId};
pub use registry::{Connection, ConnectionRegistry, InMemoryConnectionRegistry};

/// Hard ceiling on delivery attempts per event before it is marked failed.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Consecutive delivery failures after which a webhook endpoint is deactivated.
pub const ENDPOINT_FAILURE_CEILING: u32 = 10;

// ============================================================================
// Integration Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processing,
    Success,
    Retrying,
    Failed,
}

impl EventStatus {
    /// Terminal statuses are final: the record is immutable once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Success | EventStatus::Failed)
    }
}

/// A unit of work moving between the platform and an external system.
///
/// Created in `Pending` by the producer; mutated only by the Event Store's
/// state-transition operations thereafter. The payload is never edited after
/// creation - a changed payload means a new event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationEvent {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub connection_id: ConnectionId,
    pub direction: EventDirection,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl IntegrationEvent {
    pub fn new(
        direction: EventDirection,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            tenant_id,
            connection_id,
            direction,
            event_type: event_type.into(),
            payload,
            status: EventStatus::Pending,
            attempt_count: 0,
            last_attempt_at: None,
            error_detail: None,
            processed_at: None,
            created_at,
        }
    }

    /// Retry attempt: any attempt after the first claim.
    pub fn is_retry(&self) -> bool {
        self.attempt_count > 1
    }
}

// ============================================================================
// Sync Jobs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SyncJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncJobStatus::Completed | SyncJobStatus::Failed)
    }
}

/// Progress/outcome ledger for one bulk synchronization run.
///
/// The job does not perform the synchronization itself; the connector adapter
/// streams records and reports progress against it. A failed job is superseded
/// by a new job, never reopened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub connection_id: ConnectionId,
    pub job_type: String,
    pub status: SyncJobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: u64,
    pub records_failed: u64,
    pub error_log: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn new(
        tenant_id: TenantId,
        connection_id: ConnectionId,
        job_type: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            tenant_id,
            connection_id,
            job_type: job_type.into(),
            status: SyncJobStatus::Pending,
            started_at: None,
            completed_at: None,
            records_processed: 0,
            records_failed: 0,
            error_log: None,
            created_at,
        }
    }
}

// ============================================================================
// Webhook Endpoints
// ============================================================================

/// A tenant's registered delivery target for outbound events.
///
/// The signing secret is generated once at creation and is never user-supplied.
/// It is excluded from serialization and from `Debug` output so that no read
/// path exposes it.
#[derive(Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: EndpointId,
    pub tenant_id: TenantId,
    pub url: String,
    #[serde(skip_serializing, default)]
    pub secret: String,
    /// Subscribed event types. An empty filter subscribes to all types.
    pub event_types: Vec<String>,
    pub active: bool,
    pub consecutive_failures: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    pub fn new(
        tenant_id: TenantId,
        url: impl Into<String>,
        event_types: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EndpointId::new(),
            tenant_id,
            url: url.into(),
            secret: generate_signing_secret(),
            event_types,
            active: true,
            consecutive_failures: 0,
            last_triggered_at: None,
            created_at,
        }
    }

    /// True when the subscription filter is empty (subscribe-to-all) or
    /// contains the given event type.
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.event_types.is_empty() || self.event_types.iter().any(|t| t == event_type)
    }
}

impl std::fmt::Debug for WebhookEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookEndpoint")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("url", &self.url)
            .field("secret", &"<redacted>")
            .field("event_types", &self.event_types)
            .field("active", &self.active)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("last_triggered_at", &self.last_triggered_at)
            .field("created_at", &self.created_at)
            .finish()
    }
}

fn generate_signing_secret() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("whsec_{}", random)
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Rejected at the boundary, never stored (unsupported event type,
    /// malformed payload, unknown or inactive connection).
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Caller must retry or skip (duplicate running sync job, double-claim race).
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Illegal state transition - a caller bug, surfaced loudly.
    #[error("Invalid state transition: {message}")]
    InvalidState { message: String },

    /// Network/timeout/non-success response. Recorded on the event or the
    /// endpoint; never propagated past the worker boundary.
    #[error("Delivery error: {message}")]
    Delivery { message: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HubError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState { message: message.into() }
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery { message: message.into() }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
