//! Webhook Dispatcher
//!
//! Fans outbound platform events out to tenant-registered webhook endpoints:
//! - matches events against each endpoint's subscription filter
//! - signs the JSON envelope with the endpoint's secret (HMAC-SHA256, hex)
//! - performs bounded-timeout HTTP delivery
//! - applies failure-based circuit breaking per endpoint (deactivation after
//!   ten consecutive failures)
//!
//! Endpoint outcomes are independent of each other and are recorded on the
//! endpoint, never on the IntegrationEvent itself.

pub mod dispatcher;
pub mod repository;
pub mod signing;

pub use dispatcher::{FanoutReport, WebhookDispatcher, WebhookDispatcherConfig};
pub use repository::{EndpointRepository, InMemoryEndpointRepository};
pub use signing::{sign_body, verify_signature, WebhookEnvelope};

/// Header carrying the hex-encoded HMAC-SHA256 over the exact request body.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
/// Header carrying the send timestamp (unix seconds).
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";
/// Header carrying the event type.
pub const EVENT_HEADER: &str = "X-Webhook-Event";
