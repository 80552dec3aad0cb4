//! Outbound event fan-out to subscribed webhook endpoints.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use hub_common::{Clock, EventDirection, HubError, IntegrationEvent, Result, WebhookEndpoint};
use tracing::{debug, warn};

use crate::repository::EndpointRepository;
use crate::signing::{sign_body, WebhookEnvelope};
use crate::{EVENT_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};

#[derive(Debug, Clone)]
pub struct WebhookDispatcherConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for WebhookDispatcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one fan-out pass for one event.
///
/// Endpoint failures are bookkept on the endpoints themselves; the report is
/// for logging and never feeds back into the event's own retry state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct WebhookDispatcher {
    repository: Arc<dyn EndpointRepository>,
    clock: Arc<dyn Clock>,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(
        repository: Arc<dyn EndpointRepository>,
        clock: Arc<dyn Clock>,
        config: WebhookDispatcherConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HubError::delivery(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            repository,
            clock,
            client,
        })
    }

    /// Deliver one outbound event to every subscribed endpoint of its tenant.
    ///
    /// Deliveries are independent: one endpoint's failure never affects
    /// another's delivery.
    pub async fn deliver(&self, event: &IntegrationEvent) -> Result<FanoutReport> {
        debug_assert_eq!(event.direction, EventDirection::Outbound);

        let endpoints = self
            .repository
            .find_active_subscribed(&event.tenant_id, &event.event_type)
            .await?;

        if endpoints.is_empty() {
            debug!(
                tenant_id = %event.tenant_id,
                event_type = %event.event_type,
                "No subscribed webhook endpoints"
            );
            return Ok(FanoutReport::default());
        }

        // One envelope for the whole fan-out. A payload that cannot serialize
        // is the event's fault, not any endpoint's, so it surfaces as an error
        // before any endpoint bookkeeping happens.
        let sent_at = self.clock.now();
        let envelope = WebhookEnvelope {
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            sent_at,
        };
        let body = envelope.to_body()?;

        let attempts = endpoints
            .into_iter()
            .map(|endpoint| self.deliver_to_endpoint(event, endpoint, &body, sent_at));
        let outcomes = join_all(attempts).await;

        let mut report = FanoutReport::default();
        for delivered in outcomes {
            report.attempted += 1;
            if delivered {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        debug!(
            event_id = %event.id,
            tenant_id = %event.tenant_id,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Webhook fan-out finished"
        );
        Ok(report)
    }

    async fn deliver_to_endpoint(
        &self,
        event: &IntegrationEvent,
        endpoint: WebhookEndpoint,
        body: &[u8],
        sent_at: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        let signature = sign_body(&endpoint.secret, body);

        let response = self
            .client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, sent_at.timestamp().to_string())
            .header(EVENT_HEADER, &event.event_type)
            .body(body.to_vec())
            .send()
            .await;

        let delivered = match response {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    endpoint_id = %endpoint.id,
                    url = %endpoint.url,
                    status = response.status().as_u16(),
                    event_id = %event.id,
                    "Webhook delivery rejected"
                );
                false
            }
            Err(e) => {
                warn!(
                    endpoint_id = %endpoint.id,
                    url = %endpoint.url,
                    event_id = %event.id,
                    error = %e,
                    "Webhook delivery failed"
                );
                false
            }
        };

        let bookkeeping = if delivered {
            self.repository.record_success(&endpoint.id, sent_at).await
        } else {
            self.repository.record_failure(&endpoint.id, sent_at).await
        };
        if let Err(e) = bookkeeping {
            warn!(endpoint_id = %endpoint.id, error = %e, "Endpoint bookkeeping failed");
        }

        delivered
    }
}
