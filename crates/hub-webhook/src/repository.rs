//! Webhook endpoint repository.
//!
//! All mutations are single-row, per-endpoint updates; the failure counter and
//! active flag are the only fields the dispatcher ever touches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hub_common::{
    EndpointId, HubError, Result, TenantId, WebhookEndpoint, ENDPOINT_FAILURE_CEILING,
};
use tracing::warn;

#[async_trait]
pub trait EndpointRepository: Send + Sync {
    async fn insert(&self, endpoint: WebhookEndpoint) -> Result<()>;

    /// Tenant-scoped lookup.
    async fn find(
        &self,
        tenant_id: &TenantId,
        endpoint_id: &EndpointId,
    ) -> Result<Option<WebhookEndpoint>>;

    /// Active endpoints of the tenant whose filter is empty or contains the
    /// event type. Inactive and non-matching endpoints are skipped silently.
    async fn find_active_subscribed(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>>;

    /// Successful delivery: reset the failure counter, stamp the trigger time.
    async fn record_success(&self, endpoint_id: &EndpointId, at: DateTime<Utc>) -> Result<()>;

    /// Failed delivery: increment the failure counter and stamp the trigger
    /// time. Reaching the ceiling clears the active flag - the only automatic
    /// mutation of that flag. Reactivation is an explicit tenant action.
    async fn record_failure(&self, endpoint_id: &EndpointId, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryEndpointRepository {
    endpoints: DashMap<EndpointId, WebhookEndpoint>,
}

impl InMemoryEndpointRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EndpointRepository for InMemoryEndpointRepository {
    async fn insert(&self, endpoint: WebhookEndpoint) -> Result<()> {
        self.endpoints.insert(endpoint.id.clone(), endpoint);
        Ok(())
    }

    async fn find(
        &self,
        tenant_id: &TenantId,
        endpoint_id: &EndpointId,
    ) -> Result<Option<WebhookEndpoint>> {
        Ok(self
            .endpoints
            .get(endpoint_id)
            .filter(|e| e.tenant_id == *tenant_id)
            .map(|e| e.clone()))
    }

    async fn find_active_subscribed(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>> {
        Ok(self
            .endpoints
            .iter()
            .filter(|e| e.tenant_id == *tenant_id && e.active && e.subscribes_to(event_type))
            .map(|e| e.clone())
            .collect())
    }

    async fn record_success(&self, endpoint_id: &EndpointId, at: DateTime<Utc>) -> Result<()> {
        let mut endpoint = self
            .endpoints
            .get_mut(endpoint_id)
            .ok_or_else(|| HubError::not_found("WebhookEndpoint", endpoint_id.as_str()))?;
        endpoint.consecutive_failures = 0;
        endpoint.last_triggered_at = Some(at);
        Ok(())
    }

    async fn record_failure(&self, endpoint_id: &EndpointId, at: DateTime<Utc>) -> Result<()> {
        let mut endpoint = self
            .endpoints
            .get_mut(endpoint_id)
            .ok_or_else(|| HubError::not_found("WebhookEndpoint", endpoint_id.as_str()))?;
        endpoint.consecutive_failures += 1;
        endpoint.last_triggered_at = Some(at);
        if endpoint.consecutive_failures >= ENDPOINT_FAILURE_CEILING && endpoint.active {
            endpoint.active = false;
            warn!(
                endpoint_id = %endpoint_id,
                tenant_id = %endpoint.tenant_id,
                url = %endpoint.url,
                failures = endpoint.consecutive_failures,
                "Webhook endpoint deactivated after consecutive failures"
            );
        }
        Ok(())
    }
}
