//! In-memory Event Store backend.
//!
//! A single mutex guards the whole event table so claim-and-increment is one
//! atomic step across rows: no two claimants can ever hold the same event.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hub_common::{
    Clock, ConnectionId, ConnectionRegistry, ConnectorCatalog, EventDirection, EventId,
    EventStatus, HubError, IntegrationEvent, Result, TenantId, MAX_DELIVERY_ATTEMPTS,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::EventStore;

struct EventTable {
    /// Event records keyed by id. Never removed: terminal records are retained
    /// for audit.
    events: HashMap<EventId, IntegrationEvent>,
    /// Enqueue order, for FIFO claiming.
    order: Vec<EventId>,
}

pub struct InMemoryEventStore {
    table: Mutex<EventTable>,
    registry: Arc<dyn ConnectionRegistry>,
    catalog: Arc<dyn ConnectorCatalog>,
    clock: Arc<dyn Clock>,
}

impl InMemoryEventStore {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        catalog: Arc<dyn ConnectorCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            table: Mutex::new(EventTable {
                events: HashMap::new(),
                order: Vec::new(),
            }),
            registry,
            catalog,
            clock,
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn enqueue(
        &self,
        direction: EventDirection,
        tenant_id: &TenantId,
        connection_id: &ConnectionId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<EventId> {
        let connection = self
            .registry
            .get(tenant_id, connection_id)
            .await
            .ok_or_else(|| {
                HubError::validation(format!(
                    "unknown connection {} for tenant {}",
                    connection_id, tenant_id
                ))
            })?;

        if !connection.active {
            return Err(HubError::validation(format!(
                "connection {} is inactive",
                connection_id
            )));
        }

        // Inbound events are accepted as-is; the catalog check applies to
        // outbound events only.
        if direction == EventDirection::Outbound
            && !self
                .catalog
                .is_event_supported(&connection.connector_type, event_type)
                .await
        {
            return Err(HubError::validation(format!(
                "event type {} is not supported by connector {}",
                event_type, connection.connector_type
            )));
        }

        let event = IntegrationEvent::new(
            direction,
            tenant_id.clone(),
            connection_id.clone(),
            event_type,
            payload,
            self.clock.now(),
        );
        let event_id = event.id.clone();

        let mut table = self.table.lock();
        table.order.push(event_id.clone());
        table.events.insert(event_id.clone(), event);
        drop(table);

        debug!(
            tenant_id = %tenant_id,
            connection_id = %connection_id,
            event_type = %event_type,
            event_id = %event_id,
            direction = ?direction,
            "Event enqueued"
        );

        Ok(event_id)
    }

    async fn claim_next_batch(&self, limit: usize) -> Result<Vec<IntegrationEvent>> {
        let now = self.clock.now();
        let mut table = self.table.lock();
        let mut claimed = Vec::new();

        let order = table.order.clone();
        for id in &order {
            if claimed.len() >= limit {
                break;
            }
            let event = match table.events.get_mut(id) {
                Some(e) => e,
                None => continue,
            };
            let claimable = matches!(event.status, EventStatus::Pending | EventStatus::Retrying)
                && event.attempt_count < MAX_DELIVERY_ATTEMPTS;
            if claimable {
                event.status = EventStatus::Processing;
                event.attempt_count += 1;
                event.last_attempt_at = Some(now);
                claimed.push(event.clone());
            }
        }

        Ok(claimed)
    }

    async fn record_success(&self, event_id: &EventId) -> Result<()> {
        let now = self.clock.now();
        let mut table = self.table.lock();
        let event = table
            .events
            .get_mut(event_id)
            .ok_or_else(|| HubError::not_found("IntegrationEvent", event_id.as_str()))?;

        match event.status {
            EventStatus::Processing => {
                event.status = EventStatus::Success;
                event.processed_at = Some(now);
                debug!(event_id = %event_id, attempts = event.attempt_count, "Event succeeded");
                Ok(())
            }
            // Duplicate success report is a no-op, not an error.
            EventStatus::Success => Ok(()),
            other => Err(HubError::invalid_state(format!(
                "cannot record success for event {} in status {:?}",
                event_id, other
            ))),
        }
    }

    async fn record_failure(&self, event_id: &EventId, error_detail: &str) -> Result<()> {
        let mut table = self.table.lock();
        let event = table
            .events
            .get_mut(event_id)
            .ok_or_else(|| HubError::not_found("IntegrationEvent", event_id.as_str()))?;

        match event.status {
            EventStatus::Processing => {
                event.error_detail = Some(error_detail.to_string());
                if event.attempt_count < MAX_DELIVERY_ATTEMPTS {
                    event.status = EventStatus::Retrying;
                    debug!(
                        event_id = %event_id,
                        attempts = event.attempt_count,
                        error = %error_detail,
                        "Event attempt failed, will retry"
                    );
                } else {
                    event.status = EventStatus::Failed;
                    warn!(
                        event_id = %event_id,
                        attempts = event.attempt_count,
                        error = %error_detail,
                        "Event failed terminally"
                    );
                }
                Ok(())
            }
            // Duplicate failure report on a dead event is a no-op.
            EventStatus::Failed => Ok(()),
            other => Err(HubError::invalid_state(format!(
                "cannot record failure for event {} in status {:?}",
                event_id, other
            ))),
        }
    }

    async fn find(
        &self,
        tenant_id: &TenantId,
        event_id: &EventId,
    ) -> Result<Option<IntegrationEvent>> {
        let table = self.table.lock();
        Ok(table
            .events
            .get(event_id)
            .filter(|e| e.tenant_id == *tenant_id)
            .cloned())
    }

    async fn list_failed(&self, tenant_id: &TenantId) -> Result<Vec<IntegrationEvent>> {
        let table = self.table.lock();
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.events.get(id))
            .filter(|e| e.tenant_id == *tenant_id && e.status == EventStatus::Failed)
            .cloned()
            .collect())
    }

    async fn list_for_connection(
        &self,
        tenant_id: &TenantId,
        connection_id: &ConnectionId,
    ) -> Result<Vec<IntegrationEvent>> {
        let table = self.table.lock();
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.events.get(id))
            .filter(|e| e.tenant_id == *tenant_id && e.connection_id == *connection_id)
            .cloned()
            .collect())
    }

    async fn count_by_status(&self, tenant_id: &TenantId, status: EventStatus) -> Result<usize> {
        let table = self.table.lock();
        Ok(table
            .events
            .values()
            .filter(|e| e.tenant_id == *tenant_id && e.status == status)
            .count())
    }
}
