//! Connector Catalog contract.
//!
//! The catalog is external, read-only reference data: it enumerates connector
//! types with their supported event/action names and configuration schema.
//! The hub consumes it for enqueue-time validation and never mutates it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[async_trait]
pub trait ConnectorCatalog: Send + Sync {
    async fn is_event_supported(&self, connector_type: &str, event_type: &str) -> bool;
    async fn is_action_supported(&self, connector_type: &str, action_name: &str) -> bool;
    async fn config_schema(&self, connector_type: &str) -> Option<serde_json::Value>;
}

/// One catalog entry: a connector type with its supported events, actions,
/// and JSON-schema-shaped configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorSpec {
    pub connector_type: String,
    #[serde(default)]
    pub supported_events: Vec<String>,
    #[serde(default)]
    pub supported_actions: Vec<String>,
    #[serde(default)]
    pub config_schema: serde_json::Value,
}

/// In-memory catalog built from a fixed set of connector specs, e.g. loaded
/// from the catalog service's JSON export at startup.
pub struct StaticCatalog {
    specs: HashMap<String, ConnectorSpec>,
}

impl StaticCatalog {
    pub fn new(specs: Vec<ConnectorSpec>) -> Self {
        Self {
            specs: specs
                .into_iter()
                .map(|s| (s.connector_type.clone(), s))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let specs: Vec<ConnectorSpec> = serde_json::from_str(json)?;
        Ok(Self::new(specs))
    }
}

#[async_trait]
impl ConnectorCatalog for StaticCatalog {
    async fn is_event_supported(&self, connector_type: &str, event_type: &str) -> bool {
        self.specs
            .get(connector_type)
            .map(|s| s.supported_events.iter().any(|e| e == event_type))
            .unwrap_or(false)
    }

    async fn is_action_supported(&self, connector_type: &str, action_name: &str) -> bool {
        self.specs
            .get(connector_type)
            .map(|s| s.supported_actions.iter().any(|a| a == action_name))
            .unwrap_or(false)
    }

    async fn config_schema(&self, connector_type: &str) -> Option<serde_json::Value> {
        self.specs.get(connector_type).map(|s| s.config_schema.clone())
    }
}
