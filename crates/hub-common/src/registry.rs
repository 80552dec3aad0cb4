//! Connection Registry contract.
//!
//! A connection is a tenant's configured instance of a connector (credentials
//! and settings live elsewhere). The hub treats it as an opaque addressable
//! target with an active/inactive flag, looked up tenant-scoped.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ids::{ConnectionId, TenantId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub tenant_id: TenantId,
    pub connector_type: String,
    pub active: bool,
}

#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Tenant-scoped lookup: a connection belonging to another tenant is
    /// indistinguishable from a missing one.
    async fn get(&self, tenant_id: &TenantId, connection_id: &ConnectionId) -> Option<Connection>;
}

/// In-memory registry for tests and local development.
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, connection: Connection) {
        self.connections.insert(connection.id.clone(), connection);
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn get(&self, tenant_id: &TenantId, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections
            .get(connection_id)
            .filter(|c| c.tenant_id == *tenant_id)
            .map(|c| c.clone())
    }
}
