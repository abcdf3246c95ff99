use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::engine::{AppointmentStore, Engine};
use crate::limits::*;
use crate::seed;

#[derive(Debug)]
pub enum TenantError {
    NameTooLong,
    EmptyName,
    TooManyTenants,
    Seed(crate::engine::EngineError),
}

impl std::fmt::Display for TenantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantError::NameTooLong => write!(f, "tenant name too long"),
            TenantError::EmptyName => write!(f, "empty tenant name"),
            TenantError::TooManyTenants => write!(f, "too many tenants"),
            TenantError::Seed(e) => write!(f, "seeding failed: {e}"),
        }
    }
}

impl std::error::Error for TenantError {}

/// Per-tenant engines. Tenant = database name from the pgwire connection.
/// Each tenant's appointment book is independent and lives for the process.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    seed_demo: bool,
}

impl TenantManager {
    pub fn new(seed_demo: bool) -> Self {
        Self {
            engines: DashMap::new(),
            seed_demo,
        }
    }

    pub fn tenant_count(&self) -> usize {
        self.engines.len()
    }

    /// Get or lazily create an engine for the given tenant.
    pub fn get_or_create(&self, tenant: &str) -> Result<Arc<Engine>, TenantError> {
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(TenantError::NameTooLong);
        }
        if tenant.trim().is_empty() {
            return Err(TenantError::EmptyName);
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(TenantError::TooManyTenants);
        }

        let engine = match self.engines.entry(tenant.to_string()) {
            // Another connection created it between the lookup and here.
            Entry::Occupied(e) => return Ok(e.get().clone()),
            Entry::Vacant(slot) => {
                let store = if self.seed_demo {
                    seed::seeded_store().map_err(TenantError::Seed)?
                } else {
                    AppointmentStore::new()
                };
                info!(tenant, appointments = store.len(), "tenant created");
                slot.insert(Arc::new(Engine::with_store(tenant, store))).clone()
            }
        };
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }
}
