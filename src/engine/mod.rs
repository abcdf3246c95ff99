mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use conflict::parse_time_to_minutes;
pub use error::EngineError;
pub use store::AppointmentStore;

use tokio::sync::RwLock;

/// One tenant's appointment book. The store itself assumes a single caller;
/// the engine serializes access so concurrent connections keep the
/// no-overlap and unique-id invariants. Queries share a read lock, every
/// mutation holds the write lock across its check-then-append.
pub struct Engine {
    tenant: String,
    store: RwLock<AppointmentStore>,
}

impl Engine {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self::with_store(tenant, AppointmentStore::new())
    }

    pub fn with_store(tenant: impl Into<String>, store: AppointmentStore) -> Self {
        Self {
            tenant: tenant.into(),
            store: RwLock::new(store),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}
