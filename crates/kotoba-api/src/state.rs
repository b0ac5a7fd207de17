use kotoba_db::store::{MemoryStateStore, PgStateStore, Store};
use kotoba_srs::{Scheduler, SystemClock};

use crate::config::{ApiConfig, StoreBackend};

/// Shared application state: the store strategy, the scheduler with its
/// policy table, and the clock, all injected at construction time.
#[derive(Debug, Clone)]
pub struct ApiState {
    /// State-store strategy selected from configuration.
    pub store: Store,
    /// The SRS scheduler.
    pub scheduler: Scheduler,
    /// Time source for due queries and grading instants.
    pub clock: SystemClock,
}

impl ApiState {
    /// Build the state from configuration.
    ///
    /// For the Postgres backend this connects the pool and runs migrations;
    /// the memory backend starts empty.
    pub async fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let store = match config.store_backend {
            StoreBackend::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for the postgres store backend"))?;

                let pool = kotoba_db::create_pool(database_url, config.max_db_connections).await?;
                kotoba_db::ensure_db_and_migrate(database_url, &pool).await?;
                Store::Postgres(PgStateStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("using the in-memory state store; nothing will be persisted");
                Store::Memory(MemoryStateStore::new())
            }
        };

        Ok(Self::with_store(store))
    }

    /// Assemble the state around an already-built store. Used by tests.
    pub fn with_store(store: Store) -> Self {
        Self {
            store,
            scheduler: Scheduler::default(),
            clock: SystemClock,
        }
    }
}
