use std::sync::Arc;

use rail_core::repository::{CatalogReader, CatalogSeeder, OrderStore, PassengerDirectory};

pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod order_repo;

pub use app_config::Config;
pub use catalog_repo::PostgresCatalogRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use order_repo::PostgresOrderRepository;

/// The store handles the services are built from.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogReader>,
    pub seeder: Arc<dyn CatalogSeeder>,
    pub passengers: Arc<dyn PassengerDirectory>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// Every handle backed by one shared in-process store.
    pub fn memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            catalog: store.clone(),
            seeder: store.clone(),
            passengers: store.clone(),
            orders: store,
        }
    }

    pub fn postgres(db: &DbClient) -> Self {
        let catalog = Arc::new(PostgresCatalogRepository::new(db.pool.clone()));
        Self {
            catalog: catalog.clone(),
            seeder: catalog.clone(),
            passengers: catalog,
            orders: Arc::new(PostgresOrderRepository::new(db.pool.clone())),
        }
    }
}
