use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use rail_core::CoreError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

pub(crate) const ACTIVE_SLOT_INDEX: &str = "tickets_active_slot_uidx";
const SERIALIZATION_FAILURE: &str = "40001";

/// Wraps any driver failure as a storage error.
pub(crate) fn storage(err: sqlx::Error) -> CoreError {
    CoreError::StorageError(err.to_string())
}

/// True when the database refused a write because the slot is already held,
/// either through the partial unique index or a serialization conflict.
pub(crate) fn is_slot_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            (db_err.is_unique_violation() && db_err.constraint() == Some(ACTIVE_SLOT_INDEX))
                || db_err.code().as_deref() == Some(SERIALIZATION_FAILURE)
        }
        _ => false,
    }
}
