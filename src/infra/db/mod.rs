//! Postgres-backed repository implementations.

mod certificates;
mod jobs;
mod processed_events;
mod util;

pub use util::map_sqlx_error;

use std::{sync::Arc, time::Duration};

use apalis_sql::postgres::PostgresStorage;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::RepoError;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
    }

    /// Install the apalis queue tables, then the certificate schema.
    ///
    /// Both migrators share `_sqlx_migrations`, so each must ignore the other's versions.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        PostgresStorage::migrations()
            .set_ignore_missing(true)
            .run(pool)
            .await?;
        sqlx::migrate!("./migrations")
            .set_ignore_missing(true)
            .run(pool)
            .await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
