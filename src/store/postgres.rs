//! PostgreSQL store.
//!
//! # Responsibilities
//! - Connect with a bounded pool, retrying while the database comes up
//! - Create the `thing` table on first use
//! - Map rows to and from `Thing`

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

use super::{new_id, StoreError, ThingStore};
use crate::config::StorageConfig;
use crate::proto::Thing;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS thing (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL DEFAULT ''
)";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Store backed by a PostgreSQL `thing` table.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect using the storage settings, retrying `retries` times with
    /// `sleep_between_retries_secs` between attempts.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StoreError> {
        let options = connect_options(config)?;
        let attempts = config.retries.max(1);
        let pause = Duration::from_secs(config.sleep_between_retries_secs);

        let mut attempt = 1;
        let pool = loop {
            let result = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(options.clone())
                .await;
            match result {
                Ok(pool) => break pool,
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        host = %config.host,
                        database = %config.database,
                        attempt,
                        error = %e,
                        "Database connection failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(pause).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        sqlx::query(CREATE_TABLE).execute(&pool).await?;

        tracing::info!(
            storage = "postgres",
            host = %config.host,
            database = %config.database,
            "Connected to database"
        );
        Ok(Self { pool })
    }
}

fn connect_options(config: &StorageConfig) -> Result<PgConnectOptions, StoreError> {
    let ssl_mode: PgSslMode = config
        .sslmode
        .parse()
        .map_err(|e: sqlx::Error| StoreError::Backend(format!("invalid sslmode {:?}: {}", config.sslmode, e)))?;

    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(ssl_mode))
}

#[async_trait]
impl ThingStore for PostgresStore {
    async fn find(&self) -> Result<Vec<Thing>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, name FROM thing ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, name)| Thing { id, name }).collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Thing, StoreError> {
        let (id, name): (String, String) = sqlx::query_as("SELECT id, name FROM thing WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Thing { id, name })
    }

    async fn save(&self, mut thing: Thing) -> Result<String, StoreError> {
        if thing.id.is_empty() {
            thing.id = new_id();
        }
        sqlx::query(
            "INSERT INTO thing (id, name) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(&thing.id)
        .bind(&thing.name)
        .execute(&self.pool)
        .await?;
        Ok(thing.id)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM thing WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
