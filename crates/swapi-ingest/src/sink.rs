//! Persistence sink
//!
//! The sink receives normalized rows group by group and makes them durable
//! with a single commit at the end of the run. Nothing is visible to other
//! readers before that commit, and a sink dropped without committing rolls
//! everything back.

use async_trait::async_trait;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{Any, AnyPool, Row, Transaction};
use swapi_common::types::PersonRow;
use swapi_common::{Result, SwapiError};
use tracing::{debug, info};

/// Destination of resolved, normalized rows
#[async_trait]
pub trait RecordSink: Send {
    /// Create the target table if it does not exist yet
    async fn ensure_schema(&mut self) -> Result<()>;

    /// Buffer one batch of rows; returns the number of rows written
    async fn insert_batch(&mut self, rows: &[PersonRow]) -> Result<u64>;

    /// Make every buffered row durable
    async fn commit(self) -> Result<()>
    where
        Self: Sized;
}

const CREATE_PERSONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS persons (
        id INTEGER PRIMARY KEY,
        name VARCHAR(40) NOT NULL,
        gender VARCHAR(20),
        homeworld VARCHAR(40),
        birth_year VARCHAR(10),
        height DOUBLE PRECISION,
        mass DOUBLE PRECISION,
        hair_color VARCHAR(60),
        skin_color VARCHAR(60),
        eye_color VARCHAR(60),
        species TEXT,
        vehicles TEXT,
        starships TEXT,
        films TEXT
    )
"#;

const INSERT_PERSON: &str = r#"
    INSERT INTO persons (
        id, name, gender, homeworld, birth_year, height, mass,
        hair_color, skin_color, eye_color, species, vehicles, starships, films
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
"#;

/// SQL sink over `sqlx`'s `Any` driver (PostgreSQL or SQLite by URL)
pub struct SqlSink {
    pool: AnyPool,
    tx: Option<Transaction<'static, Any>>,
    inserted: u64,
}

impl SqlSink {
    /// Connect to `database_url`.
    ///
    /// An in-memory SQLite database only exists on one connection, so the
    /// pool is pinned to a single connection for such URLs.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        install_default_drivers();

        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            max_connections
        };

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(database_url)
            .await
            .map_err(|e| SwapiError::sink(format!("Failed to connect: {}", e)))?;

        info!(max_connections, "Connected to sink database");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self {
            pool,
            tx: None,
            inserted: 0,
        }
    }

    /// Handle on the underlying pool, e.g. for reading back after commit
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    /// Rows currently stored in `persons`, outside the pending transaction
    pub async fn count_rows(pool: &AnyPool) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM persons")
            .fetch_one(pool)
            .await
            .map_err(|e| SwapiError::sink(format!("Failed to count rows: {}", e)))?;
        row.try_get::<i64, _>("count")
            .map_err(|e| SwapiError::sink(format!("Failed to read count: {}", e)))
    }

    async fn transaction(&mut self) -> Result<&mut Transaction<'static, Any>> {
        if self.tx.is_none() {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| SwapiError::sink(format!("Failed to begin transaction: {}", e)))?;
            self.tx = Some(tx);
        }
        self.tx
            .as_mut()
            .ok_or_else(|| SwapiError::sink("transaction unavailable"))
    }
}

#[async_trait]
impl RecordSink for SqlSink {
    async fn ensure_schema(&mut self) -> Result<()> {
        sqlx::query(CREATE_PERSONS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| SwapiError::sink(format!("Failed to create schema: {}", e)))?;
        debug!("Schema ready");
        Ok(())
    }

    async fn insert_batch(&mut self, rows: &[PersonRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = self.transaction().await?;
        let mut written = 0u64;

        for row in rows {
            let result = sqlx::query(INSERT_PERSON)
                .bind(row.id)
                .bind(row.name.clone())
                .bind(row.gender.clone())
                .bind(row.homeworld.clone())
                .bind(row.birth_year.clone())
                .bind(row.height)
                .bind(row.mass)
                .bind(row.hair_color.clone())
                .bind(row.skin_color.clone())
                .bind(row.eye_color.clone())
                .bind(row.species.clone())
                .bind(row.vehicles.clone())
                .bind(row.starships.clone())
                .bind(row.films.clone())
                .execute(&mut **tx)
                .await
                .map_err(|e| SwapiError::sink(format!("Failed to insert id {}: {}", row.id, e)))?;
            written += result.rows_affected();
        }

        self.inserted += written;
        debug!(written, pending = self.inserted, "Batch buffered");
        Ok(written)
    }

    async fn commit(self) -> Result<()> {
        match self.tx {
            Some(tx) => {
                tx.commit()
                    .await
                    .map_err(|e| SwapiError::sink(format!("Failed to commit: {}", e)))?;
                info!(rows = self.inserted, "Committed");
            },
            None => info!("Nothing to commit"),
        }
        Ok(())
    }
}
