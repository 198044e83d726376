use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::warn;

use cadence_core::Contact;

use crate::config::StoreConfig;
use crate::error::{StoreError, backend};
use crate::migrations;

/// Build `SqliteConnectOptions` from a [`StoreConfig`].
pub(crate) fn build_connect_options(
    config: &StoreConfig,
) -> Result<SqliteConnectOptions, StoreError> {
    let options = SqliteConnectOptions::from_str(&config.path)
        .map_err(|e| StoreError::Connection(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    Ok(options)
}

/// SQLite-backed store for contacts, campaigns, schedules, behaviour
/// events, and run checkpoints.
///
/// Uses `sqlx::SqlitePool` for connection pooling. Migrations run on every
/// open, so a fresh database file is usable immediately.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at the configured path and
    /// run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if pool creation fails, or
    /// [`StoreError::Backend`] if migrations fail.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let connect_options = build_connect_options(config)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, running migrations first.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database. Pooling is pinned to a single
    /// connection so the database survives for the store's lifetime.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::from_pool(pool).await
    }

    /// The underlying pool, for callers issuing their own queries.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Total contact population, the base of the daily throughput cap.
    pub async fn total_contact_count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(count)
    }

    /// One keyset page of schedulable contacts: non-empty email, state,
    /// and zip code, ordered by id, strictly after `after_id`.
    pub async fn eligible_contacts_page(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<Contact>, StoreError> {
        let rows: Vec<(i64, String, String, String, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT id, email, state, zip_code, birth_date, effective_date
                 FROM contacts
                 WHERE email IS NOT NULL AND email != ''
                 AND state IS NOT NULL AND state != ''
                 AND zip_code IS NOT NULL AND zip_code != ''
                 AND id > ?
                 ORDER BY id
                 LIMIT ?",
            )
            .bind(after_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|(id, email, state, zip_code, birth, effective)| Contact {
                id,
                email,
                state,
                zip_code,
                birth_date: parse_stored_date(birth, id, "birth_date"),
                effective_date: parse_stored_date(effective, id, "effective_date"),
            })
            .collect())
    }

    /// Fetch one contact by id.
    pub async fn contact(&self, contact_id: i64) -> Result<Option<Contact>, StoreError> {
        let row: Option<(i64, String, String, String, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT id, email, state, zip_code, birth_date, effective_date
                 FROM contacts WHERE id = ?",
            )
            .bind(contact_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(|(id, email, state, zip_code, birth, effective)| Contact {
            id,
            email,
            state,
            zip_code,
            birth_date: parse_stored_date(birth, id, "birth_date"),
            effective_date: parse_stored_date(effective, id, "effective_date"),
        }))
    }
}

/// Parse an optional stored ISO date. Malformed values are logged and
/// treated as absent so one bad row cannot halt a pass.
pub(crate) fn parse_stored_date(
    raw: Option<String>,
    contact_id: i64,
    column: &str,
) -> Option<NaiveDate> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<NaiveDate>() {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(contact_id, column, value = %raw, "ignoring malformed stored date");
            None
        }
    }
}
