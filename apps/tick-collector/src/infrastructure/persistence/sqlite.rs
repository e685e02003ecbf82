//! SQLite trade store.
//!
//! Durable [`TradeStore`] backed by a single SQLite file via `SQLx`. The pool
//! holds one connection so there is exactly one writer; WAL journaling with
//! `synchronous = FULL` makes every acknowledged insert survive a crash.
//!
//! Dedup relies on a unique index over `trade_id` rather than a column
//! constraint, so databases created without the constraint are upgraded in
//! place by [`initialize`](TradeStore::initialize).

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::application::ports::{InsertOutcome, StorageError, StoredTrade, TradeStore};
use crate::domain::trade::TradeEvent;
use crate::infrastructure::config::DatabaseSettings;

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS tick_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        trade_id INTEGER NOT NULL,
        price REAL NOT NULL,
        size REAL NOT NULL,
        side TEXT NOT NULL,
        time TEXT NOT NULL
    )
";

const CREATE_TRADE_ID_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_tick_data_trade_id ON tick_data (trade_id)";

fn connection_error(err: sqlx::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

fn query_error(err: sqlx::Error) -> StorageError {
    StorageError::Query(err.to_string())
}

/// SQLite-backed trade store.
#[derive(Debug, Clone)]
pub struct SqliteTradeStore {
    pool: SqlitePool,
}

impl SqliteTradeStore {
    /// Open (creating if needed) the database file described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub async fn open(settings: &DatabaseSettings) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(&settings.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(settings.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(connection_error)?;

        info!(path = %settings.path.display(), "SQLite trade store opened");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for in-flight statements.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("SQLite trade store closed");
    }

    fn stored_trade(row: &SqliteRow) -> Result<StoredTrade, StorageError> {
        Ok(StoredTrade {
            id: row.try_get("id").map_err(query_error)?,
            trade_id: row.try_get("trade_id").map_err(query_error)?,
            price: row.try_get("price").map_err(query_error)?,
            size: row.try_get("size").map_err(query_error)?,
            side: row.try_get("side").map_err(query_error)?,
            time: row.try_get("time").map_err(query_error)?,
        })
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        sqlx::query(CREATE_TRADE_ID_INDEX)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

        debug!("tick_data schema ready");
        Ok(())
    }

    async fn insert(&self, event: &TradeEvent) -> Result<InsertOutcome, StorageError> {
        let encoding = |field: &str| StorageError::Encoding {
            trade_id: event.trade_id(),
            reason: format!("{field} is not representable as REAL"),
        };
        let price = event.price().to_f64().ok_or_else(|| encoding("price"))?;
        let size = event.size().to_f64().ok_or_else(|| encoding("size"))?;

        let result = sqlx::query(
            r"
            INSERT INTO tick_data (trade_id, price, size, side, time)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (trade_id) DO NOTHING
            ",
        )
        .bind(event.trade_id())
        .bind(price)
        .bind(size)
        .bind(event.side().as_str())
        .bind(event.trade_time())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn find_by_trade_id(&self, trade_id: i64) -> Result<Option<StoredTrade>, StorageError> {
        let row = sqlx::query(
            "SELECT id, trade_id, price, size, side, time FROM tick_data WHERE trade_id = ?1",
        )
        .bind(trade_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.as_ref().map(Self::stored_trade).transpose()
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tick_data")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;

        u64::try_from(count).map_err(|e| StorageError::Query(e.to_string()))
    }
}
