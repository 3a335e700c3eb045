use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, PoolError};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("database error: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("stored value could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Applied to every pooled connection when it is handed out.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL;")
            .map_err(r2d2::Error::QueryError)
    }
}

/// Pooled SQLite store.
///
/// Ordinary operations share the read side of `gate`, ping the connection and
/// then run. Schema maintenance takes the write side so it never interleaves
/// with a running operation.
pub struct Store {
    pool: DbPool,
    gate: RwLock<()>,
}

impl Store {
    /// Build a pool for `database_url` and bring the schema up to date.
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = r2d2::Pool::builder()
            .connection_customizer(Box::new(ConnectionOptions))
            .build(manager)?;

        let store = Self::from_pool(pool);
        store.migrate()?;
        Ok(store)
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            pool,
            gate: RwLock::new(()),
        }
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        let _guard = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let mut conn = self.pool.get()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        if !applied.is_empty() {
            log::info!("Applied {} database migrations", applied.len());
        }
        Ok(())
    }

    /// Run `op` on a pooled connection after checking the connection is alive.
    pub fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError>,
    {
        let _guard = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let mut conn = self.pool.get()?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        op(&mut conn)
    }

    /// Same as [`Store::with_conn`], moved onto the blocking thread pool.
    pub async fn run<T, F>(self: &Arc<Self>, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || store.with_conn(op))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}
