use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::debug;

#[cfg(test)]
mod tests;

pub mod ledger;
pub mod models;
pub mod queries;
pub mod store;

pub use ledger::UsageLedger;
pub use store::{NamespaceInfo, NamespaceStore};

pub type DbPool = Pool<Sqlite>;

/// Schema of a persisted namespace's `index.db`
pub static NAMESPACE_MIGRATOR: Migrator = sqlx::migrate!("src/database/sqlite/migrations/namespace");

/// Schema of the usage ledger
pub static USAGE_MIGRATOR: Migrator = sqlx::migrate!("src/database/sqlite/migrations/usage");

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (creating if needed) a database file and bring its schema up to date
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P, migrator: &Migrator) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations(migrator).await?;

        Ok(database)
    }

    /// Open an existing database file without writing to it
    #[inline]
    pub async fn open_read_only<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(false)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open database")?;

        Ok(Self { pool })
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self, migrator: &Migrator) -> Result<()> {
        debug!("Running database migrations");

        migrator
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Close every connection, flushing the database file
    #[inline]
    pub async fn close(self) {
        self.pool.close().await;
    }
}
