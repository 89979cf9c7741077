//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open a transaction when several calls must be atomic,
//! and pass `&mut tx` through without any other changes.
use std::{
    env,
    ops::{Deref, DerefMut},
    str::FromStr,
};

use log::*;
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    Sqlite,
    SqliteConnection,
    SqlitePool,
};

pub mod codes;
pub mod documents;
pub mod meetings;
pub mod orders;
pub mod payments;
pub mod services;

const SQLITE_DB_URL: &str = "sqlite://data/booking_store.db";

pub fn db_url() -> String {
    let result = env::var("BKS_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ BKS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Opens a pool on `url`, creating the database file if it does not exist yet. Foreign key enforcement is on.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// True if `e` is a unique-constraint violation.
pub(crate) fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db_err) if db_err.is_unique_violation())
}

/// A write transaction opened with `BEGIN IMMEDIATE`.
///
/// A deferred transaction that reads before it writes has to upgrade its lock, and SQLite fails that upgrade with
/// "database is locked" straight away when another connection got in first. Taking the write lock up front makes
/// concurrent writers queue behind the pool's busy timeout instead.
///
/// The transaction derefs to its connection, so `&mut tx` can be passed to any of the functions in this module.
/// Dropping it without calling [`WriteTransaction::commit`] rolls it back.
pub struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, SqlxError> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    pub async fn commit(mut self) -> Result<(), SqlxError> {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
                // hand it back so that drop rolls it back
                self.conn = Some(conn);
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        // `conn` is only taken by `commit` and `drop`, and both consume the transaction
        self.conn.as_deref().expect("write transaction used after it finished")
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_deref_mut().expect("write transaction used after it finished")
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        warn!("🗃️ Could not roll back a write transaction. Closing its connection. {e}");
                        drop(conn.detach());
                    }
                });
            },
            // Closing the connection rolls back whatever it had open
            Err(_) => drop(conn.detach()),
        }
    }
}
