/*
 *  Copyright 2025 Aviso Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Database connection management for the notification ledger.
//!
//! The ledger is a SQLite database accessed through a `deadpool-diesel`
//! async pool. It records the side-effect evidence of the pipeline
//! (idempotency locks, persisted recipient lists, per-recipient email
//! statuses) and mirrors the read model for users and children.
//!
//! SQLite has limited concurrent write support even with WAL mode, so the
//! pool is sized to a single connection; every DAL operation funnels
//! through `conn.interact` on that connection.

pub mod schema;

use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use deadpool_diesel::sqlite::{Manager as SqliteManager, Pool as SqlitePool, Runtime};

/// Embedded migrations compiled into the library.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// A pooled handle to the ledger database.
///
/// `Database` is `Clone`; each clone references the same underlying pool
/// and can be shared freely between concurrent handler invocations.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database(sqlite)")
    }
}

impl Database {
    /// Creates a new connection pool for the given SQLite location.
    ///
    /// Accepts a file path, `:memory:`, a `sqlite://` URL, or a shared-cache
    /// URI such as `file:ledger?mode=memory&cache=shared`.
    ///
    /// # Panics
    ///
    /// Panics if the pool cannot be created.
    pub fn new(connection_string: &str) -> Self {
        let url = Self::build_sqlite_url(connection_string);
        let manager = SqliteManager::new(url, Runtime::Tokio1);
        // Single connection: avoids "database is locked" errors under
        // concurrent handler invocations.
        let pool = SqlitePool::builder(manager)
            .max_size(1)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: 1)");

        Self { pool }
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Strips the `sqlite://` prefix if present.
    fn build_sqlite_url(connection_string: &str) -> String {
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending migrations and sets concurrency pragmas.
    pub async fn run_migrations(&self) -> Result<(), String> {
        let conn = self.pool.get().await.map_err(|e| e.to_string())?;
        conn.interact(|conn| {
            // WAL mode allows concurrent reads during writes;
            // busy_timeout makes SQLite wait instead of failing on locks.
            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| format!("Failed to set WAL mode: {}", e))?;
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| format!("Failed to set busy_timeout: {}", e))?;

            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to run migrations: {}", e))?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| format!("Failed to run migrations: {}", e))??;
        Ok(())
    }
}

/// Runs migrations against a raw connection, for test setup.
pub fn run_migrations_sync(conn: &mut SqliteConnection) -> Result<(), String> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("Failed to run migrations: {}", e))?;
    Ok(())
}
