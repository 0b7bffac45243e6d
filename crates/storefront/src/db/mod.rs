//! Session database.
//!
//! `PostgreSQL` holds nothing but tower-sessions rows. The `sessions`
//! table is created by:
//! ```bash
//! cargo run -p lattice-cli -- migrate sessions
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_sessions_sqlx_store::PostgresStore;

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Session store over `pool`.
#[must_use]
pub fn session_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
}

/// Create the sessions schema and table if missing.
///
/// # Errors
///
/// Returns `sqlx::Error` if the migration query fails.
pub async fn migrate_sessions(pool: &PgPool) -> Result<(), sqlx::Error> {
    session_store(pool).migrate().await
}
