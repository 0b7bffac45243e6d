//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! lattice-cli migrate sessions
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string; falls back
//!   to `DATABASE_URL`

use secrecy::SecretString;

use super::CommandError;

fn database_url() -> Result<SecretString, CommandError> {
    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Create the tower-sessions table used to persist carts.
///
/// # Errors
///
/// Returns error if the database URL is missing or the migration fails.
pub async fn sessions() -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    let database_url = database_url()?;

    tracing::info!("Connecting to session database...");
    let pool = lattice_storefront::db::create_pool(&database_url).await?;

    tracing::info!("Creating sessions table...");
    lattice_storefront::db::migrate_sessions(&pool).await?;

    tracing::info!("Session migrations complete!");
    Ok(())
}
