//! CLI subcommand implementations.

pub mod catalog;
pub mod migrate;
pub mod tax;

/// Errors shared by the subcommands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] lattice_storefront::catalog::CatalogError),

    #[error("Tax source error: {0}")]
    TaxSource(#[from] lattice_storefront::services::TaxSourceError),
}
