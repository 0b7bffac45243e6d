//! Lattice CLI - session migrations and operational checks.
//!
//! # Usage
//!
//! ```bash
//! # Create the sessions table
//! lattice-cli migrate sessions
//!
//! # Validate a local catalog file
//! lattice-cli catalog check products.json
//!
//! # Fetch the tax rate from the configured source
//! lattice-cli tax fetch
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lattice-cli")]
#[command(author, version, about = "Lattice storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Inspect catalog data
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Inspect the tax source
    Tax {
        #[command(subcommand)]
        action: TaxAction,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Create the tower-sessions table
    Sessions,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Validate a JSON product file
    Check {
        /// Path to the product file
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum TaxAction {
    /// Fetch the current tax rate
    Fetch {
        /// Tax document URL (defaults to `TAX_SOURCE_URL`)
        #[arg(short, long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Sessions => commands::migrate::sessions().await?,
        },
        Commands::Catalog { action } => match action {
            CatalogAction::Check { path } => commands::catalog::check(&path)?,
        },
        Commands::Tax { action } => match action {
            TaxAction::Fetch { url } => commands::tax::fetch(url).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_catalog_check() {
        let cli = Cli::try_parse_from(["lattice-cli", "catalog", "check", "products.json"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Catalog {
                action: CatalogAction::Check { .. }
            })
        ));
    }
}
