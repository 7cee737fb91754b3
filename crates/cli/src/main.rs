//! Partsmith CLI - Database migrations and catalog operations.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ps-cli migrate
//!
//! # Run one catalog reconciliation sweep in the foreground
//! ps-cli sweep
//!
//! # Retire a product so the storefront stops listing it
//! ps-cli retire-product 1042
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sweep` - Run a single catalog sweep against eBay
//! - `retire-product` - Soft-delete a product

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ps-cli")]
#[command(author, version, about = "Partsmith CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run one catalog reconciliation sweep and print the tally
    Sweep,
    /// Soft-delete a product so the storefront stops listing it
    RetireProduct {
        /// Product id to retire
        id: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sweep => commands::sweep::run().await?,
        Commands::RetireProduct { id } => commands::retire::run(id).await?,
    }
    Ok(())
}
