//! Heron CLI - Database migrations and operational tools.
//!
//! # Usage
//!
//! ```bash
//! # Run fulfillment database migrations
//! heron-cli migrate
//!
//! # Seed the catalog with demo products
//! heron-cli seed --products 20
//!
//! # Run one expiry sweep and exit
//! heron-cli sweep
//!
//! # Sweep with a shorter timeout than the service default
//! heron-cli sweep --timeout-minutes 5 --cancel
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed the catalog with demo products
//! - `sweep` - Run one expiry sweep pass

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "heron-cli")]
#[command(author, version, about = "Heron fulfillment CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fulfillment database migrations
    Migrate,
    /// Seed the catalog with demo products
    Seed {
        /// Number of products to create
        #[arg(short, long, default_value_t = 20)]
        products: u32,
    },
    /// Run one expiry sweep pass and print the report
    Sweep {
        /// Reservation timeout in minutes (default matches the service)
        #[arg(long, default_value_t = 30)]
        timeout_minutes: u64,

        /// Also cancel expired orders instead of only releasing stock
        #[arg(long)]
        cancel: bool,
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
        Commands::Migrate => commands::migrate::fulfillment().await?,
        Commands::Seed { products } => commands::seed::products(products).await?,
        Commands::Sweep {
            timeout_minutes,
            cancel,
        } => commands::sweep::run(timeout_minutes, cancel).await?,
    }
    Ok(())
}
