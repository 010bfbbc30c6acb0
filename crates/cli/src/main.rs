//! Stockroom CLI - ledger migrations and operator commands.
//!
//! # Usage
//!
//! ```bash
//! # Apply the ledger schema
//! stockroom migrate
//!
//! # Receive purchase order 12 (no-op if it already arrived)
//! stockroom receive-po 12
//!
//! # Void customer order 40 as a named operator
//! stockroom --actor alice void 40
//!
//! # Inspect a variant
//! stockroom stock 3
//! stockroom lots 3
//! stockroom history 3
//!
//! # List every order
//! stockroom orders
//! stockroom purchase-orders
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `receive-po` - Receive a purchase order into stock
//! - `void` - Void a customer order and restock its units
//! - `stock` - Available units for a variant
//! - `lots` - A variant's lots in FIFO order
//! - `history` - A variant's stock changes, newest first
//! - `orders` - Customer orders with lines, newest first
//! - `purchase-orders` - Purchase orders with lines, oldest first
//!
//! Results are printed to stdout as JSON; logs go to stderr and are
//! filtered with `RUST_LOG`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(author, version, about = "Stockroom ledger tools")]
struct Cli {
    /// Actor recorded on stock changes (overrides `LEDGER_ACTOR`)
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Receive a purchase order into stock
    ReceivePo {
        /// Purchase order ID
        id: i32,
    },
    /// Void a customer order and restock its units
    Void {
        /// Customer order ID
        order_id: i32,
    },
    /// Show available units for a variant
    Stock {
        /// Product variant ID
        variant_id: i32,
    },
    /// List a variant's lots in FIFO order
    Lots {
        /// Product variant ID
        variant_id: i32,
    },
    /// List a variant's stock changes, newest first
    History {
        /// Product variant ID
        variant_id: i32,
    },
    /// List customer orders, newest first
    Orders,
    /// List purchase orders, oldest first
    PurchaseOrders,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = commands::Context::from_env(cli.actor.as_deref()).await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&ctx).await?,
        Commands::ReceivePo { id } => commands::ledger::receive_po(&ctx, id.into()).await?,
        Commands::Void { order_id } => commands::ledger::void(&ctx, order_id.into()).await?,
        Commands::Stock { variant_id } => {
            commands::ledger::stock(&ctx, variant_id.into()).await?;
        }
        Commands::Lots { variant_id } => commands::ledger::lots(&ctx, variant_id.into()).await?,
        Commands::History { variant_id } => {
            commands::ledger::history(&ctx, variant_id.into()).await?;
        }
        Commands::Orders => commands::ledger::orders(&ctx).await?,
        Commands::PurchaseOrders => commands::ledger::purchase_orders(&ctx).await?,
    }
    Ok(())
}
