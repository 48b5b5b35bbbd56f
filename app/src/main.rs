// In app/src/main.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use core_types::OrderId;
use engine::OrderPoller;
use itertools::Itertools;
use ledger::{AccountLedger, InMemoryLedger};
use market_data::{MarketHours, SessionClock, StaticQuoteSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

mod notifications;
mod seed;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Simulated brokerage order execution.")]
struct Cli {
    /// Directory holding `base.toml` and the per-environment overrides
    /// (defaults to `config`).
    #[arg(long)]
    config_dir: Option<String>,

    /// Accounts, holdings and open orders to start from.
    #[arg(long, default_value = "config/portfolio.toml")]
    portfolio: PathBuf,

    /// JSON array of quotes served to the poller.
    #[arg(long, default_value = "config/quotes.json")]
    quotes: PathBuf,

    /// Pin the market clock to this instant (RFC 3339) instead of the system time.
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Polls open orders until interrupted.
    Run,

    /// Runs a single evaluation pass and prints the resulting portfolio.
    Pass,

    /// Cancels an open order.
    Cancel {
        /// The id the order was given when the portfolio was loaded.
        order_id: u64,
    },

    /// Prints when the next pass would run.
    NextWake,
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = match &cli.config_dir {
        Some(dir) => app_config::load_settings_from(dir)?,
        None => app_config::load_settings()?,
    };

    // --- Tracing Setup ---
    let level = settings
        .app
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(Targets::new().with_default(level));
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!(environment = %settings.app.environment, "Starting order execution service");

    // --- Component Instantiation ---
    let hours = MarketHours::from_settings(&settings.market)?;
    let clock = Arc::new(match cli.at {
        Some(at) => SessionClock::pinned(hours, at),
        None => SessionClock::new(hours),
    });

    let ledger = Arc::new(InMemoryLedger::new());
    let portfolio = app_config::load_portfolio(&cli.portfolio)
        .with_context(|| format!("Failed to load portfolio from {}", cli.portfolio.display()))?;
    let summary = seed::seed_ledger(ledger.as_ref(), &portfolio).await?;
    tracing::info!(?summary, "Ledger seeded.");

    let quotes = StaticQuoteSource::from_json_file(&cli.quotes)
        .with_context(|| format!("Failed to load quotes from {}", cli.quotes.display()))?;

    let poller = OrderPoller::new(ledger.clone(), Arc::new(quotes), clock, &settings.poller);
    let printer = notifications::spawn_printer(poller.subscribe());

    // Match on the parsed command and call the appropriate handler.
    match cli.command {
        Commands::Run => {
            tokio::select! {
                result = poller.run() => result?,
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted; shutting down."),
            }
        }
        Commands::Pass => {
            let report = poller.run_pass().await?;
            tracing::info!(?report, "Pass complete.");
            print_portfolio(ledger.as_ref()).await?;
        }
        Commands::Cancel { order_id } => {
            let canceled = poller.cancel(OrderId(order_id)).await?;
            if !canceled {
                anyhow::bail!("Order {} is not open.", order_id);
            }
            println!("Order {} canceled.", order_id);
        }
        Commands::NextWake => {
            let next = poller.next_wake();
            println!(
                "Next pass at {} (market {}).",
                next.next_wake,
                if next.market_open { "open" } else { "closed" }
            );
        }
    }

    // Dropping the poller closes the event channel and lets the printer drain.
    drop(poller);
    printer.await?;

    tracing::info!("Order execution service has finished successfully.");
    Ok(())
}

/// Prints each account's cash, positions and open orders.
async fn print_portfolio(ledger: &dyn AccountLedger) -> Result<()> {
    let holdings = ledger.holdings(None).await?.into_iter().into_group_map_by(|h| h.account_id);
    let orders = ledger.open_orders().await?.into_iter().into_group_map_by(|o| o.account_id);

    println!("\n--- Portfolio ---");
    for account in ledger.accounts().await? {
        println!("\n[{}] {} | cash: ${:.2}", account.id, account.name, account.available_funds);
        for holding in holdings.get(&account.id).into_iter().flatten() {
            println!(
                "  - {} x{} | basis ${:.2} | last ${:.2} | value ${:.2} | P&L ${:.2}",
                holding.symbol,
                holding.quantity,
                holding.cost_basis,
                holding.current_price,
                holding.market_value(),
                holding.unrealized_profit()
            );
        }
        for order in orders.get(&account.id).into_iter().flatten() {
            println!(
                "  * order {}: {} {} {} ({})",
                order.id, order.action, order.quantity, order.symbol, order.strategy
            );
        }
    }
    println!("-----------------");
    Ok(())
}
