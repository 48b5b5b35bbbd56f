// In crates/app-config/src/types.rs

use core_types::{OrderAction, OrderStrategy};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Trading session of the exchange the quotes come from.
    pub market: MarketSettings,
    /// How often open orders are re-evaluated.
    pub poller: PollerSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MarketSettings {
    /// Local opening time, "HH:MM".
    pub open_time: String,
    /// Local closing time, "HH:MM".
    pub close_time: String,
    /// Offset of the exchange's local time from UTC (e.g., -300 for New York winter time).
    pub utc_offset_minutes: i32,
    /// Polling starts this long before the open.
    #[serde(default)]
    pub pre_open_buffer_minutes: i64,
    /// Polling continues this long after the close so the closing quotes are picked up.
    #[serde(default = "default_post_close_buffer")]
    pub post_close_buffer_minutes: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PollerSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

// --- Structs for the portfolio seed file ---

/// Accounts, holdings and open orders the in-memory ledger starts with.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct PortfolioConfig {
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
    #[serde(default)]
    pub holdings: Vec<HoldingSeed>,
    #[serde(default)]
    pub orders: Vec<OrderSeed>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AccountSeed {
    pub name: String,
    pub available_funds: Decimal,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub exclude_from_totals: bool,
}

/// A position held before the first run. `account` names an [`AccountSeed`].
#[derive(Deserialize, Debug, Clone)]
pub struct HoldingSeed {
    pub account: String,
    pub symbol: String,
    pub quantity: i64,
    pub cost_basis: Decimal,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OrderSeed {
    pub account: String,
    pub symbol: String,
    pub action: OrderAction,
    pub strategy: OrderStrategy,
    pub quantity: i64,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub stop_percent: Option<Decimal>,
}

/// Helper functions for serde defaults
fn default_post_close_buffer() -> i64 { 15 }
fn default_poll_interval() -> u64 { 60 }
