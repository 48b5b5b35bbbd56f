// In crates/market-data/src/lib.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Quote, Symbol};
use std::collections::HashMap;

pub mod clock;
pub mod error;
pub mod quotes;

// Re-export public types
pub use clock::{MarketHours, SessionClock};
pub use error::{Error, Result};
pub use quotes::StaticQuoteSource;

/// Supplies market data for symbols.
///
/// Implementations own their own timeouts; a caller either gets a resolved
/// quote or an error, never a pending one.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// The name of the source (e.g., "StaticQuoteSource").
    fn name(&self) -> &'static str;

    /// Fetches the current quote for one symbol.
    async fn get_quote(&self, symbol: &Symbol) -> Result<Quote>;

    /// Fetches quotes for many symbols in one request.
    ///
    /// Symbols the source knows nothing about are left out of the map rather
    /// than failing the whole batch.
    async fn get_quotes(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Quote>>;
}

/// Knows the exchange's trading calendar.
pub trait MarketClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Whether the market is in its regular session right now.
    fn is_market_open(&self) -> bool;

    /// Whether quotes are worth polling right now (session plus buffers).
    fn is_in_poll_time(&self) -> bool;

    /// The next instant the market opens.
    fn next_market_open(&self) -> DateTime<Utc>;

    /// When polling should resume ahead of the next open. Defaults to the
    /// open itself for calendars without a pre-open window.
    fn next_poll_start(&self) -> DateTime<Utc> {
        self.next_market_open()
    }

    /// Whether `timestamp` falls on the current calendar day of the exchange.
    fn is_today(&self, timestamp: DateTime<Utc>) -> bool;

    /// A quote can trigger a fill only while the market is open and only if it
    /// traded today; stale and after-hours quotes never do.
    fn is_quote_valid(&self, quote: &Quote) -> bool {
        self.is_market_open() && self.is_today(quote.last_trade_at)
    }
}
