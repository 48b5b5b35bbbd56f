// In crates/market-data/src/quotes.rs

use crate::{Error, QuoteSource, Result};
use async_trait::async_trait;
use core_types::{Quote, Symbol};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// An in-memory quote board.
///
/// Quotes are pushed in by the host (or loaded from a JSON file) and served
/// back as they are.
#[derive(Debug, Default)]
pub struct StaticQuoteSource {
    quotes: RwLock<HashMap<Symbol, Quote>>,
}

impl StaticQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quotes(quotes: impl IntoIterator<Item = Quote>) -> Self {
        let source = Self::new();
        for quote in quotes {
            source.set_quote(quote);
        }
        source
    }

    /// Loads a JSON array of quotes.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let quotes: Vec<Quote> = serde_json::from_str(content)?;
        tracing::debug!(count = quotes.len(), "Loaded quotes.");
        Ok(Self::with_quotes(quotes))
    }

    /// Inserts or replaces the quote for its symbol.
    pub fn set_quote(&self, quote: Quote) {
        self.quotes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(quote.symbol.clone(), quote);
    }
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
    fn name(&self) -> &'static str {
        "StaticQuoteSource"
    }

    async fn get_quote(&self, symbol: &Symbol) -> Result<Quote> {
        self.quotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned()
            .ok_or_else(|| Error::QuoteNotFound(symbol.clone()))
    }

    async fn get_quotes(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Quote>> {
        let quotes = self.quotes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(symbols
            .iter()
            .filter_map(|s| quotes.get(s).map(|q| (s.clone(), q.clone())))
            .collect())
    }
}
