// In crates/market-data/src/error.rs

use core_types::Symbol;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No quote available for {0}")]
    QuoteNotFound(Symbol),
    #[error("Invalid market schedule: {0}")]
    InvalidSchedule(String),
    #[error("Failed to read quote file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
