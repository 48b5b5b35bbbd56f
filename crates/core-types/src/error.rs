// In crates/core-types/src/error.rs

use thiserror::Error;

use crate::order::{OrderAction, OrderStrategy};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown order strategy: {0}")]
    UnknownStrategy(String),

    #[error("Unknown order action: {0}")]
    UnknownAction(String),

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Strategy {strategy} is not supported for {action} orders")]
    UnsupportedStrategy {
        strategy: OrderStrategy,
        action: OrderAction,
    },

    #[error("Invalid order: {reason}")]
    InvalidOrder { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
