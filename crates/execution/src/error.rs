// In crates/execution/src/error.rs

use core_types::{AccountId, OrderId, Symbol};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Quote for {quote_symbol} cannot be used to evaluate an order on {order_symbol}")]
    QuoteMismatch {
        order_symbol: Symbol,
        quote_symbol: Symbol,
    },

    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] core_types::Error),

    #[error("Order {order_id} has no {field}")]
    MissingPrice {
        order_id: OrderId,
        field: &'static str,
    },

    #[error("Can't sell what you don't own: account {account_id} holds no {symbol}")]
    NoHolding { symbol: Symbol, account_id: AccountId },

    #[error("Selling too many shares of {symbol}: requested {requested}, held {held}")]
    Oversell {
        symbol: Symbol,
        requested: i64,
        held: i64,
    },

    #[error("Order {order_id} amounts exceed the representable range")]
    AmountOverflow { order_id: OrderId },

    #[error("Insufficient funds: order costs {required}, {available} available")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Order {0} is no longer open")]
    OrderNotOpen(OrderId),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::Error),
}

/// How the host should treat an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad order or bad data. Mark the order ERROR; retrying cannot help.
    Configuration,
    /// A business rule rejected the trade (e.g. insufficient funds).
    BusinessRule,
    /// Someone else moved the order out of OPEN first.
    Conflict,
    /// The ledger failed; the settlement was rolled back.
    Persistence,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::QuoteMismatch { .. }
            | Error::InvalidOrder(_)
            | Error::MissingPrice { .. }
            | Error::NoHolding { .. }
            | Error::Oversell { .. }
            | Error::AmountOverflow { .. } => ErrorKind::Configuration,
            Error::InsufficientFunds { .. } => ErrorKind::BusinessRule,
            Error::OrderNotOpen(_) => ErrorKind::Conflict,
            Error::Ledger(_) => ErrorKind::Persistence,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
