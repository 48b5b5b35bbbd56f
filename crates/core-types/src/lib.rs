// In crates/core-types/src/lib.rs

pub mod error;
pub mod order;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use error::{Error, Result};
pub use order::{NewOrder, Order, OrderAction, OrderResult, OrderStatus, OrderStrategy};
pub use types::{
    Account, AccountId, CashTransaction, Holding, NewCashTransaction, OrderId, Quote, Symbol,
    TransactionId, TransactionKind,
};
