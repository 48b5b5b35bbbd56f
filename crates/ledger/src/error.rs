// In crates/ledger/src/error.rs

use crate::LedgerOp;
use core_types::{AccountId, OrderId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] core_types::Error),
    #[error("Ledger operation {0:?} failed")]
    OperationFailed(LedgerOp),
}

pub type Result<T> = std::result::Result<T, Error>;
