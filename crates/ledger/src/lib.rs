// In crates/ledger/src/lib.rs

use async_trait::async_trait;
use core_types::{
    Account, AccountId, CashTransaction, Holding, NewCashTransaction, NewOrder, Order, OrderId,
    OrderStatus, Quote, Symbol, TransactionId,
};
use rust_decimal::Decimal;

pub mod error;
pub mod memory;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use memory::InMemoryLedger;

/// Names each ledger operation, so a failure can be pinned on one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    Begin,
    GetAccount,
    UpdateAccount,
    GetHolding,
    UpsertHolding,
    DeleteHolding,
    InsertTransaction,
    UpdateOrder,
    Commit,
}

/// An account about to be opened.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub available_funds: Decimal,
    pub strategy: String,
    pub exclude_from_totals: bool,
}

/// One all-or-nothing unit of work against the ledger.
///
/// Nothing written through a transaction is visible until [`commit`] returns
/// `Ok`. Dropping a transaction without committing rolls every write back.
///
/// [`commit`]: LedgerTransaction::commit
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn get_account(&mut self, id: AccountId) -> Result<Account>;

    /// Writes the account back. Returns `false` if nothing changed.
    async fn update_account(&mut self, account: &Account) -> Result<bool>;

    async fn get_holding_by_symbol(
        &mut self,
        symbol: &Symbol,
        account_id: AccountId,
    ) -> Result<Option<Holding>>;

    async fn upsert_holding(&mut self, holding: &Holding) -> Result<()>;

    /// Returns whether a holding was removed.
    async fn delete_holding(&mut self, account_id: AccountId, symbol: &Symbol) -> Result<bool>;

    async fn insert_transaction(&mut self, transaction: NewCashTransaction) -> Result<TransactionId>;

    /// Writes the order back, guarded on the stored order still being OPEN.
    ///
    /// Returns `false` (and writes nothing) when the stored order already
    /// reached a terminal status.
    async fn update_order(&mut self, order: &Order) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Persistent store of accounts, holdings, orders and cash transactions.
#[async_trait]
pub trait AccountLedger: Send + Sync {
    /// Opens an atomic scope. Writers are serialized: a second `begin` waits
    /// until the first transaction is committed or dropped.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction + '_>>;

    async fn insert_account(&self, account: NewAccount) -> Result<Account>;

    async fn get_account(&self, id: AccountId) -> Result<Account>;

    /// All accounts, in id order.
    async fn accounts(&self) -> Result<Vec<Account>>;

    async fn get_holding_by_symbol(
        &self,
        symbol: &Symbol,
        account_id: AccountId,
    ) -> Result<Option<Holding>>;

    /// All holdings, optionally narrowed to one account.
    async fn holdings(&self, account_id: Option<AccountId>) -> Result<Vec<Holding>>;

    /// Inserts or replaces a holding outside of a settlement (seeding, imports).
    async fn upsert_holding(&self, holding: &Holding) -> Result<()>;

    /// Validates and stores a new OPEN order.
    async fn insert_order(&self, order: NewOrder) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn open_orders(&self) -> Result<Vec<Order>>;

    /// Same guard as [`LedgerTransaction::update_order`].
    async fn update_order(&self, order: &Order) -> Result<bool>;

    /// Compare-and-set on the order status.
    ///
    /// Moves the order from `from` to `to` and records `message` as its error
    /// message. Returns `false` if the stored status is not `from`.
    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        message: Option<String>,
    ) -> Result<bool>;

    async fn transactions(&self, account_id: AccountId) -> Result<Vec<CashTransaction>>;

    /// Sets the current price of every holding in the quote's symbol.
    /// Returns how many holdings were touched.
    async fn mark_to_market(&self, quote: &Quote) -> Result<usize>;
}
