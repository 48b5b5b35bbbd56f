// In crates/ledger/src/memory.rs

use crate::{AccountLedger, Error, LedgerOp, LedgerTransaction, NewAccount, Result};
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    Account, AccountId, CashTransaction, Holding, NewCashTransaction, NewOrder, Order, OrderId,
    OrderStatus, Quote, Symbol, TransactionId,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    holdings: BTreeMap<(AccountId, Symbol), Holding>,
    orders: BTreeMap<OrderId, Order>,
    transactions: Vec<CashTransaction>,
    next_account_id: u64,
    next_order_id: u64,
    next_transaction_id: u64,
}

impl LedgerState {
    fn account(&self, id: AccountId) -> Result<&Account> {
        self.accounts.get(&id).ok_or(Error::AccountNotFound(id))
    }

    fn holding(&self, symbol: &Symbol, account_id: AccountId) -> Option<Holding> {
        self.holdings.get(&(account_id, symbol.clone())).cloned()
    }

    fn put_holding(&mut self, holding: &Holding) -> Result<()> {
        self.account(holding.account_id)?;
        self.holdings
            .insert((holding.account_id, holding.symbol.clone()), holding.clone());
        Ok(())
    }

    fn write_order(&mut self, order: &Order) -> Result<bool> {
        let stored = self
            .orders
            .get_mut(&order.id)
            .ok_or(Error::OrderNotFound(order.id))?;
        if stored.status.is_terminal() {
            return Ok(false);
        }
        *stored = order.clone();
        Ok(true)
    }

    fn record_transaction(&mut self, transaction: NewCashTransaction) -> Result<TransactionId> {
        self.account(transaction.account_id)?;
        self.next_transaction_id += 1;
        let id = TransactionId(self.next_transaction_id);
        self.transactions.push(CashTransaction {
            id,
            account_id: transaction.account_id,
            amount: transaction.amount,
            kind: transaction.kind,
            note: transaction.note,
            order_id: transaction.order_id,
            recorded_at: Utc::now(),
        });
        Ok(id)
    }
}

type Faults = Arc<std::sync::Mutex<HashSet<LedgerOp>>>;

fn check_fault(faults: &Faults, op: LedgerOp) -> Result<()> {
    let armed = faults
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&op);
    if armed {
        tracing::warn!(?op, "Injected ledger failure.");
        return Err(Error::OperationFailed(op));
    }
    Ok(())
}

/// A ledger kept entirely in memory.
///
/// All state sits behind one async mutex. A transaction holds that mutex for
/// its whole life and works on a staged copy, which replaces the live state
/// on commit. A dropped transaction simply discards its copy.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    faults: Faults,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot failure: the next call of `op` returns
    /// [`Error::OperationFailed`] without touching any state.
    pub fn fail_on(&self, op: LedgerOp) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op);
    }

    fn check(&self, op: LedgerOp) -> Result<()> {
        check_fault(&self.faults, op)
    }
}

struct InMemoryTransaction {
    live: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
    faults: Faults,
}

impl InMemoryTransaction {
    fn check(&self, op: LedgerOp) -> Result<()> {
        check_fault(&self.faults, op)
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn get_account(&mut self, id: AccountId) -> Result<Account> {
        self.check(LedgerOp::GetAccount)?;
        self.staged.account(id).cloned()
    }

    async fn update_account(&mut self, account: &Account) -> Result<bool> {
        self.check(LedgerOp::UpdateAccount)?;
        let stored = self
            .staged
            .accounts
            .get_mut(&account.id)
            .ok_or(Error::AccountNotFound(account.id))?;
        if stored == account {
            return Ok(false);
        }
        *stored = account.clone();
        Ok(true)
    }

    async fn get_holding_by_symbol(
        &mut self,
        symbol: &Symbol,
        account_id: AccountId,
    ) -> Result<Option<Holding>> {
        self.check(LedgerOp::GetHolding)?;
        Ok(self.staged.holding(symbol, account_id))
    }

    async fn upsert_holding(&mut self, holding: &Holding) -> Result<()> {
        self.check(LedgerOp::UpsertHolding)?;
        self.staged.put_holding(holding)
    }

    async fn delete_holding(&mut self, account_id: AccountId, symbol: &Symbol) -> Result<bool> {
        self.check(LedgerOp::DeleteHolding)?;
        Ok(self
            .staged
            .holdings
            .remove(&(account_id, symbol.clone()))
            .is_some())
    }

    async fn insert_transaction(&mut self, transaction: NewCashTransaction) -> Result<TransactionId> {
        self.check(LedgerOp::InsertTransaction)?;
        self.staged.record_transaction(transaction)
    }

    async fn update_order(&mut self, order: &Order) -> Result<bool> {
        self.check(LedgerOp::UpdateOrder)?;
        self.staged.write_order(order)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.check(LedgerOp::Commit)?;
        let InMemoryTransaction { mut live, staged, .. } = *self;
        *live = staged;
        Ok(())
    }
}

#[async_trait]
impl AccountLedger for InMemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction + '_>> {
        self.check(LedgerOp::Begin)?;
        let live = self.state.clone().lock_owned().await;
        let staged = live.clone();
        Ok(Box::new(InMemoryTransaction {
            live,
            staged,
            faults: self.faults.clone(),
        }))
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Account> {
        let mut state = self.state.lock().await;
        state.next_account_id += 1;
        let account = Account {
            id: AccountId(state.next_account_id),
            name: account.name,
            available_funds: account.available_funds,
            strategy: account.strategy,
            exclude_from_totals: account.exclude_from_totals,
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account> {
        self.check(LedgerOp::GetAccount)?;
        self.state.lock().await.account(id).cloned()
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.state.lock().await.accounts.values().cloned().collect())
    }

    async fn get_holding_by_symbol(
        &self,
        symbol: &Symbol,
        account_id: AccountId,
    ) -> Result<Option<Holding>> {
        self.check(LedgerOp::GetHolding)?;
        Ok(self.state.lock().await.holding(symbol, account_id))
    }

    async fn holdings(&self, account_id: Option<AccountId>) -> Result<Vec<Holding>> {
        let state = self.state.lock().await;
        Ok(state
            .holdings
            .values()
            .filter(|h| account_id.is_none_or(|id| h.account_id == id))
            .cloned()
            .collect())
    }

    async fn upsert_holding(&self, holding: &Holding) -> Result<()> {
        self.check(LedgerOp::UpsertHolding)?;
        self.state.lock().await.put_holding(holding)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        order.validate()?;
        let mut state = self.state.lock().await;
        state.account(order.account_id)?;
        state.next_order_id += 1;
        let order = order.into_order(OrderId(state.next_order_id), Utc::now());
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn open_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.values().filter(|o| o.is_open()).cloned().collect())
    }

    async fn update_order(&self, order: &Order) -> Result<bool> {
        self.check(LedgerOp::UpdateOrder)?;
        self.state.lock().await.write_order(order)
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        message: Option<String>,
    ) -> Result<bool> {
        self.check(LedgerOp::UpdateOrder)?;
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(Error::OrderNotFound(id))?;
        if order.status != from {
            return Ok(false);
        }
        order.status = to;
        if message.is_some() {
            order.error_message = message;
        }
        Ok(true)
    }

    async fn transactions(&self, account_id: AccountId) -> Result<Vec<CashTransaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn mark_to_market(&self, quote: &Quote) -> Result<usize> {
        let mut state = self.state.lock().await;
        let mut touched = 0;
        for holding in state.holdings.values_mut().filter(|h| h.symbol == quote.symbol) {
            holding.mark_to_market(quote);
            touched += 1;
        }
        Ok(touched)
    }
}
