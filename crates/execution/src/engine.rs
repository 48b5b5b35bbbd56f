// In crates/execution/src/engine.rs

use crate::evaluator::{check_preconditions, evaluate};
use crate::schedule::{reschedule, Reschedule};
use crate::settlement::settle;
use crate::{Error, Executor, Result};
use async_trait::async_trait;
use core_types::{Order, OrderResult, OrderStatus, Quote};
use ledger::AccountLedger;
use market_data::MarketClock;
use std::sync::Arc;

/// Executes simulated orders against polled quotes.
///
/// The engine keeps no state between calls. Everything it learns (the
/// trailing high-water mark, the fill) goes straight to the ledger.
#[derive(Clone)]
pub struct OrderExecutionEngine {
    ledger: Arc<dyn AccountLedger>,
    clock: Arc<dyn MarketClock>,
}

impl OrderExecutionEngine {
    pub fn new(ledger: Arc<dyn AccountLedger>, clock: Arc<dyn MarketClock>) -> Self {
        Self { ledger, clock }
    }

    /// When the next evaluation pass should run.
    ///
    /// Inside the poll window (session plus its buffers) that is one poll
    /// interval away. Outside it, the start of the next window.
    pub fn next_wake(&self, poll_interval: chrono::Duration) -> Reschedule {
        let polling = self.clock.is_market_open() || self.clock.is_in_poll_time();
        let mut next = reschedule(
            polling,
            self.clock.now(),
            poll_interval,
            self.clock.next_poll_start(),
        );
        next.market_open = self.clock.is_market_open();
        next
    }
}

#[async_trait]
impl Executor for OrderExecutionEngine {
    fn name(&self) -> &'static str {
        "OrderExecutionEngine"
    }

    async fn attempt_execute(&self, order: &mut Order, quote: &Quote) -> Result<OrderResult> {
        if !order.is_open() {
            return Err(Error::OrderNotOpen(order.id));
        }
        check_preconditions(order, quote)?;

        // --- Step 1: Fetch the position a trailing stop protects, if it still needs seeding ---
        let holding = if order.strategy.is_trailing() && order.highest_price.is_zero() {
            self.ledger
                .get_holding_by_symbol(&order.symbol, order.account_id)
                .await?
        } else {
            None
        };

        // --- Step 2: Decide ---
        let decision = evaluate(order, quote, self.clock.as_ref(), holding.as_ref())?;

        // --- Step 3: Flush trailing state, fired or not ---
        if decision.highest_price.is_some() {
            decision.apply(order);
            if !self.ledger.update_order(order).await? {
                return Err(Error::OrderNotOpen(order.id));
            }
            tracing::debug!(
                order_id = %order.id,
                symbol = %order.symbol,
                highest_price = %order.highest_price,
                "Trailing high-water mark moved."
            );
        }

        let Some(price) = decision.fill_price else {
            tracing::trace!(order_id = %order.id, price = %quote.price, "Order not triggered.");
            return Ok(OrderResult::not_fired());
        };

        // --- Step 4: Settle ---
        let result = settle(self.ledger.as_ref(), order, quote, price).await?;
        order.status = OrderStatus::Fulfilled;
        tracing::info!(
            order_id = %order.id,
            symbol = %order.symbol,
            action = %order.action,
            quantity = order.quantity,
            %price,
            "Order filled."
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::tests::{quote, TestClock};
    use crate::ErrorKind;
    use chrono::{Duration, Utc};
    use core_types::{AccountId, Holding, NewOrder, OrderAction, OrderStrategy, Symbol};
    use ledger::{InMemoryLedger, LedgerOp, NewAccount};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        engine: OrderExecutionEngine,
        account_id: AccountId,
    }

    async fn fixture(clock: TestClock) -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let account = ledger
            .insert_account(NewAccount {
                name: "main".to_string(),
                available_funds: dec!(10000),
                strategy: String::new(),
                exclude_from_totals: false,
            })
            .await
            .unwrap();
        let engine = OrderExecutionEngine::new(ledger.clone(), Arc::new(clock));
        Fixture { ledger, engine, account_id: account.id }
    }

    impl Fixture {
        async fn order(&self, action: OrderAction, strategy: OrderStrategy, quantity: i64, limit: Option<Decimal>) -> Order {
            self.ledger
                .insert_order(NewOrder {
                    account_id: self.account_id,
                    symbol: Symbol::new("X"),
                    action,
                    strategy,
                    quantity,
                    limit_price: limit,
                    stop_price: Some(dec!(5)),
                    stop_percent: Some(dec!(10)),
                })
                .await
                .unwrap()
        }

        async fn hold(&self, quantity: i64, price: Decimal) {
            self.ledger
                .upsert_holding(&Holding {
                    account_id: self.account_id,
                    symbol: Symbol::new("X"),
                    quantity,
                    cost_basis: price,
                    current_price: price,
                })
                .await
                .unwrap();
        }

        async fn funds(&self) -> Decimal {
            self.ledger.get_account(self.account_id).await.unwrap().available_funds
        }

        async fn holding(&self) -> Option<Holding> {
            self.ledger
                .get_holding_by_symbol(&Symbol::new("X"), self.account_id)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn market_buy_then_stop_loss_sell() {
        let f = fixture(TestClock::open()).await;

        let mut buy = f.order(OrderAction::Buy, OrderStrategy::Market, 10, None).await;
        let result = f.engine.attempt_execute(&mut buy, &quote(dec!(50))).await.unwrap();
        assert!(result.success);
        assert_eq!(result.price, Some(dec!(50)));
        assert_eq!(result.cost, Some(dec!(500)));
        assert_eq!(buy.status, OrderStatus::Fulfilled);
        assert_eq!(f.funds().await, dec!(9500));
        assert_eq!(f.holding().await.unwrap().quantity, 10);

        let mut stop = f.order(OrderAction::Sell, OrderStrategy::StopLoss, 10, Some(dec!(45))).await;
        let not_yet = f.engine.attempt_execute(&mut stop, &quote(dec!(46))).await.unwrap();
        assert_eq!(not_yet, OrderResult::not_fired());
        assert_eq!(stop.status, OrderStatus::Open);

        let result = f.engine.attempt_execute(&mut stop, &quote(dec!(44))).await.unwrap();
        assert_eq!(result.price, Some(dec!(44)));
        assert_eq!(
            f.ledger.get_order(stop.id).await.unwrap().unwrap().status,
            OrderStatus::Fulfilled
        );
        assert!(f.holding().await.is_none());
        assert_eq!(f.funds().await, dec!(9940));
    }

    #[tokio::test]
    async fn insufficient_funds_is_a_business_rejection() {
        let f = fixture(TestClock::open()).await;
        let mut buy = f.order(OrderAction::Buy, OrderStrategy::Market, 400, None).await;

        let err = f.engine.attempt_execute(&mut buy, &quote(dec!(50))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BusinessRule);
        assert_eq!(buy.status, OrderStatus::Open);
        assert_eq!(f.funds().await, dec!(10000));
        assert!(f.holding().await.is_none());
    }

    #[tokio::test]
    async fn trailing_state_is_persisted_without_a_fill() {
        let f = fixture(TestClock::open()).await;
        f.hold(10, dec!(50)).await;
        let mut trailing = f
            .order(OrderAction::Sell, OrderStrategy::TrailingStopAmountChange, 10, None)
            .await;

        let result = f.engine.attempt_execute(&mut trailing, &quote(dec!(52))).await.unwrap();
        assert!(!result.success);
        assert_eq!(trailing.highest_price, dec!(52));
        let stored = f.ledger.get_order(trailing.id).await.unwrap().unwrap();
        assert_eq!(stored.highest_price, dec!(52));

        // Reload from the ledger, as the next polling pass would.
        let mut reloaded = stored;
        let result = f.engine.attempt_execute(&mut reloaded, &quote(dec!(47))).await.unwrap();
        assert_eq!(result.price, Some(dec!(47)));
        assert!(f.holding().await.is_none());
    }

    #[tokio::test]
    async fn trailing_seed_is_persisted_while_market_closed() {
        let f = fixture(TestClock::closed()).await;
        f.hold(10, dec!(50)).await;
        let mut trailing = f
            .order(OrderAction::Sell, OrderStrategy::TrailingStopPercentChange, 10, None)
            .await;

        let result = f.engine.attempt_execute(&mut trailing, &quote(dec!(10))).await.unwrap();
        assert!(!result.success);
        let stored = f.ledger.get_order(trailing.id).await.unwrap().unwrap();
        assert_eq!(stored.highest_price, dec!(50));
    }

    #[tokio::test]
    async fn trailing_state_persistence_failure_fails_the_cycle() {
        let f = fixture(TestClock::open()).await;
        f.hold(10, dec!(50)).await;
        let mut trailing = f
            .order(OrderAction::Sell, OrderStrategy::TrailingStopAmountChange, 10, None)
            .await;
        f.ledger.fail_on(LedgerOp::UpdateOrder);

        let err = f.engine.attempt_execute(&mut trailing, &quote(dec!(55))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        let stored = f.ledger.get_order(trailing.id).await.unwrap().unwrap();
        assert_eq!(stored.highest_price, Decimal::ZERO);
    }

    #[tokio::test]
    async fn trailing_without_position_is_fatal() {
        let f = fixture(TestClock::open()).await;
        let mut trailing = f
            .order(OrderAction::Sell, OrderStrategy::TrailingStopAmountChange, 10, None)
            .await;
        let err = f.engine.attempt_execute(&mut trailing, &quote(dec!(55))).await.unwrap_err();
        assert!(matches!(err, Error::NoHolding { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn sell_only_strategy_on_buy_is_fatal() {
        let f = fixture(TestClock::open()).await;
        // Bypass insert-time validation to reach the engine's own check.
        let mut order = f.order(OrderAction::Sell, OrderStrategy::StopLoss, 1, Some(dec!(45))).await;
        order.action = OrderAction::Buy;
        let err = f.engine.attempt_execute(&mut order, &quote(dec!(40))).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOrder(_)));
        assert_eq!(f.funds().await, dec!(10000));
    }

    #[tokio::test]
    async fn closed_orders_are_not_evaluated() {
        let f = fixture(TestClock::open()).await;
        let mut order = f.order(OrderAction::Buy, OrderStrategy::Market, 1, None).await;
        order.status = OrderStatus::Canceled;
        let err = f.engine.attempt_execute(&mut order, &quote(dec!(40))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn next_wake_follows_market_state() {
        let now = Utc::now();
        let f = fixture(TestClock { open: true, now }).await;
        assert_eq!(f.engine.next_wake(Duration::seconds(30)).next_wake, now + Duration::seconds(30));

        let f = fixture(TestClock { open: false, now }).await;
        assert_eq!(f.engine.next_wake(Duration::seconds(30)).next_wake, now + Duration::hours(12));
    }
}
