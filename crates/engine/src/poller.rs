// In crates/engine/src/poller.rs

use crate::locks::OrderLocks;
use anyhow::Result;
use app_config::PollerSettings;
use chrono::Duration;
use core_types::{Order, OrderId, OrderStatus, Quote, Symbol};
use events::{FailureNotice, FillNotice, OrderEvent};
use execution::{should_reschedule, Executor, OrderExecutionEngine, Reschedule};
use futures::future;
use itertools::Itertools;
use ledger::AccountLedger;
use market_data::{MarketClock, QuoteSource};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Longest accepted poll interval: one day.
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Capacity of the notification channel. Slow subscribers lose the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Summary of one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Orders that were OPEN when the pass started.
    pub open_orders: usize,
    /// Orders handed to the execution engine.
    pub evaluated: usize,
    pub filled: usize,
    /// Orders moved to ERROR.
    pub failed: usize,
    /// Orders left alone: no quote, or no longer open by the time they were reached.
    pub skipped: usize,
}

enum Outcome {
    Held,
    Filled,
    Failed,
    Stale,
}

/// Drives the execution engine over every open order.
///
/// A pass fetches the open orders and their quotes once, evaluates the orders
/// concurrently and reports what happened on the event channel. The same
/// order is never worked on by two tasks at once; see [`OrderLocks`].
pub struct OrderPoller {
    engine: OrderExecutionEngine,
    ledger: Arc<dyn AccountLedger>,
    quotes: Arc<dyn QuoteSource>,
    clock: Arc<dyn MarketClock>,
    locks: OrderLocks,
    events: broadcast::Sender<OrderEvent>,
    poll_interval: Duration,
}

impl OrderPoller {
    pub fn new(
        ledger: Arc<dyn AccountLedger>,
        quotes: Arc<dyn QuoteSource>,
        clock: Arc<dyn MarketClock>,
        settings: &PollerSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let interval_secs = settings.poll_interval_secs.clamp(1, MAX_POLL_INTERVAL_SECS);
        if interval_secs != settings.poll_interval_secs {
            tracing::warn!(
                configured = settings.poll_interval_secs,
                used = interval_secs,
                "Poll interval out of range; clamped."
            );
        }
        Self {
            engine: OrderExecutionEngine::new(ledger.clone(), clock.clone()),
            ledger,
            quotes,
            clock,
            locks: OrderLocks::new(),
            events,
            poll_interval: Duration::seconds(interval_secs as i64),
        }
    }

    /// Subscribes to fill, failure and cancellation notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    /// Runs one evaluation pass over all open orders.
    ///
    /// # Returns
    ///
    /// A [`PassReport`]. Per-order failures are not errors of the pass: the
    /// order is marked ERROR and counted. Only failing to load the orders or
    /// the quotes fails the pass.
    pub async fn run_pass(&self) -> Result<PassReport> {
        // --- 1. Load the work ---
        let orders = self.ledger.open_orders().await?;
        let mut report = PassReport {
            open_orders: orders.len(),
            ..PassReport::default()
        };
        if orders.is_empty() {
            return Ok(report);
        }

        let symbols: Vec<Symbol> = orders.iter().map(|o| o.symbol.clone()).unique().collect();
        let quotes = self.quotes.get_quotes(&symbols).await?;
        tracing::debug!(
            orders = orders.len(),
            symbols = symbols.len(),
            quoted = quotes.len(),
            source = self.quotes.name(),
            "Starting polling pass."
        );

        // --- 2. Pair each order with its quote ---
        let mut still_open: HashSet<OrderId> = HashSet::new();
        let mut unquoted: Vec<&Symbol> = Vec::new();
        let mut pending = Vec::new();
        for order in &orders {
            match quotes.get(&order.symbol) {
                Some(quote) => pending.push(self.process(order.clone(), quote)),
                None => {
                    report.skipped += 1;
                    still_open.insert(order.id);
                    unquoted.push(&order.symbol);
                }
            }
        }
        for symbol in unquoted.into_iter().unique() {
            tracing::warn!(%symbol, "No quote available; skipping symbol this pass.");
        }

        // --- 3. Evaluate concurrently ---
        report.evaluated = pending.len();
        for (order_id, outcome) in future::join_all(pending).await {
            match outcome {
                Outcome::Held => {
                    still_open.insert(order_id);
                }
                Outcome::Filled => report.filled += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::Stale => report.skipped += 1,
            }
        }

        // --- 4. Refresh position prices ---
        for quote in quotes.values() {
            match self.ledger.mark_to_market(quote).await {
                Ok(0) => {}
                Ok(holdings) => tracing::debug!(
                    symbol = %quote.symbol,
                    price = %quote.price,
                    change = %quote.change(),
                    change_percent = ?quote.change_percent(),
                    holdings,
                    "Marked holdings to market."
                ),
                Err(e) => {
                    tracing::warn!(symbol = %quote.symbol, error = %e, "Failed to mark holdings to market.");
                }
            }
        }

        self.locks.prune(|id| still_open.contains(&id));
        Ok(report)
    }

    async fn process(&self, mut order: Order, quote: &Quote) -> (OrderId, Outcome) {
        let lock = self.locks.acquire(order.id);
        let _guard = lock.lock().await;

        let outcome = match self.engine.attempt_execute(&mut order, quote).await {
            Ok(result) => match FillNotice::from_result(&order, &result) {
                Some(notice) => {
                    self.publish(OrderEvent::Filled(notice));
                    Outcome::Filled
                }
                None => Outcome::Held,
            },
            Err(execution::Error::OrderNotOpen(order_id)) => {
                tracing::debug!(%order_id, "Order left OPEN before it could be executed.");
                Outcome::Stale
            }
            Err(e) => self.fail(&order, &e).await,
        };
        (order.id, outcome)
    }

    /// Moves the order to ERROR with the cause, if it is still OPEN.
    async fn fail(&self, order: &Order, cause: &execution::Error) -> Outcome {
        let message = cause.to_string();
        match self
            .ledger
            .transition_order(order.id, OrderStatus::Open, OrderStatus::Error, Some(message.clone()))
            .await
        {
            Ok(true) => {
                tracing::warn!(
                    order_id = %order.id,
                    symbol = %order.symbol,
                    kind = ?cause.kind(),
                    error = %message,
                    "Order marked ERROR."
                );
                self.publish(OrderEvent::Failed(FailureNotice {
                    timestamp: self.clock.now(),
                    order_id: order.id,
                    symbol: order.symbol.clone(),
                    message,
                }));
                Outcome::Failed
            }
            Ok(false) => Outcome::Stale,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, cause = %message, "Failed to mark order ERROR.");
                Outcome::Failed
            }
        }
    }

    /// Cancels an open order.
    ///
    /// Waits for any in-flight evaluation of the same order, so a cancel and
    /// a fire can never both succeed.
    ///
    /// # Returns
    ///
    /// `true` if the order was OPEN and is now CANCELED.
    pub async fn cancel(&self, order_id: OrderId) -> Result<bool> {
        let lock = self.locks.acquire(order_id);
        let _guard = lock.lock().await;

        let canceled = self
            .ledger
            .transition_order(order_id, OrderStatus::Open, OrderStatus::Canceled, None)
            .await?;
        if canceled {
            tracing::info!(%order_id, "Order canceled.");
            self.publish(OrderEvent::Canceled { order_id });
        } else {
            tracing::debug!(%order_id, "Cancel ignored; order is not open.");
        }
        Ok(canceled)
    }

    /// When the next pass should run, given the market state right now.
    pub fn next_wake(&self) -> Reschedule {
        self.engine.next_wake(self.poll_interval)
    }

    /// The long-running polling loop. Never returns under normal operation.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            executor = self.engine.name(),
            poll_interval_secs = self.poll_interval.num_seconds(),
            "Order poller started."
        );

        loop {
            let mut next = self.next_wake();

            if self.clock.is_in_poll_time() {
                match self.run_pass().await {
                    Ok(report) => {
                        tracing::info!(?report, "Polling pass complete.");
                        let remaining = report.open_orders.saturating_sub(report.filled + report.failed);
                        if !should_reschedule(remaining) {
                            // Nothing left to watch; come back when the next poll window starts.
                            let earliest = self.clock.now() + self.poll_interval;
                            next.next_wake = self.clock.next_poll_start().max(earliest);
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Polling pass failed."),
                }
            }

            let delay = next.delay_from(self.clock.now());
            tracing::debug!(next_wake = %next.next_wake, market_open = next.market_open, "Sleeping until next pass.");
            tokio::time::sleep(delay).await;
        }
    }

    fn publish(&self, event: OrderEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
