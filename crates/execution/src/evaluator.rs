// In crates/execution/src/evaluator.rs

use crate::{Error, Result};
use core_types::{Holding, Order, OrderAction, OrderStrategy, Quote};
use market_data::MarketClock;
use rust_decimal::Decimal;

/// What one evaluation decided.
///
/// `highest_price` is `Some` whenever the trailing high-water mark moved, fired
/// or not; the caller must persist it before the order is evaluated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decision {
    pub fill_price: Option<Decimal>,
    pub highest_price: Option<Decimal>,
}

impl Decision {
    pub fn hold() -> Self {
        Self::default()
    }

    pub fn fire(price: Decimal) -> Self {
        Self {
            fill_price: Some(price),
            highest_price: None,
        }
    }

    pub fn fires(&self) -> bool {
        self.fill_price.is_some()
    }

    /// Copies the mutated fields onto the order.
    pub fn apply(&self, order: &mut Order) {
        if let Some(highest) = self.highest_price {
            order.highest_price = highest;
        }
    }
}

/// Checks the inputs before any work: the quote must be for the order's
/// symbol and the strategy must be allowed for the order's action.
pub fn check_preconditions(order: &Order, quote: &Quote) -> Result<()> {
    if order.symbol != quote.symbol {
        return Err(Error::QuoteMismatch {
            order_symbol: order.symbol.clone(),
            quote_symbol: quote.symbol.clone(),
        });
    }
    order.strategy.check_action(order.action)?;
    Ok(())
}

/// Decides whether `order` fires against `quote`.
///
/// Pure: reads the clock but writes nothing. `holding` is the account's
/// current position in the symbol and is only consulted to seed the trailing
/// high-water mark when it is still zero.
pub fn evaluate(
    order: &Order,
    quote: &Quote,
    clock: &dyn MarketClock,
    holding: Option<&Holding>,
) -> Result<Decision> {
    check_preconditions(order, quote)?;

    let valid = clock.is_quote_valid(quote);
    let price = quote.price;

    let decision = match order.strategy {
        OrderStrategy::Market => fire_if(valid, price),
        // MANUAL is the one strategy that ignores quote validity.
        OrderStrategy::Manual => Decision::fire(required(order, order.limit_price, "limit_price")?),
        OrderStrategy::Limit => {
            let limit = required(order, order.limit_price, "limit_price")?;
            let crossed = match order.action {
                OrderAction::Buy => price <= limit,
                OrderAction::Sell => price >= limit,
            };
            fire_if(valid && crossed, price)
        }
        // The stop-loss trigger lives in the limit price field.
        OrderStrategy::StopLoss => {
            let trigger = required(order, order.limit_price, "limit_price")?;
            fire_if(valid && price <= trigger, price)
        }
        OrderStrategy::TrailingStopAmountChange | OrderStrategy::TrailingStopPercentChange => {
            evaluate_trailing(order, quote, valid, holding)?
        }
    };

    Ok(decision)
}

fn evaluate_trailing(
    order: &Order,
    quote: &Quote,
    valid: bool,
    holding: Option<&Holding>,
) -> Result<Decision> {
    let mut highest = order.highest_price;
    let mut moved = false;

    // --- 1. Seed the high-water mark from the position being protected ---
    if highest.is_zero() {
        let holding = holding.ok_or_else(|| Error::NoHolding {
            symbol: order.symbol.clone(),
            account_id: order.account_id,
        })?;
        highest = holding.current_price;
        moved = true;
    }

    let mut fill_price = None;

    // --- 2. Ratchet or test the stop ---
    if valid {
        let price = quote.price;
        if price > highest {
            highest = price;
            moved = true;
        } else {
            let delta = highest - price;
            let triggered = match order.strategy {
                OrderStrategy::TrailingStopAmountChange => {
                    delta >= required(order, order.stop_price, "stop_price")?
                }
                _ => {
                    let stop_percent = required(order, order.stop_percent, "stop_percent")?;
                    !highest.is_zero() && delta / highest * Decimal::ONE_HUNDRED >= stop_percent
                }
            };
            if triggered {
                fill_price = Some(price);
            }
        }
    }

    Ok(Decision {
        fill_price,
        highest_price: moved.then_some(highest),
    })
}

fn fire_if(condition: bool, price: Decimal) -> Decision {
    if condition {
        Decision::fire(price)
    } else {
        Decision::hold()
    }
}

fn required(order: &Order, value: Option<Decimal>, field: &'static str) -> Result<Decimal> {
    value.ok_or(Error::MissingPrice {
        order_id: order.id,
        field,
    })
}
