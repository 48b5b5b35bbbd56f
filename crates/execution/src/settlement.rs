// In crates/execution/src/settlement.rs

use crate::{Error, Result};
use core_types::{
    Holding, NewCashTransaction, Order, OrderAction, OrderResult, OrderStatus, Quote,
    TransactionKind,
};
use ledger::{AccountLedger, LedgerTransaction};
use rust_decimal::Decimal;

/// Applies one fired order to the ledger, all or nothing.
///
/// Every read and write happens inside a single ledger transaction. Any
/// error drops the transaction before commit, so account cash, the holding
/// and the order status are left exactly as they were.
///
/// # Arguments
///
/// * `ledger`: The ledger to settle against.
/// * `order`: The order that fired. Must still be OPEN in the ledger.
/// * `quote`: The quote the order fired on, used to mark the holding.
/// * `price`: The execution price.
///
/// # Returns
///
/// The successful `OrderResult`, whose settlement id is the id of the cash
/// transaction recorded for the fill.
pub async fn settle(
    ledger: &dyn AccountLedger,
    order: &Order,
    quote: &Quote,
    price: Decimal,
) -> Result<OrderResult> {
    let mut tx = ledger.begin().await?;
    let result = apply(tx.as_mut(), order, quote, price).await?;
    tx.commit().await?;
    Ok(result)
}

async fn apply(
    tx: &mut (dyn LedgerTransaction + '_),
    order: &Order,
    quote: &Quote,
    price: Decimal,
) -> Result<OrderResult> {
    // --- 1. Signed cost: positive for a buy, negative for a sell ---
    let cost = price.checked_mul(Decimal::from(order.signed_quantity()));

    // --- 2. Validate against the current account and holding before writing anything ---
    let mut account = tx.get_account(order.account_id).await?;
    let cost = match (order.action, cost) {
        (OrderAction::Buy, Some(cost)) if account.available_funds >= cost => cost,
        // A buy whose cost does not even fit a decimal cannot be funded.
        (OrderAction::Buy, cost) => {
            return Err(Error::InsufficientFunds {
                required: cost.unwrap_or(Decimal::MAX),
                available: account.available_funds,
            });
        }
        (OrderAction::Sell, cost) => checked(order, cost)?,
    };

    let existing = tx.get_holding_by_symbol(&order.symbol, order.account_id).await?;
    if order.action == OrderAction::Sell {
        let held = existing.as_ref().map(|h| h.quantity).ok_or_else(|| Error::NoHolding {
            symbol: order.symbol.clone(),
            account_id: order.account_id,
        })?;
        if order.quantity > held {
            return Err(Error::Oversell {
                symbol: order.symbol.clone(),
                requested: order.quantity,
                held,
            });
        }
    }

    let amount = -cost;
    let funds_after = checked(order, account.available_funds.checked_add(amount))?;
    let aggregated = existing
        .as_ref()
        .map(|holding| aggregate(holding, order, quote, price))
        .transpose()?;

    // --- 3. Record the cash movement ---
    let settlement_id = tx
        .insert_transaction(NewCashTransaction {
            account_id: order.account_id,
            amount,
            kind: TransactionKind::for_amount(amount),
            note: format!(
                "{} {} {} @ {}",
                order.action, order.quantity, order.symbol, price
            ),
            order_id: Some(order.id),
        })
        .await?;

    // --- 4. Move the cash ---
    account.available_funds = funds_after;
    tx.update_account(&account).await?;

    // --- 5. Create, aggregate or remove the holding ---
    let profit = match aggregated {
        None => {
            tx.upsert_holding(&Holding {
                account_id: order.account_id,
                symbol: order.symbol.clone(),
                quantity: order.quantity,
                cost_basis: price,
                current_price: quote.price,
            })
            .await?;
            None
        }
        Some((aggregated, profit)) => {
            if aggregated.quantity > 0 {
                tx.upsert_holding(&aggregated).await?;
            } else {
                tx.delete_holding(order.account_id, &order.symbol).await?;
            }
            profit
        }
    };

    // --- 6. Mark the order fulfilled, guarded on it still being open ---
    let mut fulfilled = order.clone();
    fulfilled.status = OrderStatus::Fulfilled;
    if !tx.update_order(&fulfilled).await? {
        return Err(Error::OrderNotOpen(order.id));
    }

    Ok(OrderResult::filled(price, cost, profit, settlement_id))
}

/// Folds a fill into an existing holding.
///
/// A buy moves the cost basis to the weighted average; a sell keeps the basis
/// and realizes `(price - basis) × quantity`.
fn aggregate(
    holding: &Holding,
    order: &Order,
    quote: &Quote,
    price: Decimal,
) -> Result<(Holding, Option<Decimal>)> {
    let quantity = checked(order, holding.quantity.checked_add(order.signed_quantity()))?;
    let mut updated = Holding {
        quantity,
        current_price: quote.price,
        ..holding.clone()
    };

    match order.action {
        OrderAction::Buy => {
            let held = holding.cost_basis.checked_mul(Decimal::from(holding.quantity));
            let bought = price.checked_mul(Decimal::from(order.quantity));
            let paid = checked(order, held.zip(bought).and_then(|(a, b)| a.checked_add(b)))?;
            updated.cost_basis = checked(order, paid.checked_div(Decimal::from(quantity)))?;
            Ok((updated, None))
        }
        OrderAction::Sell => {
            let gain = price.checked_sub(holding.cost_basis);
            let profit = checked(order, gain.and_then(|g| g.checked_mul(Decimal::from(order.quantity))))?;
            Ok((updated, Some(profit)))
        }
    }
}

fn checked<T>(order: &Order, value: Option<T>) -> Result<T> {
    value.ok_or(Error::AmountOverflow { order_id: order.id })
}
