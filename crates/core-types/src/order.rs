// In crates/core-types/src/order.rs

use crate::types::{AccountId, OrderId, Symbol, TransactionId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether an order buys or sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

impl OrderAction {
    /// +1 for BUY, -1 for SELL.
    pub fn sign(self) -> i64 {
        match self {
            OrderAction::Buy => 1,
            OrderAction::Sell => -1,
        }
    }
}

/// The rule family governing when an order fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStrategy {
    Market,
    Manual,
    Limit,
    StopLoss,
    TrailingStopAmountChange,
    TrailingStopPercentChange,
}

impl OrderStrategy {
    pub const ALL: [OrderStrategy; 6] = [
        OrderStrategy::Market,
        OrderStrategy::Manual,
        OrderStrategy::Limit,
        OrderStrategy::StopLoss,
        OrderStrategy::TrailingStopAmountChange,
        OrderStrategy::TrailingStopPercentChange,
    ];

    /// Strategies that only make sense when protecting an existing position.
    pub fn is_sell_only(self) -> bool {
        matches!(
            self,
            OrderStrategy::StopLoss
                | OrderStrategy::TrailingStopAmountChange
                | OrderStrategy::TrailingStopPercentChange
        )
    }

    pub fn is_trailing(self) -> bool {
        matches!(
            self,
            OrderStrategy::TrailingStopAmountChange | OrderStrategy::TrailingStopPercentChange
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStrategy::Market => "MARKET",
            OrderStrategy::Manual => "MANUAL",
            OrderStrategy::Limit => "LIMIT",
            OrderStrategy::StopLoss => "STOP_LOSS",
            OrderStrategy::TrailingStopAmountChange => "TRAILING_STOP_AMOUNT_CHANGE",
            OrderStrategy::TrailingStopPercentChange => "TRAILING_STOP_PERCENT_CHANGE",
        }
    }

    /// Rejects SELL-only strategies on BUY orders.
    pub fn check_action(self, action: OrderAction) -> Result<()> {
        if action == OrderAction::Buy && self.is_sell_only() {
            return Err(Error::UnsupportedStrategy {
                strategy: self,
                action,
            });
        }
        Ok(())
    }
}

/// Where an order is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    Fulfilled,
    Error,
    Canceled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Fulfilled => "FULFILLED",
            OrderStatus::Error => "ERROR",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl OrderAction {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderAction::Buy => "BUY",
            OrderAction::Sell => "SELL",
        }
    }
}

macro_rules! string_enum {
    ($ty:ident, $err:ident, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_ascii_uppercase();
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| Error::$err(s.to_string()))
            }
        }
    };
}

string_enum!(OrderAction, UnknownAction, [OrderAction::Buy, OrderAction::Sell]);
string_enum!(
    OrderStatus,
    UnknownStatus,
    [
        OrderStatus::Open,
        OrderStatus::Fulfilled,
        OrderStatus::Error,
        OrderStatus::Canceled,
    ]
);
string_enum!(
    OrderStrategy,
    UnknownStrategy,
    [
        OrderStrategy::Market,
        OrderStrategy::Manual,
        OrderStrategy::Limit,
        OrderStrategy::StopLoss,
        OrderStrategy::TrailingStopAmountChange,
        OrderStrategy::TrailingStopPercentChange,
    ]
);

/// A request to buy or sell a quantity of a symbol under a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub action: OrderAction,
    pub strategy: OrderStrategy,
    pub status: OrderStatus,
    pub quantity: i64,
    /// Limit price for LIMIT, fill price for MANUAL, trigger price for STOP_LOSS.
    pub limit_price: Option<Decimal>,
    /// Trailing distance for TRAILING_STOP_AMOUNT_CHANGE.
    pub stop_price: Option<Decimal>,
    /// Trailing distance in percent for TRAILING_STOP_PERCENT_CHANGE.
    pub stop_percent: Option<Decimal>,
    /// High-water mark for trailing strategies. Zero until first evaluated.
    pub highest_price: Decimal,
    pub created_at: DateTime<Utc>,
    /// The cause recorded when the order moved to ERROR.
    pub error_message: Option<String>,
}

impl Order {
    /// Quantity with the direction applied: positive for BUY, negative for SELL.
    pub fn signed_quantity(&self) -> i64 {
        self.quantity * self.action.sign()
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }
}

/// The user-supplied part of an order, before the ledger assigns an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub action: OrderAction,
    pub strategy: OrderStrategy,
    pub quantity: i64,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub stop_percent: Option<Decimal>,
}

impl NewOrder {
    /// Checks the order can ever be executed.
    pub fn validate(&self) -> Result<()> {
        if self.quantity <= 0 {
            return Err(Error::InvalidOrder {
                reason: format!("quantity must be positive, got {}", self.quantity),
            });
        }
        if self.symbol.0.trim().is_empty() {
            return Err(Error::InvalidOrder {
                reason: "symbol is empty".to_string(),
            });
        }
        self.strategy.check_action(self.action)?;

        let (field, value) = match self.strategy {
            OrderStrategy::Market => return Ok(()),
            OrderStrategy::Manual | OrderStrategy::Limit | OrderStrategy::StopLoss => {
                ("limit_price", self.limit_price)
            }
            OrderStrategy::TrailingStopAmountChange => ("stop_price", self.stop_price),
            OrderStrategy::TrailingStopPercentChange => ("stop_percent", self.stop_percent),
        };
        match value {
            Some(v) if v > Decimal::ZERO => Ok(()),
            _ => Err(Error::InvalidOrder {
                reason: format!("{} requires a positive {}", self.strategy, field),
            }),
        }
    }

    /// Builds the OPEN order once the ledger has picked an id.
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            account_id: self.account_id,
            symbol: self.symbol,
            action: self.action,
            strategy: self.strategy,
            status: OrderStatus::Open,
            quantity: self.quantity,
            limit_price: self.limit_price,
            stop_price: self.stop_price,
            stop_percent: self.stop_percent,
            highest_price: Decimal::ZERO,
            created_at,
            error_message: None,
        }
    }
}

/// Outcome of one evaluation.
///
/// `cost` is `price × signed quantity`: positive for a BUY, negative for a SELL.
/// [`OrderResult::value`] is the cash flow into the account, i.e. `-cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    /// Realized profit, sells only.
    pub profit: Option<Decimal>,
    pub settlement_id: Option<TransactionId>,
}

impl OrderResult {
    /// The order did not fire this cycle.
    pub fn not_fired() -> Self {
        Self {
            success: false,
            price: None,
            cost: None,
            profit: None,
            settlement_id: None,
        }
    }

    pub fn filled(
        price: Decimal,
        cost: Decimal,
        profit: Option<Decimal>,
        settlement_id: TransactionId,
    ) -> Self {
        Self {
            success: true,
            price: Some(price),
            cost: Some(cost),
            profit,
            settlement_id: Some(settlement_id),
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.cost.map(|c| -c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_order(action: OrderAction, strategy: OrderStrategy) -> NewOrder {
        NewOrder {
            account_id: AccountId(1),
            symbol: Symbol::new("X"),
            action,
            strategy,
            quantity: 10,
            limit_price: Some(dec!(45)),
            stop_price: Some(dec!(2)),
            stop_percent: Some(dec!(5)),
        }
    }

    #[test]
    fn strategy_names_round_trip() {
        for strategy in OrderStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<OrderStrategy>(), Ok(strategy));
        }
        assert_eq!("stop_loss".parse::<OrderStrategy>(), Ok(OrderStrategy::StopLoss));
        assert_eq!(
            "FILL_OR_KILL".parse::<OrderStrategy>(),
            Err(Error::UnknownStrategy("FILL_OR_KILL".to_string()))
        );
    }

    #[test]
    fn sell_only_strategies_reject_buy() {
        for strategy in OrderStrategy::ALL {
            let result = new_order(OrderAction::Buy, strategy).validate();
            if strategy.is_sell_only() {
                assert!(matches!(result, Err(Error::UnsupportedStrategy { .. })));
            } else {
                assert_eq!(result, Ok(()));
            }
            assert_eq!(new_order(OrderAction::Sell, strategy).validate(), Ok(()));
        }
    }

    #[test]
    fn validate_rejects_non_positive_quantity() {
        let mut order = new_order(OrderAction::Buy, OrderStrategy::Market);
        order.quantity = 0;
        assert!(matches!(order.validate(), Err(Error::InvalidOrder { .. })));
    }

    #[test]
    fn validate_requires_strategy_price() {
        let mut order = new_order(OrderAction::Sell, OrderStrategy::TrailingStopPercentChange);
        order.stop_percent = None;
        assert!(matches!(order.validate(), Err(Error::InvalidOrder { .. })));
    }

    #[test]
    fn new_order_starts_open_with_zero_high_water_mark() {
        let order = new_order(OrderAction::Sell, OrderStrategy::TrailingStopAmountChange)
            .into_order(OrderId(7), Utc::now());
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.highest_price, Decimal::ZERO);
        assert_eq!(order.signed_quantity(), -10);
    }

    #[test]
    fn result_value_is_negated_cost() {
        let result = OrderResult::filled(dec!(50), dec!(500), None, TransactionId(1));
        assert_eq!(result.value(), Some(dec!(-500)));
        assert_eq!(OrderResult::not_fired().value(), None);
        assert!(!OrderResult::not_fired().success);
    }
}
