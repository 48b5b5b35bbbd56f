// In crates/core-types/src/types.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A ticker symbol (e.g., "AAPL").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ledger_id!(
    /// Identity of an order row.
    OrderId
);
ledger_id!(
    /// Identity of an account row.
    AccountId
);
ledger_id!(
    /// Identity of a cash transaction; doubles as the settlement id of a fill.
    TransactionId
);

/// A market data snapshot for one symbol.
///
/// Quotes are supplied to the engine per evaluation and never mutated by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    /// The last traded price.
    pub price: Decimal,
    /// The previous session's closing price.
    pub previous_close: Decimal,
    /// When the last trade happened.
    pub last_trade_at: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub exchange: String,
}

impl Quote {
    /// Absolute change against the previous close.
    pub fn change(&self) -> Decimal {
        self.price - self.previous_close
    }

    /// Percent change against the previous close, `None` when there is no previous close.
    pub fn change_percent(&self) -> Option<Decimal> {
        if self.previous_close.is_zero() {
            return None;
        }
        Some(self.change() / self.previous_close * Decimal::ONE_HUNDRED)
    }
}

/// A cash position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// Cash available to fund BUY orders.
    pub available_funds: Decimal,
    /// Free-form tag naming the investment strategy the account follows.
    #[serde(default)]
    pub strategy: String,
    /// Excluded from portfolio totals.
    #[serde(default)]
    pub exclude_from_totals: bool,
}

/// An account's aggregated position in one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub quantity: i64,
    /// Average price paid per share.
    pub cost_basis: Decimal,
    /// Last known market price.
    pub current_price: Decimal,
}

impl Holding {
    pub fn market_value(&self) -> Decimal {
        self.current_price * Decimal::from(self.quantity)
    }

    pub fn unrealized_profit(&self) -> Decimal {
        (self.current_price - self.cost_basis) * Decimal::from(self.quantity)
    }

    /// Updates the current price from a quote for the same symbol.
    pub fn mark_to_market(&mut self, quote: &Quote) {
        if quote.symbol == self.symbol {
            self.current_price = quote.price;
        }
    }
}

/// Direction of a cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    /// The kind matching a signed amount; zero counts as a deposit.
    pub fn for_amount(amount: Decimal) -> Self {
        if amount.is_sign_negative() && !amount.is_zero() {
            TransactionKind::Withdrawal
        } else {
            TransactionKind::Deposit
        }
    }
}

/// A cash transaction about to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCashTransaction {
    pub account_id: AccountId,
    /// Signed amount: negative for withdrawals.
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub note: String,
    pub order_id: Option<OrderId>,
}

/// A recorded cash transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashTransaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub note: String,
    pub order_id: Option<OrderId>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(price: Decimal, previous_close: Decimal) -> Quote {
        Quote {
            symbol: Symbol::new("X"),
            price,
            previous_close,
            last_trade_at: Utc::now(),
            name: String::new(),
            exchange: String::new(),
        }
    }

    #[test]
    fn quote_change_percent() {
        let q = quote(dec!(110), dec!(100));
        assert_eq!(q.change(), dec!(10));
        assert_eq!(q.change_percent(), Some(dec!(10)));
        assert_eq!(quote(dec!(5), dec!(0)).change_percent(), None);
    }

    #[test]
    fn holding_mark_to_market_ignores_other_symbols() {
        let mut holding = Holding {
            account_id: AccountId(1),
            symbol: Symbol::new("X"),
            quantity: 10,
            cost_basis: dec!(40),
            current_price: dec!(40),
        };
        holding.mark_to_market(&quote(dec!(50), dec!(45)));
        assert_eq!(holding.current_price, dec!(50));
        assert_eq!(holding.market_value(), dec!(500));
        assert_eq!(holding.unrealized_profit(), dec!(100));

        let mut other = quote(dec!(1), dec!(1));
        other.symbol = Symbol::new("Y");
        holding.mark_to_market(&other);
        assert_eq!(holding.current_price, dec!(50));
    }

    #[test]
    fn transaction_kind_follows_sign() {
        assert_eq!(TransactionKind::for_amount(dec!(-1)), TransactionKind::Withdrawal);
        assert_eq!(TransactionKind::for_amount(dec!(1)), TransactionKind::Deposit);
        assert_eq!(TransactionKind::for_amount(dec!(0)), TransactionKind::Deposit);
    }
}
