// --- Order notification structures ---

use chrono::{DateTime, Utc};
use core_types::{Order, OrderAction, OrderId, OrderResult, Symbol};
use rust_decimal::Decimal;
use serde::Serialize;

/// A fired order, with what the user needs to see about it.
#[derive(Debug, Clone, Serialize)]
pub struct FillNotice {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub action: OrderAction,
    pub quantity: i64,
    pub price: Decimal,
    /// Signed cost: positive for a buy, negative for a sell.
    pub cost: Decimal,
    /// Realized profit, sells only.
    pub profit: Option<Decimal>,
}

impl FillNotice {
    /// Builds the notice for a successful result. Returns `None` for a non-fire.
    pub fn from_result(order: &Order, result: &OrderResult) -> Option<Self> {
        if !result.success {
            return None;
        }
        Some(Self {
            timestamp: Utc::now(),
            order_id: order.id,
            symbol: order.symbol.clone(),
            action: order.action,
            quantity: order.quantity,
            price: result.price?,
            cost: result.cost?,
            profit: result.profit,
        })
    }
}

/// An order that could not be executed and was moved to ERROR.
#[derive(Debug, Clone, Serialize)]
pub struct FailureNotice {
    pub timestamp: DateTime<Utc>,
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub message: String,
}

/// The top-level event enum broadcast to whoever presents notifications.
/// `tag` and `content` are used by serde for clean JSON representation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum OrderEvent {
    Filled(FillNotice),
    Failed(FailureNotice),
    Canceled { order_id: OrderId },
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::Filled(n) => n.order_id,
            OrderEvent::Failed(n) => n.order_id,
            OrderEvent::Canceled { order_id } => *order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AccountId, OrderStatus, OrderStrategy, TransactionId};
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order {
            id: OrderId(3),
            account_id: AccountId(1),
            symbol: Symbol::new("X"),
            action: OrderAction::Sell,
            strategy: OrderStrategy::StopLoss,
            status: OrderStatus::Fulfilled,
            quantity: 10,
            limit_price: Some(dec!(45)),
            stop_price: None,
            stop_percent: None,
            highest_price: dec!(0),
            created_at: Utc::now(),
            error_message: None,
        }
    }

    #[test]
    fn fill_notice_only_for_success() {
        assert!(FillNotice::from_result(&order(), &OrderResult::not_fired()).is_none());

        let result = OrderResult::filled(dec!(44), dec!(-440), Some(dec!(40)), TransactionId(9));
        let notice = FillNotice::from_result(&order(), &result).unwrap();
        assert_eq!(notice.cost, dec!(-440));
        assert_eq!(notice.profit, Some(dec!(40)));
    }

    #[test]
    fn events_serialize_tagged() {
        let event = OrderEvent::Canceled { order_id: OrderId(3) };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Canceled");
        assert_eq!(json["payload"]["order_id"], 3);
        assert_eq!(event.order_id(), OrderId(3));
    }
}
