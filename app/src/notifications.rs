// In app/src/notifications.rs

use events::OrderEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Prints every order notification as one JSON line on stdout.
///
/// The task ends when the poller (the only sender) is dropped.
pub fn spawn_printer(mut rx: broadcast::Receiver<OrderEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    log_event(&event);
                    match serde_json::to_string(&event) {
                        Ok(json) => println!("{}", json),
                        Err(e) => tracing::warn!(error = %e, "Failed to serialize order event."),
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Notification printer fell behind; events dropped.");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &OrderEvent) {
    let order_id = event.order_id();
    match event {
        OrderEvent::Filled(fill) => tracing::info!(
            %order_id,
            symbol = %fill.symbol,
            action = %fill.action,
            quantity = fill.quantity,
            price = %fill.price,
            "Your order to {} {} shares of {} was executed at {}.",
            fill.action,
            fill.quantity,
            fill.symbol,
            fill.price
        ),
        OrderEvent::Failed(failure) => tracing::warn!(
            %order_id,
            symbol = %failure.symbol,
            "Your order for {} could not be executed: {}",
            failure.symbol,
            failure.message
        ),
        OrderEvent::Canceled { .. } => tracing::info!(%order_id, "Order canceled."),
    }
}
