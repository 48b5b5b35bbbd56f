// In crates/execution/src/lib.rs

use async_trait::async_trait;
use core_types::{Order, OrderResult, Quote};

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod schedule;
pub mod settlement;

// Re-export public types
pub use engine::OrderExecutionEngine;
pub use error::{Error, ErrorKind, Result};
pub use evaluator::{evaluate, Decision};
pub use schedule::{reschedule, should_reschedule, Reschedule};
pub use settlement::settle;

/// The universal interface for an order execution handler.
///
/// An `Executor` decides whether a pending order fires against a quote and,
/// when it does, commits the trade.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The name of the executor (e.g., "OrderExecutionEngine").
    fn name(&self) -> &'static str;

    /// Evaluates `order` against `quote` and settles it if it fires.
    ///
    /// # Arguments
    ///
    /// * `order`: The order to evaluate. Trailing state and the final status
    ///   are written back into it.
    /// * `quote`: The current quote for the order's symbol.
    ///
    /// # Returns
    ///
    /// * `Ok(result)` with `result.success == false`: the order did not fire
    ///   this cycle and stays OPEN.
    /// * `Ok(result)` with `result.success == true`: the trade was settled and
    ///   the order is FULFILLED.
    /// * `Err(_)`: the order could not be executed; see [`ErrorKind`].
    async fn attempt_execute(&self, order: &mut Order, quote: &Quote) -> Result<OrderResult>;
}
