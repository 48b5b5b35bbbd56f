// In crates/engine/src/lib.rs

pub mod locks;
pub mod poller;

pub use locks::OrderLocks;
pub use poller::{OrderPoller, PassReport};
