//! Cooperative task state and the suspension protocol.
//!
//! - [`TaskContext`]: per-task identity, cancellation, and [`sleep`]
//! - [`WaitStrategy`]: the protocol invoked around a suspension
//! - [`WakeupSource`]: why a parked task became runnable
//!
//! [`sleep`]: TaskContext::sleep

mod context;
mod wait_strategy;

pub use context::{TaskContext, TaskId, WakeupSource};
pub use wait_strategy::WaitStrategy;
