//! Cooperative task waiting primitives.
//!
//! This crate is the waiting core of a cooperative task runtime: the
//! pieces a scheduler needs so tasks can park on a synchronization
//! primitive and be woken by notification, deadline, or cancellation.
//!
//! # Components
//!
//! - [`TaskContext`]: per-task identity, sticky cancellation, the
//!   spurious-wakeup counter, and [`sleep`](TaskContext::sleep) — the
//!   sole suspension point.
//! - [`WaitStrategy`]: the protocol invoked around a suspension; its two
//!   hooks are where wait-list membership is installed and removed.
//! - [`WaitList`]: the threadsafe FIFO of parked tasks that each
//!   primitive owns, with a lock-free occupancy counter for notify fast
//!   paths.
//! - [`ConditionVariable`]: monitor-style waiting, generic over any
//!   caller-supplied lock with the [`RawLock`] capability.
//!
//! # Concurrency model
//!
//! Tasks are cooperative: a task runs until it suspends through `sleep`,
//! and distinct tasks run in parallel on distinct OS threads, so every
//! structure here is safe under true parallelism. A task's wakeup is
//! single-winner — when notification, deadline, and cancellation race,
//! exactly one source is reported and the rest are discarded.
//!
//! Contract violations (an impossible wakeup source, destroying a
//! primitive that still has waiters, protocol hooks run twice) abort the
//! process; recoverable outcomes are values, never panics.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod fatal;

pub mod sync;
pub mod task;
pub mod test_utils;
pub mod time;

pub use sync::{ConditionVariable, CvStatus, RawLock, WaitList, WaitListLock, WaitersScope};
pub use task::{TaskContext, TaskId, WaitStrategy, WakeupSource};
pub use time::Deadline;
