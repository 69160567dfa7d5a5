//! The suspension protocol between a task and a waiting primitive.
//!
//! A [`WaitStrategy`] is handed to [`TaskContext::sleep`] and is invoked
//! at two precisely defined points around the suspension. The strategy is
//! what makes "release lock, enqueue, sleep" atomic with respect to
//! notifiers: the enqueue happens in [`after_asleep`], once the task is
//! already wakeable, and the dequeue happens in [`before_awake`], before
//! the task resumes user code.
//!
//! [`TaskContext::sleep`]: crate::task::TaskContext::sleep
//! [`after_asleep`]: WaitStrategy::after_asleep
//! [`before_awake`]: WaitStrategy::before_awake

use crate::time::Deadline;

/// Protocol object invoked around a task suspension.
///
/// # Contract
///
/// For a single call to `sleep`:
///
/// 1. `after_asleep` is invoked exactly once, after the task has been
///    marked suspended and is no longer runnable. From this point, other
///    threads that find the task in a wait list may legally wake it.
/// 2. `before_awake` is invoked exactly once, after a wakeup source has
///    been chosen and before `sleep` returns to user code.
/// 3. A reached [`deadline`](Self::deadline) makes the chosen source
///    [`WakeupSource::DeadlineTimer`](crate::task::WakeupSource).
/// 4. Cancellation pending at suspension, or delivered during it, makes
///    the chosen source
///    [`WakeupSource::CancelRequest`](crate::task::WakeupSource).
/// 5. When sources race, exactly one wins; the rest are discarded.
///
/// Hooks must not allocate and must not panic. An implementation that is
/// invoked twice for the same hook must treat it as a contract violation.
pub trait WaitStrategy {
    /// The deadline governing this suspension.
    fn deadline(&self) -> Deadline;

    /// Runs once the task is parked and may be woken by others.
    fn after_asleep(&mut self);

    /// Runs after a wakeup source is chosen, before user code resumes.
    fn before_awake(&mut self);
}
