//! Condition variable for cooperative tasks, generic over the caller's lock.
//!
//! [`ConditionVariable`] suspends the calling task until another task
//! notifies it, a deadline is reached, or cancellation is delivered. It
//! works with any lock implementing [`RawLock`] — the lock is released
//! and reacquired around the suspension by the primitive itself.
//!
//! # The atomic park
//!
//! The hard part of a monitor is the "release lock, enqueue, sleep" step.
//! Here it is split across a [`WaitStrategy`]: the wait-list mutex is
//! taken *before* suspending (in the strategy's constructor — once the
//! task has been marked suspended it must not block on anything that
//! could park again), the task is appended and both locks released in
//! `after_asleep`, and the dequeue plus user-lock reacquisition happen in
//! `before_awake`. Because the append completes before the user lock is
//! released, a notifier that mutates state under the lock and then
//! notifies can never miss a task that observed the old state.
//!
//! # Cancellation and deadlines
//!
//! Both surface as a [`CvStatus`] instead of an error: a reached deadline
//! yields [`CvStatus::Timeout`], delivered cancellation yields
//! [`CvStatus::Cancelled`]. Cancellation is sticky — once delivered,
//! every subsequent wait on that task short-circuits. On *every* return
//! path the user lock is held again; the deadline governs the sleep, not
//! the time spent reacquiring the lock.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use taskpark::{ConditionVariable, RawLock};
//!
//! type Lock = parking_lot::RawMutex;
//!
//! struct Shared {
//!     lock: Lock,
//!     ready: AtomicBool,
//!     cv: ConditionVariable<Lock>,
//! }
//!
//! let shared = Arc::new(Shared {
//!     lock: <Lock as parking_lot::lock_api::RawMutex>::INIT,
//!     ready: AtomicBool::new(false),
//!     cv: ConditionVariable::new(),
//! });
//!
//! let consumer = {
//!     let shared = Arc::clone(&shared);
//!     std::thread::spawn(move || {
//!         shared.lock.lock();
//!         let observed = shared
//!             .cv
//!             .wait_with(&shared.lock, || shared.ready.load(Ordering::Relaxed));
//!         shared.lock.unlock();
//!         observed
//!     })
//! };
//!
//! shared.lock.lock();
//! shared.ready.store(true, Ordering::Relaxed);
//! shared.lock.unlock();
//! shared.cv.notify_one();
//!
//! assert!(consumer.join().unwrap());
//! ```

use std::marker::PhantomData;
use std::time::Duration;

use crate::fatal;
use crate::sync::lock::RawLock;
use crate::sync::wait_list::{WaitList, WaitListLock, WaitersScope};
use crate::task::{TaskContext, WaitStrategy, WakeupSource};
use crate::time::Deadline;

/// Outcome of a non-predicate wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvStatus {
    /// Woken by a notification before any deadline.
    NoTimeout,
    /// The deadline was reached.
    Timeout,
    /// Cancellation was delivered to the waiting task.
    Cancelled,
}

impl CvStatus {
    /// Returns true for [`CvStatus::NoTimeout`].
    #[must_use]
    pub const fn is_no_timeout(&self) -> bool {
        matches!(self, Self::NoTimeout)
    }

    /// Returns true for [`CvStatus::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns true for [`CvStatus::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for CvStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTimeout => write!(f, "no timeout"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Strategy binding one suspension to a wait list and the user's lock.
///
/// The wait-list mutex is acquired in the constructor, before the task
/// suspends; `after_asleep` consumes it. Holding it across the park
/// transition is what makes enqueue-then-release-user-lock atomic with
/// respect to notifiers.
struct CvWaitStrategy<'a, L: RawLock> {
    deadline: Deadline,
    waiters: &'a WaitList,
    _scope: WaitersScope<'a>,
    queue: Option<WaitListLock<'a>>,
    current: &'a TaskContext,
    user_lock: &'a L,
    awake_ran: bool,
}

impl<'a, L: RawLock> CvWaitStrategy<'a, L> {
    fn new(
        deadline: Deadline,
        waiters: &'a WaitList,
        current: &'a TaskContext,
        user_lock: &'a L,
    ) -> Self {
        let scope = waiters.waiters_scope();
        let mut queue = waiters.lock();
        // The append in after_asleep runs inside the suspension protocol
        // and must not allocate.
        queue.reserve_slot();
        Self {
            deadline,
            waiters,
            _scope: scope,
            queue: Some(queue),
            current,
            user_lock,
            awake_ran: false,
        }
    }
}

impl<L: RawLock> WaitStrategy for CvWaitStrategy<'_, L> {
    fn deadline(&self) -> Deadline {
        self.deadline
    }

    fn after_asleep(&mut self) {
        debug_assert!(
            TaskContext::current().same_task(self.current),
            "strategy hooks run on the suspending task's thread"
        );
        let Some(mut queue) = self.queue.take() else {
            fatal::contract_violation("after_asleep invoked twice for one suspension");
        };
        queue.append(self.current);
        // Release order matters: the wait-list mutex first, so a notifier
        // that observes a non-empty queue finds this task; the user lock
        // last, so state-change-then-notify on the notifier's side always
        // happens after this task is enqueued.
        drop(queue);
        self.user_lock.unlock();
    }

    fn before_awake(&mut self) {
        debug_assert!(
            TaskContext::current().same_task(self.current),
            "strategy hooks run on the suspending task's thread"
        );
        if self.awake_ran {
            fatal::contract_violation("before_awake invoked twice for one suspension");
        }
        self.awake_ran = true;
        // Idempotent: a list wake already unlinked this task, a deadline
        // or cancellation wake has not.
        self.waiters.lock().remove(self.current);
        self.user_lock.lock();
    }
}

/// A condition variable for cooperative tasks.
///
/// Generic over the caller's lock type `L`; see [`RawLock`] for the
/// required capability. The caller must hold the lock when entering any
/// `wait*` operation and holds it again on every return, including
/// timeout and cancellation.
///
/// The primitive must not be dropped while any task is inside a `wait*`
/// call on it; doing so is a contract violation caught by the wait
/// list's destructor. (During a wait the borrow checker already pins the
/// primitive in place — every pending strategy borrows its wait list.)
pub struct ConditionVariable<L> {
    waiters: WaitList,
    _lock: PhantomData<fn(&L)>,
}

impl<L> std::fmt::Debug for ConditionVariable<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionVariable")
            .field("waiters", &self.waiters)
            .finish()
    }
}

impl<L: RawLock> Default for ConditionVariable<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: RawLock> ConditionVariable<L> {
    /// Creates a condition variable with no waiters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            waiters: WaitList::new(),
            _lock: PhantomData,
        }
    }

    /// Waits until notified.
    ///
    /// Equivalent to [`wait_until`](Self::wait_until) with
    /// [`Deadline::NEVER`].
    #[must_use = "a Cancelled status must not be ignored"]
    pub fn wait(&self, lock: &L) -> CvStatus {
        self.wait_until(lock, Deadline::NEVER)
    }

    /// Waits until notified, the deadline is reached, or the calling
    /// task is cancelled.
    ///
    /// A deadline already reached returns [`CvStatus::Timeout`] and a
    /// pending cancellation returns [`CvStatus::Cancelled`], both without
    /// parking. The caller must hold `lock`; it is held again when this
    /// returns.
    #[must_use = "the status distinguishes notification, timeout, and cancellation"]
    pub fn wait_until(&self, lock: &L, deadline: Deadline) -> CvStatus {
        if deadline.is_reached() {
            return CvStatus::Timeout;
        }

        let current = TaskContext::current();
        if current.should_cancel() {
            return CvStatus::Cancelled;
        }

        let mut strategy = CvWaitStrategy::new(deadline, &self.waiters, &current, lock);
        match current.sleep(&mut strategy) {
            WakeupSource::WaitList => CvStatus::NoTimeout,
            WakeupSource::DeadlineTimer => CvStatus::Timeout,
            WakeupSource::CancelRequest => CvStatus::Cancelled,
            WakeupSource::None | WakeupSource::Bootstrap => {
                fatal::contract_violation("invalid wakeup source reported to condition variable")
            }
        }
    }

    /// Waits with a relative timeout.
    #[must_use = "the status distinguishes notification, timeout, and cancellation"]
    pub fn wait_for(&self, lock: &L, timeout: Duration) -> CvStatus {
        self.wait_until(lock, Deadline::after(timeout))
    }

    /// Waits until the predicate holds.
    ///
    /// Equivalent to [`wait_until_with`](Self::wait_until_with) with
    /// [`Deadline::NEVER`].
    #[must_use = "a false result means the wait was cancelled"]
    pub fn wait_with<P>(&self, lock: &L, predicate: P) -> bool
    where
        P: FnMut() -> bool,
    {
        self.wait_until_with(lock, Deadline::NEVER, predicate)
    }

    /// Waits until the predicate holds, the deadline is reached, or the
    /// calling task is cancelled.
    ///
    /// The predicate is evaluated only while `lock` is held and must not
    /// suspend. Returns the final predicate value; timeout and
    /// cancellation both surface as `false` unless the predicate observed
    /// satisfying state. Use
    /// [`wait_until_with_status`](Self::wait_until_with_status) to
    /// distinguish them.
    #[must_use = "a false result means the wait timed out or was cancelled"]
    pub fn wait_until_with<P>(&self, lock: &L, deadline: Deadline, predicate: P) -> bool
    where
        P: FnMut() -> bool,
    {
        self.wait_until_with_status(lock, deadline, predicate).0
    }

    /// Waits with a relative timeout until the predicate holds.
    #[must_use = "a false result means the wait timed out or was cancelled"]
    pub fn wait_for_with<P>(&self, lock: &L, timeout: Duration, predicate: P) -> bool
    where
        P: FnMut() -> bool,
    {
        self.wait_until_with(lock, Deadline::after(timeout), predicate)
    }

    /// Predicate wait that also reports how the loop ended.
    ///
    /// Each loop iteration that is woken from the list without the
    /// predicate becoming true is accounted as a spurious wakeup on the
    /// calling task.
    #[must_use = "the status distinguishes notification, timeout, and cancellation"]
    pub fn wait_until_with_status<P>(
        &self,
        lock: &L,
        deadline: Deadline,
        mut predicate: P,
    ) -> (bool, CvStatus)
    where
        P: FnMut() -> bool,
    {
        let current = TaskContext::current();
        let mut satisfied = predicate();
        let mut status = CvStatus::NoTimeout;
        while !satisfied && status == CvStatus::NoTimeout {
            status = self.wait_until(lock, deadline);
            satisfied = predicate();
            if !satisfied && status == CvStatus::NoTimeout {
                current.account_spurious_wakeup();
            }
        }
        (satisfied, status)
    }

    /// Wakes the longest-waiting task, if any.
    ///
    /// Never touches the user lock, so it is safe to call while holding
    /// it. The empty check reads the sleepies counter without taking the
    /// wait-list mutex; a concurrent waiter that enqueues right after the
    /// read is not missed, because that waiter still holds the user lock
    /// until its enqueue is visible — a notifier that mutated state under
    /// the lock and then called this cannot have raced past it.
    pub fn notify_one(&self) {
        if self.waiters.sleepies_count() > 0 {
            self.waiters.lock().wakeup_one();
        }
    }

    /// Wakes every waiting task.
    ///
    /// Same fast path and ordering argument as
    /// [`notify_one`](Self::notify_one).
    pub fn notify_all(&self) {
        if self.waiters.sleepies_count() > 0 {
            self.waiters.lock().wakeup_all();
        }
    }

    /// Returns the number of tasks currently parked on this primitive.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.waiters.sleepies_count()
    }
}
