//! Per-task state: identity, cancellation, and the suspension point.
//!
//! A [`TaskContext`] is the record a waiting primitive interacts with. It
//! carries the task's identity, its sticky cancellation flag, a
//! spurious-wakeup counter, and [`sleep`](TaskContext::sleep) — the sole
//! suspension point of a cooperative task.
//!
//! # Scheduling model
//!
//! The surrounding framework schedules M:N fibers on a thread pool; that
//! scheduler is not part of this crate. Here each OS thread hosts exactly
//! one cooperative task, and `sleep` parks the hosting thread. The
//! interface is the one the waiting primitives consume, so a fiber
//! scheduler can swap in its own parking without touching them.
//!
//! # Thread safety
//!
//! `TaskContext` is cheaply clonable and `Send + Sync`; clones share the
//! same task state, so a cancellation delivered through one handle is
//! observed by all of them. Semantically a context belongs to one task:
//! only that task calls `sleep` on it.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::fatal;
use crate::task::WaitStrategy;

/// Process-unique identity of a cooperative task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Why a parked task became runnable again.
///
/// `None` and `Bootstrap` belong to the scheduler's internal protocol
/// (`None` is the "no source chosen yet" state, `Bootstrap` the initial
/// wakeup that starts a task); a completed [`TaskContext::sleep`] never
/// returns either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupSource {
    /// No wakeup has been chosen yet.
    None,
    /// The initial wakeup that starts a task.
    Bootstrap,
    /// A wait list the task was parked on woke it.
    WaitList,
    /// The sleep deadline fired.
    DeadlineTimer,
    /// A cancellation request was delivered.
    CancelRequest,
}

#[derive(Debug)]
struct SleepState {
    /// Whether the task is currently suspended in `sleep`.
    sleeping: bool,
    /// The chosen wakeup source; `None` until a winner is picked.
    source: WakeupSource,
}

#[derive(Debug)]
struct TaskInner {
    id: TaskId,
    sleep_state: Mutex<SleepState>,
    wakeup: Condvar,
    cancel_requested: AtomicBool,
    spurious_wakeups: AtomicU64,
}

/// Handle to the state of one cooperative task.
#[derive(Debug, Clone)]
pub struct TaskContext {
    inner: Arc<TaskInner>,
}

thread_local! {
    static CURRENT_TASK: TaskContext = TaskContext::new();
}

impl TaskContext {
    fn new() -> Self {
        let id = TaskId::next();
        tracing::trace!(%id, "task context created");
        Self {
            inner: Arc::new(TaskInner {
                id,
                sleep_state: Mutex::new(SleepState {
                    sleeping: false,
                    source: WakeupSource::None,
                }),
                wakeup: Condvar::new(),
                cancel_requested: AtomicBool::new(false),
                spurious_wakeups: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the calling thread's task context.
    ///
    /// The context is created lazily on first use; every call on the same
    /// thread observes the same task.
    #[must_use]
    pub fn current() -> Self {
        CURRENT_TASK.with(Clone::clone)
    }

    /// Returns this task's identity.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Returns true if both handles refer to the same task.
    #[must_use]
    pub fn same_task(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns true if a cancellation request has been delivered.
    ///
    /// Cancellation is sticky: once delivered it is never cleared.
    #[must_use]
    pub fn should_cancel(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    /// Delivers a cancellation request to this task.
    ///
    /// Sets the sticky flag and, if the task is suspended with no wakeup
    /// source chosen yet, wakes it with [`WakeupSource::CancelRequest`].
    pub fn request_cancel(&self) {
        self.inner.cancel_requested.store(true, Ordering::Release);
        if self.try_wake(WakeupSource::CancelRequest) {
            tracing::trace!(id = %self.inner.id, "cancel delivered to sleeping task");
        }
    }

    /// Increments the spurious-wakeup counter.
    pub fn account_spurious_wakeup(&self) {
        self.inner.spurious_wakeups.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns how many spurious wakeups this task has absorbed.
    #[must_use]
    pub fn spurious_wakeup_count(&self) -> u64 {
        self.inner.spurious_wakeups.load(Ordering::Relaxed)
    }

    /// Suspends the current task until a wakeup source is chosen.
    ///
    /// The sole suspension point. The strategy's hooks run at the points
    /// described in [`WaitStrategy`]; the strategy's deadline converts the
    /// sleep into a [`WakeupSource::DeadlineTimer`] wake once reached.
    ///
    /// Must be called by the task this context belongs to; re-entering
    /// `sleep` while suspended is a contract violation.
    pub fn sleep(&self, strategy: &mut dyn WaitStrategy) -> WakeupSource {
        let deadline = strategy.deadline();

        {
            let mut state = self.inner.sleep_state.lock();
            if state.sleeping {
                fatal::contract_violation("sleep re-entered while task is suspended");
            }
            state.sleeping = true;
            state.source = WakeupSource::None;
        }

        // The task is now wakeable: a notifier that finds it in a wait
        // list after the append below may deliver the wake before this
        // thread ever blocks.
        strategy.after_asleep();

        if self.inner.cancel_requested.load(Ordering::Acquire) {
            self.try_wake(WakeupSource::CancelRequest);
        }

        let source = {
            let mut state = self.inner.sleep_state.lock();
            let source = loop {
                if state.source != WakeupSource::None {
                    break state.source;
                }
                match deadline.instant() {
                    None => {
                        self.inner.wakeup.wait(&mut state);
                    }
                    Some(at) => {
                        let timed_out = self.inner.wakeup.wait_until(&mut state, at).timed_out();
                        if timed_out && state.source == WakeupSource::None {
                            state.source = WakeupSource::DeadlineTimer;
                        }
                    }
                }
            };
            state.sleeping = false;
            state.source = WakeupSource::None;
            source
        };

        tracing::trace!(id = %self.inner.id, ?source, "task woke");
        strategy.before_awake();
        source
    }

    /// Returns true if the task is currently suspended in `sleep`.
    pub(crate) fn is_sleeping(&self) -> bool {
        self.inner.sleep_state.lock().sleeping
    }

    /// Attempts to wake a suspended task with the given source.
    ///
    /// Exactly one wake attempt wins per suspension: returns false if the
    /// task is not suspended or a source has already been chosen, and the
    /// attempt is discarded.
    pub(crate) fn try_wake(&self, source: WakeupSource) -> bool {
        debug_assert!(
            !matches!(source, WakeupSource::None),
            "cannot wake with the unchosen-source sentinel"
        );
        let mut state = self.inner.sleep_state.lock();
        if !state.sleeping || state.source != WakeupSource::None {
            return false;
        }
        state.source = source;
        self.inner.wakeup.notify_one();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use crate::time::Deadline;
    use std::sync::mpsc;
    use std::time::Duration;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    /// Strategy that only carries a deadline and counts hook invocations.
    struct CountingStrategy {
        deadline: Deadline,
        asleep_calls: u32,
        awake_calls: u32,
    }

    impl CountingStrategy {
        fn new(deadline: Deadline) -> Self {
            Self {
                deadline,
                asleep_calls: 0,
                awake_calls: 0,
            }
        }
    }

    impl WaitStrategy for CountingStrategy {
        fn deadline(&self) -> Deadline {
            self.deadline
        }

        fn after_asleep(&mut self) {
            self.asleep_calls += 1;
        }

        fn before_awake(&mut self) {
            self.awake_calls += 1;
        }
    }

    #[test]
    fn current_is_stable_per_thread() {
        init_test("current_is_stable_per_thread");
        let first = TaskContext::current();
        let second = TaskContext::current();
        let same = first.same_task(&second);
        crate::assert_with_log!(same, "current() is one task per thread", true, same);
        crate::assert_with_log!(
            first.id() == second.id(),
            "ids match",
            first.id(),
            second.id()
        );
        crate::test_complete!("current_is_stable_per_thread");
    }

    #[test]
    fn current_differs_across_threads() {
        init_test("current_differs_across_threads");
        let here = TaskContext::current();
        let there = std::thread::spawn(TaskContext::current)
            .join()
            .expect("thread panicked");
        let distinct = !here.same_task(&there);
        crate::assert_with_log!(distinct, "each thread hosts its own task", true, distinct);
        crate::test_complete!("current_differs_across_threads");
    }

    #[test]
    fn sleep_returns_deadline_timer() {
        init_test("sleep_returns_deadline_timer");
        let task = TaskContext::current();
        let mut strategy = CountingStrategy::new(Deadline::after(Duration::from_millis(10)));

        let source = task.sleep(&mut strategy);
        crate::assert_with_log!(
            source == WakeupSource::DeadlineTimer,
            "deadline wake",
            WakeupSource::DeadlineTimer,
            source
        );
        crate::assert_with_log!(
            strategy.asleep_calls == 1,
            "after_asleep once",
            1u32,
            strategy.asleep_calls
        );
        crate::assert_with_log!(
            strategy.awake_calls == 1,
            "before_awake once",
            1u32,
            strategy.awake_calls
        );
        crate::test_complete!("sleep_returns_deadline_timer");
    }

    #[test]
    fn cancel_pending_at_sleep_wins() {
        init_test("cancel_pending_at_sleep_wins");
        let task = TaskContext::current();
        task.request_cancel();

        let mut strategy = CountingStrategy::new(Deadline::after(Duration::from_secs(60)));
        let source = task.sleep(&mut strategy);
        crate::assert_with_log!(
            source == WakeupSource::CancelRequest,
            "pending cancel chosen",
            WakeupSource::CancelRequest,
            source
        );
        crate::assert_with_log!(
            strategy.awake_calls == 1,
            "before_awake still runs",
            1u32,
            strategy.awake_calls
        );
        crate::test_complete!("cancel_pending_at_sleep_wins");
    }

    #[test]
    fn cross_thread_wake_returns_wait_list() {
        init_test("cross_thread_wake_returns_wait_list");
        let (tx, rx) = mpsc::channel();

        let sleeper = std::thread::spawn(move || {
            let task = TaskContext::current();
            tx.send(task.clone()).expect("send task handle");
            let mut strategy = CountingStrategy::new(Deadline::NEVER);
            task.sleep(&mut strategy)
        });

        let task = rx.recv().expect("task handle");
        // Spin until the sleeper is actually suspended, then wake it.
        loop {
            if task.try_wake(WakeupSource::WaitList) {
                break;
            }
            std::thread::yield_now();
        }

        let source = sleeper.join().expect("sleeper panicked");
        crate::assert_with_log!(
            source == WakeupSource::WaitList,
            "list wake wins",
            WakeupSource::WaitList,
            source
        );
        crate::test_complete!("cross_thread_wake_returns_wait_list");
    }

    #[test]
    fn second_wake_attempt_is_discarded() {
        init_test("second_wake_attempt_is_discarded");
        let (tx, rx) = mpsc::channel();

        let sleeper = std::thread::spawn(move || {
            let task = TaskContext::current();
            tx.send(task.clone()).expect("send task handle");
            let mut strategy = CountingStrategy::new(Deadline::NEVER);
            task.sleep(&mut strategy)
        });

        let task = rx.recv().expect("task handle");
        loop {
            if task.try_wake(WakeupSource::WaitList) {
                break;
            }
            std::thread::yield_now();
        }

        // Whether the sleeper has resumed yet or not, the race is over:
        // a second attempt must lose.
        let second = task.try_wake(WakeupSource::DeadlineTimer);
        crate::assert_with_log!(!second, "later attempt discarded", false, second);

        let source = sleeper.join().expect("sleeper panicked");
        crate::assert_with_log!(
            source == WakeupSource::WaitList,
            "first attempt is the winner",
            WakeupSource::WaitList,
            source
        );
        crate::test_complete!("second_wake_attempt_is_discarded");
    }

    #[test]
    fn wake_on_awake_task_is_discarded() {
        init_test("wake_on_awake_task_is_discarded");
        let task = TaskContext::current();
        let woken = task.try_wake(WakeupSource::WaitList);
        crate::assert_with_log!(!woken, "awake task ignores wake", false, woken);
        crate::test_complete!("wake_on_awake_task_is_discarded");
    }

    #[test]
    fn cancellation_is_sticky() {
        init_test("cancellation_is_sticky");
        let task = std::thread::spawn(|| {
            let task = TaskContext::current();
            task.request_cancel();
            task
        })
        .join()
        .expect("thread panicked");

        crate::assert_with_log!(
            task.should_cancel(),
            "flag visible through clone",
            true,
            task.should_cancel()
        );
        crate::test_complete!("cancellation_is_sticky");
    }

    #[test]
    fn spurious_wakeup_accounting() {
        init_test("spurious_wakeup_accounting");
        let task = TaskContext::current();
        let before = task.spurious_wakeup_count();
        task.account_spurious_wakeup();
        task.account_spurious_wakeup();
        let after = task.spurious_wakeup_count();
        crate::assert_with_log!(after == before + 2, "counter advanced", before + 2, after);
        crate::test_complete!("spurious_wakeup_accounting");
    }

    #[test]
    fn task_id_display() {
        init_test("task_id_display");
        let task = TaskContext::current();
        let shown = task.id().to_string();
        crate::assert_with_log!(
            shown.starts_with("task-"),
            "display prefix",
            true,
            shown.starts_with("task-")
        );
        crate::test_complete!("task_id_display");
    }
}
