//! Threadsafe FIFO of task contexts parked on one waiting primitive.
//!
//! A [`WaitList`] is owned by a synchronization primitive and holds the
//! tasks currently suspended on it. Queue operations are methods on
//! [`WaitListLock`], the scoped acquisition of the internal mutex, so
//! holding the mutex is proven by construction. The sleepies counter is
//! readable without the mutex for the notify fast path, and the
//! [`WaitersScope`] token keeps the list observably busy for the whole
//! intent-to-wait window of each task.

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::fatal;
use crate::task::{TaskContext, WakeupSource};

/// FIFO queue of suspended task contexts.
#[derive(Debug, Default)]
pub struct WaitList {
    /// Queue cardinality, readable without the mutex.
    sleepies: AtomicUsize,
    /// Live intent-to-wait tokens, including tasks not yet queued.
    waiter_scopes: AtomicUsize,
    queue: Mutex<VecDeque<TaskContext>>,
}

impl WaitList {
    /// Creates an empty wait list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the internal mutex.
    #[must_use]
    pub fn lock(&self) -> WaitListLock<'_> {
        WaitListLock {
            list: self,
            queue: self.queue.lock(),
        }
    }

    /// Returns the number of queued tasks without taking the mutex.
    ///
    /// Advisory: a racing append may complete right after the read. The
    /// monitor protocol makes that benign — see
    /// [`ConditionVariable::notify_one`](crate::sync::ConditionVariable::notify_one).
    #[must_use]
    pub fn sleepies_count(&self) -> usize {
        self.sleepies.load(Ordering::Relaxed)
    }

    /// Takes an intent-to-wait token for this list.
    #[must_use]
    pub fn waiters_scope(&self) -> WaitersScope<'_> {
        self.waiter_scopes.fetch_add(1, Ordering::Relaxed);
        WaitersScope { list: self }
    }

    #[cfg(test)]
    fn waiter_scope_count(&self) -> usize {
        self.waiter_scopes.load(Ordering::Acquire)
    }
}

impl Drop for WaitList {
    fn drop(&mut self) {
        let scopes = *self.waiter_scopes.get_mut();
        let queued = self.queue.get_mut().len();
        if scopes != 0 || queued != 0 {
            fatal::contract_violation("wait list destroyed while tasks are waiting on it");
        }
    }
}

/// Scoped acquisition of a wait list's internal mutex.
///
/// All queue operations live here; the mutex is released when the lock
/// is dropped, on every exit path.
pub struct WaitListLock<'a> {
    list: &'a WaitList,
    queue: MutexGuard<'a, VecDeque<TaskContext>>,
}

impl WaitListLock<'_> {
    /// Appends a task to the tail of the queue.
    ///
    /// A task may appear at most once in a given list.
    pub fn append(&mut self, task: &TaskContext) {
        debug_assert!(
            !self.queue.iter().any(|queued| queued.same_task(task)),
            "task appended to a wait list it is already queued on"
        );
        self.queue.push_back(task.clone());
        self.list.sleepies.fetch_add(1, Ordering::Relaxed);
    }

    /// Unlinks a task if it is still queued. Idempotent.
    ///
    /// Returns true if the task was present.
    pub fn remove(&mut self, task: &TaskContext) -> bool {
        let Some(index) = self.queue.iter().position(|queued| queued.same_task(task)) else {
            return false;
        };
        self.queue.remove(index);
        self.list.sleepies.fetch_sub(1, Ordering::Relaxed);
        true
    }

    /// Wakes the longest-sleeping task, if any.
    ///
    /// The task is unlinked and woken with [`WakeupSource::WaitList`]. A
    /// task already woken by its deadline or by cancellation discards the
    /// wake; the wake right is consumed either way.
    pub fn wakeup_one(&mut self) {
        if let Some(task) = self.queue.pop_front() {
            self.list.sleepies.fetch_sub(1, Ordering::Relaxed);
            task.try_wake(WakeupSource::WaitList);
        }
    }

    /// Wakes every queued task in one pass.
    ///
    /// The queue and counter are consistent before any task is signalled,
    /// so a woken task's own defensive `remove` scans an already-empty
    /// queue.
    pub fn wakeup_all(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let woken: SmallVec<[TaskContext; 8]> = self.queue.drain(..).collect();
        self.list.sleepies.fetch_sub(woken.len(), Ordering::Relaxed);
        tracing::trace!(count = woken.len(), "waking all queued tasks");
        for task in woken {
            task.try_wake(WakeupSource::WaitList);
        }
    }

    /// Pre-grows the queue so one subsequent [`append`](Self::append)
    /// cannot allocate.
    pub fn reserve_slot(&mut self) {
        self.queue.reserve(1);
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl std::fmt::Debug for WaitListLock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitListLock")
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// RAII token covering a task's intent-to-wait window.
///
/// Held from the moment a task decides to wait until it has fully
/// detached from the list, so a racing destructor of the owning
/// primitive can detect in-flight waiters.
#[derive(Debug)]
pub struct WaitersScope<'a> {
    list: &'a WaitList,
}

impl Drop for WaitersScope<'_> {
    fn drop(&mut self) {
        self.list.waiter_scopes.fetch_sub(1, Ordering::Release);
    }
}
