//! The locking capability required of a caller-supplied lock.

#![allow(unsafe_code)]

/// Minimal locking capability for the lock a caller pairs with a
/// [`ConditionVariable`](crate::sync::ConditionVariable).
///
/// Nothing beyond raw `lock`/`unlock` is required: the lock need not be
/// recursive, need not carry data, and need not be the process mutex.
/// Lock wrappers that layer extra bookkeeping (ownership tracking,
/// contention accounting) qualify as long as both operations are scoped
/// and infallible.
///
/// `unlock` is only ever invoked on behalf of a holder: the `wait*`
/// operations require the caller to hold the lock at entry and release
/// it exactly once per suspension.
pub trait RawLock {
    /// Acquires the lock, blocking the thread until it is available.
    fn lock(&self);

    /// Releases the lock held by the caller.
    fn unlock(&self);
}

impl RawLock for parking_lot::RawMutex {
    #[inline]
    fn lock(&self) {
        parking_lot::lock_api::RawMutex::lock(self);
    }

    #[inline]
    fn unlock(&self) {
        // Safety: the waiting protocol only releases a lock its caller
        // holds (precondition of every `wait*` entry point).
        unsafe { parking_lot::lock_api::RawMutex::unlock(self) }
    }
}
