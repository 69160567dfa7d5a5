//! Shared test infrastructure.
//!
//! Unit and integration tests initialize logging through
//! [`init_test_logging`] and make their checks through the
//! [`assert_with_log!`](crate::assert_with_log) family of macros so a
//! failing run carries the full event trail. [`TestLock`] is a plain
//! blocking lock implementing [`RawLock`], used as the caller-supplied
//! lock in tests.

use parking_lot::{Condvar, Mutex};
use std::sync::Once;

use crate::sync::RawLock;

/// Installs the test tracing subscriber once per process.
///
/// The filter is read from the `TEST_LOG` environment variable and
/// defaults to `info`. Output goes through the test writer so it is
/// captured per test.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_env("TEST_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Blocking lock with the [`RawLock`] capability, for tests.
///
/// Tracks its held state so tests can assert the lock invariant on
/// return from a wait.
#[derive(Debug, Default)]
pub struct TestLock {
    locked: Mutex<bool>,
    released: Condvar,
}

impl TestLock {
    /// Creates an unlocked test lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while some caller holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        *self.locked.lock()
    }
}

impl RawLock for TestLock {
    fn lock(&self) {
        let mut locked = self.locked.lock();
        while *locked {
            self.released.wait(&mut locked);
        }
        *locked = true;
    }

    fn unlock(&self) {
        {
            let mut locked = self.locked.lock();
            assert!(*locked, "unlock of a TestLock that is not held");
            *locked = false;
        }
        self.released.notify_one();
    }
}

/// Marks the beginning of a named test.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "test start");
    };
}

/// Marks successful completion of a named test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = $name, "test complete");
    };
}

/// Checks a condition, logging expected and actual values on failure.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $what:expr, $expected:expr, $actual:expr) => {
        if $cond {
            tracing::debug!(check = $what, "check passed");
        } else {
            tracing::error!(
                check = $what,
                expected = ?$expected,
                actual = ?$actual,
                "check failed"
            );
            panic!("{}: expected {:?}, actual {:?}", $what, $expected, $actual);
        }
    };
}
