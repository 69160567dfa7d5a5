//! Absolute deadlines with a representable "never" sentinel.
//!
//! A [`Deadline`] converts a wait into a timeout once it is reached. The
//! sentinel [`Deadline::NEVER`] never fires, so unbounded and bounded
//! waits share one code path.

use std::time::{Duration, Instant};

/// An absolute point in time after which a wait times out.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskpark::Deadline;
///
/// let soon = Deadline::after(Duration::from_millis(50));
/// assert!(!soon.is_never());
///
/// let never = Deadline::NEVER;
/// assert!(!never.is_reached());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that is never reached.
    pub const NEVER: Self = Self { at: None };

    /// Creates a deadline at the given instant.
    #[must_use]
    pub const fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// Creates a deadline the given duration from now.
    ///
    /// A duration too large to represent saturates to [`Self::NEVER`].
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(instant) => Self::at(instant),
            None => Self::NEVER,
        }
    }

    /// Returns true if this is the never-reached sentinel.
    #[must_use]
    pub const fn is_never(&self) -> bool {
        self.at.is_none()
    }

    /// Returns true if the deadline has passed.
    #[must_use]
    pub fn is_reached(&self) -> bool {
        match self.at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Returns the underlying instant, or `None` for the sentinel.
    #[must_use]
    pub const fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Returns the time remaining until the deadline.
    ///
    /// Returns `None` for the sentinel and `Some(Duration::ZERO)` once
    /// the deadline has passed.
    #[must_use]
    pub fn time_left(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::NEVER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn never_is_not_reached() {
        init_test("never_is_not_reached");
        let deadline = Deadline::NEVER;
        crate::assert_with_log!(deadline.is_never(), "sentinel", true, deadline.is_never());
        crate::assert_with_log!(
            !deadline.is_reached(),
            "never not reached",
            false,
            deadline.is_reached()
        );
        crate::assert_with_log!(
            deadline.time_left().is_none(),
            "no time left for sentinel",
            None::<Duration>,
            deadline.time_left()
        );
        crate::test_complete!("never_is_not_reached");
    }

    #[test]
    fn past_instant_is_reached() {
        init_test("past_instant_is_reached");
        let deadline = Deadline::at(Instant::now());
        // `Instant::now() >= at` holds immediately for a deadline at now.
        crate::assert_with_log!(
            deadline.is_reached(),
            "deadline at now is reached",
            true,
            deadline.is_reached()
        );
        crate::test_complete!("past_instant_is_reached");
    }

    #[test]
    fn future_deadline_not_reached() {
        init_test("future_deadline_not_reached");
        let deadline = Deadline::after(Duration::from_secs(60));
        crate::assert_with_log!(
            !deadline.is_reached(),
            "future deadline pending",
            false,
            deadline.is_reached()
        );
        let left = deadline.time_left().expect("bounded deadline");
        crate::assert_with_log!(
            left <= Duration::from_secs(60),
            "time left bounded by timeout",
            true,
            left <= Duration::from_secs(60)
        );
        crate::test_complete!("future_deadline_not_reached");
    }

    #[test]
    fn time_left_saturates_at_zero() {
        init_test("time_left_saturates_at_zero");
        let deadline = Deadline::at(Instant::now());
        std::thread::sleep(Duration::from_millis(5));
        crate::assert_with_log!(
            deadline.time_left() == Some(Duration::ZERO),
            "past deadline has zero left",
            Some(Duration::ZERO),
            deadline.time_left()
        );
        crate::test_complete!("time_left_saturates_at_zero");
    }

    #[test]
    fn default_is_never() {
        init_test("default_is_never");
        let deadline = Deadline::default();
        crate::assert_with_log!(deadline.is_never(), "default sentinel", true, deadline.is_never());
        crate::test_complete!("default_is_never");
    }
}
