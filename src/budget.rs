//! Wall-clock execution budget shared by every stage of the image workflow.
//!
//! The hosting environment kills the process once a fixed ceiling elapses, so
//! every poll loop asks the budget how much time is left before it suspends.
//! Nothing here interrupts a running future; loops terminate themselves.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Future returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Source of monotonic time and cooperative suspension.
pub trait Clock: Send + Sync {
    /// Returns the monotonic offset since an arbitrary, fixed origin.
    fn now(&self) -> Duration;

    /// Suspends the current task for `duration` without blocking the thread.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        (**self).sleep(duration)
    }
}

/// [`Clock`] backed by the Tokio timer.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// Creates a clock whose origin is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Tracks elapsed time against a fixed maximum run duration.
#[derive(Clone, Debug)]
pub struct TimeBudget<C> {
    clock: C,
    started_at: Duration,
    max_duration: Duration,
}

impl<C: Clock> TimeBudget<C> {
    /// Starts a budget at the clock's current time.
    #[must_use]
    pub fn start(clock: C, max_duration: Duration) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            started_at,
            max_duration,
        }
    }

    /// Time elapsed since the budget started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started_at)
    }

    /// Time left before the ceiling, floored at zero. Recomputed on every call.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.max_duration.saturating_sub(self.elapsed())
    }

    /// Maximum duration this budget was started with.
    #[must_use]
    pub const fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Suspends for `duration` using the underlying clock.
    pub async fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration).await;
    }

    /// Returns the underlying clock.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeClock;
    use rstest::rstest;

    #[rstest]
    fn remaining_starts_at_maximum() {
        let clock = FakeClock::new();
        let budget = TimeBudget::start(clock, Duration::from_secs(840));
        assert_eq!(budget.remaining(), Duration::from_secs(840));
    }

    #[rstest]
    #[case(10, 830)]
    #[case(839, 1)]
    #[case(840, 0)]
    #[case(2_000, 0)]
    fn remaining_tracks_elapsed_time(#[case] elapsed: u64, #[case] expected: u64) {
        let clock = FakeClock::new();
        let budget = TimeBudget::start(clock.clone(), Duration::from_secs(840));
        clock.advance(Duration::from_secs(elapsed));
        assert_eq!(budget.remaining(), Duration::from_secs(expected));
    }

    #[rstest]
    fn budget_ignores_time_before_start() {
        let clock = FakeClock::new();
        clock.advance(Duration::from_secs(500));
        let budget = TimeBudget::start(clock.clone(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(15));
        assert_eq!(budget.elapsed(), Duration::from_secs(15));
        assert_eq!(budget.remaining(), Duration::from_secs(45));
    }

    #[tokio::test]
    async fn sleep_consumes_budget() {
        let clock = FakeClock::new();
        let budget = TimeBudget::start(clock.clone(), Duration::from_secs(100));
        budget.sleep(Duration::from_secs(30)).await;
        assert_eq!(budget.remaining(), Duration::from_secs(70));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn tokio_clock_is_monotonic() {
        let clock = TokioClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_millis(1)).await;
        assert!(clock.now() >= before + Duration::from_millis(1));
    }
}
