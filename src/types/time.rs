//! Monotonic time and the injectable clock capability.
//!
//! Deadlines inside cells are absolute [`Time`] values measured on a
//! [`Clock`]. The production clock anchors a process-wide
//! `std::time::Instant`; tests inject a [`ManualClock`] and advance it by
//! hand so expiry behavior is deterministic.

use core::fmt;
use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// A monotonic nanosecond timestamp.
///
/// In the production clock this corresponds to nanoseconds since an
/// arbitrary process-local anchor. In a manual clock it is whatever the
/// test sets it to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    /// The zero instant (epoch).
    pub const ZERO: Self = Self(0);

    /// The maximum representable instant.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a new time from nanoseconds since epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a new time from milliseconds since epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Creates a new time from seconds since epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Returns the time as nanoseconds since epoch.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the time as milliseconds since epoch (truncated).
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Adds a duration in nanoseconds, saturating on overflow.
    #[must_use]
    pub const fn saturating_add_nanos(self, nanos: u64) -> Self {
        Self(self.0.saturating_add(nanos))
    }

    /// Subtracts a duration in nanoseconds, saturating at zero.
    #[must_use]
    pub const fn saturating_sub_nanos(self, nanos: u64) -> Self {
        Self(self.0.saturating_sub(nanos))
    }

    /// Returns the duration between two times in nanoseconds.
    ///
    /// Returns 0 if `self` is before `earlier`.
    #[must_use]
    pub const fn duration_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Adds a `Duration`, saturating on overflow.
    #[must_use]
    pub fn saturating_add_duration(self, duration: Duration) -> Self {
        let nanos = duration.as_nanos().min(u128::from(u64::MAX)) as u64;
        self.saturating_add_nanos(nanos)
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add_duration(rhs)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000_000 {
            write!(
                f,
                "{}.{:03}s",
                self.0 / 1_000_000_000,
                (self.0 / 1_000_000) % 1000
            )
        } else if self.0 >= 1_000_000 {
            write!(f, "{}ms", self.0 / 1_000_000)
        } else if self.0 >= 1_000 {
            write!(f, "{}us", self.0 / 1_000)
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}

/// A monotonic time source.
///
/// Cells read their clock through this trait so that deadline math can be
/// driven by virtual time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Time;
}

/// The production clock: a process-wide `Instant` anchor.
///
/// All `MonotonicClock` instances share one anchor, so `Time` values from
/// different cells are mutually comparable.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

static ANCHOR: OnceLock<Instant> = OnceLock::new();

impl MonotonicClock {
    /// Creates the production clock.
    #[must_use]
    pub fn new() -> Self {
        // Touch the anchor at construction so the first `now` reading does
        // not pay initialization latency inside a wait loop.
        let _ = ANCHOR.get_or_init(Instant::now);
        Self
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Time {
        let anchor = ANCHOR.get_or_init(Instant::now);
        let nanos = anchor.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
        Time::from_nanos(nanos)
    }
}

/// A test clock advanced by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock at `Time::ZERO`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manual clock at the given instant.
    #[must_use]
    pub fn starting_at(now: Time) -> Self {
        Self {
            now: AtomicU64::new(now.as_nanos()),
        }
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let nanos = duration.as_nanos().min(u128::from(u64::MAX)) as u64;
        self.now.fetch_add(nanos, Ordering::AcqRel);
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, now: Time) {
        self.now.store(now.as_nanos(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        Time::from_nanos(self.now.load(Ordering::Acquire))
    }
}
