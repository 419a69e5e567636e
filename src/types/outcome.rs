//! Two-valued outcome type for completed cells.
//!
//! The outcome type is the terminal value of a cell:
//!
//! - `Success(T)`: the computation produced a value
//! - `Failure(Error)`: the computation failed, panicked, or was rejected
//!   by a combinator predicate
//!
//! Failures carry the crate-wide [`Error`] so they can flow unchanged
//! through combinators between cells of different value types. A timeout
//! while *waiting* on a cell is not an outcome; it is raised to the
//! waiting caller only.

use core::fmt;

use crate::error::Error;

/// The terminal value of a cell.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The computation produced a value.
    Success(T),
    /// The computation failed.
    Failure(Error),
}

impl<T> Outcome<T> {
    /// Creates a successful outcome.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self::Success(value)
    }

    /// Creates a failed outcome.
    #[must_use]
    pub const fn failure(error: Error) -> Self {
        Self::Failure(error)
    }

    /// Returns true if this outcome is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true if this outcome is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure(_) => None,
        }
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    /// Maps the success value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::Failure(e) => Outcome::Failure(e),
        }
    }

    /// Converts this outcome to a standard Result.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure(e) => Err(e),
        }
    }

    /// Returns the success value or panics with the contained failure.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is a failure.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Success(v) => v,
            Self::Failure(e) => panic!("called `Outcome::unwrap()` on a `Failure` value: {e}"),
        }
    }

    /// Returns the success value or a default.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Success(v) => v,
            Self::Failure(_) => default,
        }
    }

    /// Returns the success value or computes it from a closure.
    pub fn unwrap_or_else<F: FnOnce(Error) -> T>(self, f: F) -> T {
        match self {
            Self::Success(v) => v,
            Self::Failure(e) => f(e),
        }
    }
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(e) => Self::Failure(e),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(v) => write!(f, "success: {v}"),
            Self::Failure(e) => write!(f, "failure: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn predicates() {
        let ok: Outcome<i32> = Outcome::success(42);
        let bad: Outcome<i32> = Outcome::failure(Error::computation("nope"));

        assert!(ok.is_success());
        assert!(!ok.is_failure());
        assert!(bad.is_failure());
        assert!(!bad.is_success());
    }

    #[test]
    fn accessors() {
        let ok: Outcome<i32> = Outcome::success(42);
        assert_eq!(ok.value(), Some(&42));
        assert!(ok.error().is_none());

        let bad: Outcome<i32> = Outcome::failure(Error::match_failed());
        assert!(bad.value().is_none());
        assert_eq!(bad.error().map(Error::kind), Some(ErrorKind::MatchFailed));
    }

    #[test]
    fn map_transforms_success() {
        let ok: Outcome<i32> = Outcome::success(21);
        assert!(matches!(ok.map(|x| x * 2), Outcome::Success(42)));
    }

    #[test]
    fn map_preserves_failure() {
        let bad: Outcome<i32> = Outcome::failure(Error::match_failed());
        let mapped = bad.map(|x| x * 2);
        assert_eq!(mapped.error().map(Error::kind), Some(ErrorKind::MatchFailed));
    }

    #[test]
    fn into_result_round_trip() {
        let ok: Outcome<i32> = Outcome::success(7);
        assert_eq!(ok.into_result().unwrap(), 7);

        let bad: Outcome<i32> = Outcome::failure(Error::computation("x"));
        assert_eq!(
            bad.into_result().unwrap_err().kind(),
            ErrorKind::Computation
        );

        let from_ok: Outcome<i32> = Ok(3).into();
        assert!(from_ok.is_success());

        let from_err: Outcome<i32> = Err(Error::match_failed()).into();
        assert!(from_err.is_failure());
    }

    #[test]
    fn unwrap_returns_value_on_success() {
        let ok: Outcome<i32> = Outcome::success(42);
        assert_eq!(ok.unwrap(), 42);
    }

    #[test]
    #[should_panic(expected = "called `Outcome::unwrap()` on a `Failure` value")]
    fn unwrap_panics_on_failure() {
        let bad: Outcome<i32> = Outcome::failure(Error::computation("nope"));
        let _ = bad.unwrap();
    }

    #[test]
    fn unwrap_or_and_unwrap_or_else() {
        let bad: Outcome<i32> = Outcome::failure(Error::computation("nope"));
        assert_eq!(bad.clone().unwrap_or(0), 0);
        assert_eq!(bad.unwrap_or_else(|e| i32::from(e.is_timeout())), 0);

        let ok: Outcome<i32> = Outcome::success(5);
        assert_eq!(ok.unwrap_or(0), 5);
    }

    #[test]
    fn display() {
        let ok: Outcome<i32> = Outcome::success(1);
        assert_eq!(ok.to_string(), "success: 1");

        let bad: Outcome<i32> = Outcome::failure(Error::timeout());
        assert_eq!(bad.to_string(), "failure: Timeout");
    }
}
