//! Error types returned by every fallible operation in this crate.
//!
//! Failures are reported as [`Exception`] values carrying a group, a
//! human-readable message, and a backtrace captured where the failure was
//! detected. Nothing is retried or swallowed internally; the caller always
//! sees the exception.
//!
//! # Exception Groups
//!
//! - [`InvalidLockState`]: release without ownership
//! - [`Cancelled`]: the cancellation token fired first
//! - [`TimedOut`]: a bounded wait expired
//! - [`OutOfRange`]: a position below the trim point, or a bad trim target
//! - [`ObjectDisposed`]: the lock or pipe has been disposed
//! - [`InvalidOperation`]: e.g. writing to a finalized pipe
//! - [`InvariantViolation`]: an internal consistency check failed
//! - [`Io`]: a wrapped stream failed
//!
//! [`InvalidLockState`]: ExceptionGroup::InvalidLockState
//! [`Cancelled`]: ExceptionGroup::Cancelled
//! [`TimedOut`]: ExceptionGroup::TimedOut
//! [`OutOfRange`]: ExceptionGroup::OutOfRange
//! [`ObjectDisposed`]: ExceptionGroup::ObjectDisposed
//! [`InvalidOperation`]: ExceptionGroup::InvalidOperation
//! [`InvariantViolation`]: ExceptionGroup::InvariantViolation
//! [`Io`]: ExceptionGroup::Io

mod exception;
mod exception_class;
mod exception_group;

pub use self::exception::Exception;
pub use self::exception_class::ExceptionClass;
pub use self::exception_group::ExceptionGroup;

/// Result type used throughout this crate.
pub type Result<T, E = Exception> = ::core::result::Result<T, E>;

// -----------------------------------------------------------------------------
// raise_exception!
// -----------------------------------------------------------------------------

/// Constructs an [`Exception`] of the given group with a formatted message.
macro_rules! raise_exception {
  ($group:ident, $($format:tt)+) => {
    $crate::error::Exception::new(
      $crate::error::ExceptionGroup::$group,
      ::std::format_args!($($format)+),
    )
  };
}

pub(crate) use raise_exception;

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
