use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

use crate::error::ExceptionClass;

/// Exception category indicating the nature of the error.
///
/// Groups tell the caller whether an operation may be retried, whether the
/// object it targeted is still usable, and how the failure should be logged.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExceptionGroup {
  /// A lock was released by a context that does not own it, or acquired
  /// without any context in scope.
  InvalidLockState,
  /// The operation was cancelled through its cancellation token.
  Cancelled,
  /// A bounded wait expired before the operation completed.
  TimedOut,
  /// A position or offset fell outside the retained range.
  OutOfRange,
  /// The target object has been disposed.
  ObjectDisposed,
  /// The operation is not valid in the current state of the object.
  InvalidOperation,
  /// An internal consistency check failed.
  ///
  /// This is never recovered from silently.
  InvariantViolation,
  /// The wrapped physical stream reported an I/O failure.
  Io,
}

impl ExceptionGroup {
  #[inline]
  pub(crate) const fn label(&self) -> &'static str {
    match self {
      Self::InvalidLockState => "invalid_lock_state",
      Self::Cancelled => "cancelled",
      Self::TimedOut => "timed_out",
      Self::OutOfRange => "out_of_range",
      Self::ObjectDisposed => "object_disposed",
      Self::InvalidOperation => "invalid_operation",
      Self::InvariantViolation => "invariant_violation",
      Self::Io => "io",
    }
  }

  /// Returns the severity class of this group.
  #[inline]
  pub const fn class(&self) -> ExceptionClass {
    match self {
      Self::InvariantViolation => ExceptionClass::Fatal,
      _ => ExceptionClass::Error,
    }
  }
}

impl Display for ExceptionGroup {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::InvalidLockState => f.write_str("(InvalidLockState) the lock is not held by this context"),
      Self::Cancelled => f.write_str("(Cancelled) the operation was cancelled"),
      Self::TimedOut => f.write_str("(TimedOut) the operation timed out"),
      Self::OutOfRange => f.write_str("(OutOfRange) the position is outside the retained range"),
      Self::ObjectDisposed => f.write_str("(ObjectDisposed) the object has been disposed"),
      Self::InvalidOperation => f.write_str("(InvalidOperation) the operation is not valid in this state"),
      Self::InvariantViolation => f.write_str("(InvariantViolation) an internal invariant has been broken"),
      Self::Io => f.write_str("(Io) the underlying stream failed"),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
