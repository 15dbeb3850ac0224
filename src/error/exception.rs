use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;
use std::io;

use crate::error::ExceptionClass;
use crate::error::ExceptionGroup;

/// A structured exception with group, message, optional I/O source, and
/// backtrace.
///
/// # Display Format
///
/// Exceptions format as: `{class}:{group} - {message}`
///
/// Example: `error:out_of_range - position 12 is below trim offset 40`
pub struct Exception {
  group: ExceptionGroup,
  error: String,
  source: Option<io::Error>,
  trace: Backtrace,
}

impl Exception {
  /// Creates a new exception with the given group and message.
  ///
  /// Automatically captures a backtrace at the call site for debugging.
  ///
  /// # Examples
  ///
  /// ```
  /// use braid::error::{Exception, ExceptionGroup};
  ///
  /// let exception = Exception::new(ExceptionGroup::OutOfRange, "offset below trim point");
  ///
  /// assert_eq!(exception.group(), ExceptionGroup::OutOfRange);
  /// ```
  #[inline]
  pub fn new<T>(group: ExceptionGroup, error: T) -> Self
  where
    T: Display,
  {
    Self {
      group,
      error: error.to_string(),
      source: None,
      trace: Backtrace::capture(),
    }
  }

  /// Wraps an I/O failure reported by a physical stream.
  #[cold]
  pub fn io(error: io::Error) -> Self {
    Self {
      group: ExceptionGroup::Io,
      error: error.to_string(),
      source: Some(error),
      trace: Backtrace::capture(),
    }
  }

  /// Returns the exception's severity class.
  #[inline]
  pub const fn class(&self) -> ExceptionClass {
    self.group.class()
  }

  /// Returns the exception's error category.
  #[inline]
  pub const fn group(&self) -> ExceptionGroup {
    self.group
  }

  /// Returns the human-readable error message.
  #[inline]
  pub const fn error(&self) -> &str {
    self.error.as_str()
  }

  /// Returns the captured backtrace.
  ///
  /// Backtrace availability depends on the `RUST_BACKTRACE` environment
  /// variable and platform support.
  #[inline]
  pub const fn trace(&self) -> &Backtrace {
    &self.trace
  }

  /// Returns `true` if this exception belongs to `group`.
  #[inline]
  pub fn is(&self, group: ExceptionGroup) -> bool {
    self.group == group
  }
}

impl Debug for Exception {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Display::fmt(self, f)
  }
}

impl Display for Exception {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    write!(f, "{}:{} - {}", self.class(), self.group.label(), self.error)
  }
}

impl Error for Exception {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    self.source.as_ref().map(|error| error as &(dyn Error + 'static))
  }
}

impl From<io::Error> for Exception {
  #[inline]
  fn from(error: io::Error) -> Self {
    Self::io(error)
  }
}
