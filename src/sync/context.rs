use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use tokio::task::futures::TaskLocalFuture;
use triomphe::Arc;

// -----------------------------------------------------------------------------
// @data - Task Globals
// -----------------------------------------------------------------------------

tokio::task_local! {
  static CONTEXT: LockContext;
}

// -----------------------------------------------------------------------------
// Lock Context
// -----------------------------------------------------------------------------

/// Identity of a logical call chain.
///
/// A `LockContext` is what a [`ReentrantAsyncLock`] records as its owner. Two
/// contexts are equal only if one is a clone of the other, so identity
/// survives every suspension point and thread hop of the task carrying it.
///
/// Contexts are either threaded through calls explicitly or installed as a
/// task-local with [`LockContext::scope`]. Task-locals are not inherited by
/// spawned tasks; scope a clone into the child to share ownership with it.
///
/// [`ReentrantAsyncLock`]: crate::sync::ReentrantAsyncLock
#[derive(Clone)]
#[repr(transparent)]
pub struct LockContext {
  inner: Arc<()>,
}

impl LockContext {
  /// Creates a new, unique context.
  #[inline]
  pub fn new() -> Self {
    Self { inner: Arc::new(()) }
  }

  /// Returns the context installed for the current task, if any.
  #[inline]
  pub fn current() -> Option<Self> {
    CONTEXT.try_with(Self::clone).ok()
  }

  /// Runs `future` with `self` installed as the task-local context.
  #[inline]
  pub fn scope<F>(self, future: F) -> TaskLocalFuture<Self, F>
  where
    F: Future,
  {
    CONTEXT.scope(self, future)
  }

  /// Runs `future` within a fresh context.
  #[inline]
  pub fn scoped<F>(future: F) -> TaskLocalFuture<Self, F>
  where
    F: Future,
  {
    Self::new().scope(future)
  }

  #[inline]
  fn as_ptr(&self) -> *const () {
    Arc::as_ptr(&self.inner)
  }
}

impl Default for LockContext {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl PartialEq for LockContext {
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl Eq for LockContext {}

impl Debug for LockContext {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "LockContext({:p})", self.as_ptr())
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
