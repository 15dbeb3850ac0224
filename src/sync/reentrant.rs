use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use tokio::sync::Semaphore;
use tokio::sync::SemaphorePermit;
use tokio_util::sync::CancellationToken;

use crate::error::Exception;
use crate::error::Result;
use crate::error::raise_exception;
use crate::loom::sync::Mutex;
use crate::sync::LockContext;

// -----------------------------------------------------------------------------
// Lock State
// -----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LockState {
  owner: Option<LockContext>,
  depth: usize,
}

impl LockState {
  #[inline]
  fn owned_by(&self, context: &LockContext) -> bool {
    self.owner.as_ref() == Some(context)
  }
}

// -----------------------------------------------------------------------------
// Reentrant Async Lock
// -----------------------------------------------------------------------------

/// An async mutex that the owning [`LockContext`] may re-acquire.
///
/// Every acquire must be matched by exactly one release. The physical mutex
/// is given up only when the reentrancy depth returns to zero.
///
/// Ownership is tracked per logical call chain rather than per thread, so a
/// task may hold the lock across suspension points and keep re-entering it
/// after resuming on another worker.
///
/// Waiters obtain the lock in the order they started waiting.
///
/// # Examples
///
/// ```
/// use braid::sync::{LockContext, ReentrantAsyncLock};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> braid::error::Result<()> {
/// let lock = ReentrantAsyncLock::new();
/// let cancel = CancellationToken::new();
///
/// LockContext::scoped(async {
///   lock.acquire(&cancel).await?;
///   lock.acquire(&cancel).await?;
///   assert_eq!(lock.depth(), 2);
///
///   lock.release()?;
///   lock.release()
/// })
/// .await?;
///
/// assert!(!lock.is_locked());
/// # Ok(())
/// # }
/// ```
pub struct ReentrantAsyncLock {
  mutex: Semaphore,
  state: Mutex<LockState>,
}

impl ReentrantAsyncLock {
  /// Creates a new, unlocked `ReentrantAsyncLock`.
  #[inline]
  pub fn new() -> Self {
    Self {
      mutex: Semaphore::new(1),
      state: Mutex::new(LockState::default()),
    }
  }

  // ---------------------------------------------------------------------------
  // Acquire & Release
  // ---------------------------------------------------------------------------

  /// Acquires the lock for the task-local [`LockContext`].
  ///
  /// Fails with [`InvalidLockState`] if no context is in scope.
  ///
  /// [`InvalidLockState`]: crate::error::ExceptionGroup::InvalidLockState
  pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
    self.acquire_in(&Self::current()?, cancel).await
  }

  /// Acquires the lock for `context`.
  ///
  /// Returns immediately if `context` already owns the lock. Otherwise waits
  /// for the lock to become free. Cancelling the wait, either through
  /// `cancel` or by dropping the future, leaves the lock untouched.
  pub async fn acquire_in(&self, context: &LockContext, cancel: &CancellationToken) -> Result<()> {
    if self.mutex.is_closed() {
      return Err(raise_exception!(ObjectDisposed, "reentrant lock closed"));
    }

    if self.reenter(context) {
      return Ok(());
    }

    let permit: SemaphorePermit<'_> = tokio::select! {
      biased;
      () = cancel.cancelled() => return Err(raise_exception!(Cancelled, "reentrant lock acquire cancelled")),
      permit = self.mutex.acquire() => match permit {
        Ok(permit) => permit,
        Err(_) => return Err(raise_exception!(ObjectDisposed, "reentrant lock closed")),
      },
    };

    let mut state: _ = self.state.lock();

    if state.depth != 0 {
      drop(permit);
      tracing::error!(target: "braid", depth = state.depth, "reentrant lock owned while free");
      return Err(raise_exception!(InvariantViolation, "reentrant lock owned while free"));
    }

    permit.forget();
    state.owner = Some(context.clone());
    state.depth = 1;

    tracing::trace!(target: "braid", lock = "reentrant", context = ?context, result = "acquired");

    Ok(())
  }

  /// Releases one acquisition made by the task-local [`LockContext`].
  pub fn release(&self) -> Result<()> {
    self.release_in(&Self::current()?)
  }

  /// Releases one acquisition made by `context`.
  ///
  /// Fails with [`InvalidLockState`] if `context` does not own the lock.
  ///
  /// [`InvalidLockState`]: crate::error::ExceptionGroup::InvalidLockState
  pub fn release_in(&self, context: &LockContext) -> Result<()> {
    let mut state: _ = self.state.lock();

    if !state.owned_by(context) {
      return Err(raise_exception!(
        InvalidLockState,
        "lock may only be released by its owner ({context:?})",
      ));
    }

    state.depth -= 1;

    if state.depth == 0 {
      state.owner = None;
      self.mutex.add_permits(1);
      tracing::trace!(target: "braid", lock = "reentrant", context = ?context, result = "released");
    }

    Ok(())
  }

  /// Acquires the lock for the task-local [`LockContext`] and returns a
  /// guard that releases it on drop.
  pub async fn lock(&self, cancel: &CancellationToken) -> Result<ReentrantGuard<'_>> {
    self.lock_in(Self::current()?, cancel).await
  }

  /// Acquires the lock for `context` and returns a guard that releases it on
  /// drop.
  pub async fn lock_in(&self, context: LockContext, cancel: &CancellationToken) -> Result<ReentrantGuard<'_>> {
    self.acquire_in(&context, cancel).await?;

    Ok(ReentrantGuard {
      lock: self,
      context,
      released: false,
    })
  }

  /// Disposes the lock.
  ///
  /// Pending and future acquires fail with [`ObjectDisposed`]. Current
  /// holders may still release.
  ///
  /// [`ObjectDisposed`]: crate::error::ExceptionGroup::ObjectDisposed
  pub fn close(&self) {
    self.mutex.close();
    tracing::debug!(target: "braid", lock = "reentrant", "closed");
  }

  // ---------------------------------------------------------------------------
  // Queries
  // ---------------------------------------------------------------------------

  /// Returns `true` if any context holds the lock.
  #[inline]
  pub fn is_locked(&self) -> bool {
    self.state.lock().depth != 0
  }

  /// Returns `true` if the lock has been disposed.
  #[inline]
  pub fn is_closed(&self) -> bool {
    self.mutex.is_closed()
  }

  /// Returns the current reentrancy depth.
  #[inline]
  pub fn depth(&self) -> usize {
    self.state.lock().depth
  }

  /// Returns `true` if `context` holds the lock.
  #[inline]
  pub fn owned_by(&self, context: &LockContext) -> bool {
    self.state.lock().owned_by(context)
  }

  // ---------------------------------------------------------------------------
  // Misc. Utilities
  // ---------------------------------------------------------------------------

  fn reenter(&self, context: &LockContext) -> bool {
    let mut state: _ = self.state.lock();

    if state.owned_by(context) {
      state.depth += 1;
      tracing::trace!(target: "braid", lock = "reentrant", depth = state.depth, result = "reentered");
      true
    } else {
      false
    }
  }

  #[inline]
  fn current() -> Result<LockContext> {
    LockContext::current().ok_or_else(no_context)
  }
}

impl Default for ReentrantAsyncLock {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl Debug for ReentrantAsyncLock {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let state: _ = self.state.lock();

    f.debug_struct("ReentrantAsyncLock")
      .field("owner", &state.owner)
      .field("depth", &state.depth)
      .finish()
  }
}

#[cold]
fn no_context() -> Exception {
  raise_exception!(InvalidLockState, "no lock context in scope")
}

// -----------------------------------------------------------------------------
// Reentrant Guard
// -----------------------------------------------------------------------------

/// RAII guard for one acquisition of a [`ReentrantAsyncLock`].
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ReentrantGuard<'a> {
  lock: &'a ReentrantAsyncLock,
  context: LockContext,
  released: bool,
}

impl ReentrantGuard<'_> {
  /// Returns the context that owns this acquisition.
  #[inline]
  pub fn context(&self) -> &LockContext {
    &self.context
  }

  /// Releases the acquisition, reporting any failure.
  pub fn release(mut self) -> Result<()> {
    self.released = true;
    self.lock.release_in(&self.context)
  }
}

impl Drop for ReentrantGuard<'_> {
  fn drop(&mut self) {
    if self.released {
      return;
    }

    if let Err(error) = self.lock.release_in(&self.context) {
      tracing::error!(target: "braid", %error, "failed to release reentrant guard");
    }
  }
}

impl Debug for ReentrantGuard<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("ReentrantGuard")
      .field("context", &self.context)
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::Duration;
  use tokio::task::JoinHandle;
  use tokio::time;
  use tokio_util::sync::CancellationToken;

  use crate::error::ExceptionGroup;
  use crate::sync::LockContext;
  use crate::sync::ReentrantAsyncLock;

  #[tokio::test]
  async fn test_nested_acquire_release() {
    let cancel: CancellationToken = CancellationToken::new();
    let lock: ReentrantAsyncLock = ReentrantAsyncLock::new();
    let context: LockContext = LockContext::new();

    for depth in 1..=3 {
      lock.acquire_in(&context, &cancel).await.unwrap();
      assert_eq!(lock.depth(), depth);
      assert!(lock.owned_by(&context));
    }

    for depth in (0..3).rev() {
      lock.release_in(&context).unwrap();
      assert_eq!(lock.depth(), depth);
    }

    assert!(!lock.is_locked());
    assert!(!lock.owned_by(&context));
  }

  #[tokio::test]
  async fn test_acquire_without_context() {
    let cancel: CancellationToken = CancellationToken::new();
    let lock: ReentrantAsyncLock = ReentrantAsyncLock::new();

    let error = lock.acquire(&cancel).await.unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::InvalidLockState);
    assert!(!lock.is_locked());
  }

  #[tokio::test]
  async fn test_release_from_other_context() {
    let cancel: CancellationToken = CancellationToken::new();
    let lock: ReentrantAsyncLock = ReentrantAsyncLock::new();
    let owner: LockContext = LockContext::new();

    let error = lock.release_in(&owner).unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::InvalidLockState);

    lock.acquire_in(&owner, &cancel).await.unwrap();

    let error = lock.release_in(&LockContext::new()).unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::InvalidLockState);
    assert_eq!(lock.depth(), 1);

    lock.release_in(&owner).unwrap();
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_other_context_waits_for_depth_zero() {
    let cancel: CancellationToken = CancellationToken::new();
    let lock: Arc<ReentrantAsyncLock> = Arc::new(ReentrantAsyncLock::new());
    let owner: LockContext = LockContext::new();

    lock.acquire_in(&owner, &cancel).await.unwrap();
    lock.acquire_in(&owner, &cancel).await.unwrap();

    let contender: JoinHandle<_> = tokio::spawn({
      let lock: Arc<ReentrantAsyncLock> = Arc::clone(&lock);
      let cancel: CancellationToken = cancel.clone();

      LockContext::scoped(async move {
        lock.acquire(&cancel).await.unwrap();
        let context: LockContext = LockContext::current().unwrap();
        assert!(lock.owned_by(&context));
        lock.release().unwrap();
      })
    });

    time::sleep(Duration::from_millis(20)).await;
    assert!(!contender.is_finished());

    lock.release_in(&owner).unwrap();

    time::sleep(Duration::from_millis(20)).await;
    assert!(!contender.is_finished());
    assert!(lock.owned_by(&owner));

    lock.release_in(&owner).unwrap();

    contender.await.unwrap();
    assert!(!lock.is_locked());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_reentry_across_suspension_points() {
    let cancel: CancellationToken = CancellationToken::new();
    let lock: ReentrantAsyncLock = ReentrantAsyncLock::new();

    LockContext::scoped(async {
      lock.acquire(&cancel).await.unwrap();

      for _ in 0..8 {
        tokio::task::yield_now().await;
        time::sleep(Duration::from_millis(1)).await;
        lock.acquire(&cancel).await.unwrap();
      }

      assert_eq!(lock.depth(), 9);

      for _ in 0..9 {
        lock.release().unwrap();
      }
    })
    .await;

    assert!(!lock.is_locked());
  }

  #[tokio::test]
  async fn test_cancelled_wait_leaves_state_unchanged() {
    let lock: ReentrantAsyncLock = ReentrantAsyncLock::new();
    let owner: LockContext = LockContext::new();
    let waiter: LockContext = LockContext::new();
    let cancel: CancellationToken = CancellationToken::new();

    lock.acquire_in(&owner, &CancellationToken::new()).await.unwrap();

    let pending = lock.acquire_in(&waiter, &cancel);
    cancel.cancel();

    let error = pending.await.unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::Cancelled);
    assert_eq!(lock.depth(), 1);
    assert!(lock.owned_by(&owner));
    assert!(!lock.owned_by(&waiter));

    lock.release_in(&owner).unwrap();
    assert!(!lock.is_locked());

    lock.acquire_in(&waiter, &CancellationToken::new()).await.unwrap();
    assert!(lock.owned_by(&waiter));
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropped_wait_leaves_state_unchanged() {
    let cancel: CancellationToken = CancellationToken::new();
    let lock: ReentrantAsyncLock = ReentrantAsyncLock::new();
    let owner: LockContext = LockContext::new();
    let waiter: LockContext = LockContext::new();

    lock.acquire_in(&owner, &cancel).await.unwrap();

    let timed_out: bool = time::timeout(Duration::from_secs(1), lock.acquire_in(&waiter, &cancel))
      .await
      .is_err();

    assert!(timed_out);
    assert_eq!(lock.depth(), 1);

    lock.release_in(&owner).unwrap();
    lock.acquire_in(&waiter, &cancel).await.unwrap();
    assert!(lock.owned_by(&waiter));
  }

  #[tokio::test]
  async fn test_guard_releases_on_drop() {
    let cancel: CancellationToken = CancellationToken::new();
    let lock: ReentrantAsyncLock = ReentrantAsyncLock::new();

    LockContext::scoped(async {
      let outer = lock.lock(&cancel).await.unwrap();
      let inner = lock.lock(&cancel).await.unwrap();

      assert_eq!(lock.depth(), 2);
      drop(inner);
      assert_eq!(lock.depth(), 1);
      outer.release().unwrap();
    })
    .await;

    assert!(!lock.is_locked());
  }

  #[tokio::test]
  async fn test_close() {
    let cancel: CancellationToken = CancellationToken::new();
    let lock: ReentrantAsyncLock = ReentrantAsyncLock::new();
    let owner: LockContext = LockContext::new();

    lock.acquire_in(&owner, &cancel).await.unwrap();
    lock.close();

    let error = lock.acquire_in(&LockContext::new(), &cancel).await.unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::ObjectDisposed);
    assert!(lock.is_closed());

    lock.release_in(&owner).unwrap();
    assert!(!lock.is_locked());
  }
}
