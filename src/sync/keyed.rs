use hashbrown::HashMap;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::hash::Hash;
use std::ptr;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::sync::SemaphorePermit;
use tokio::time;
use tokio_util::sync::CancellationToken;
use triomphe::Arc;

use crate::consts::CAP_KEYED_LOCKS;
use crate::error::Result;
use crate::error::raise_exception;
use crate::loom::sync::Mutex;

// -----------------------------------------------------------------------------
// Lock Entry
// -----------------------------------------------------------------------------

/// A per-key mutex and the number of live references to it.
///
/// `count` is only touched under the map lock.
#[derive(Debug)]
struct LockEntry {
  mutex: Arc<Semaphore>,
  count: usize,
}

impl LockEntry {
  #[inline]
  fn new() -> Self {
    Self {
      mutex: Arc::new(Semaphore::new(1)),
      count: 0,
    }
  }
}

// -----------------------------------------------------------------------------
// Keyed Async Lock
// -----------------------------------------------------------------------------

/// A family of async mutexes identified by key.
///
/// The mutex for a key is created on first use and removed as soon as no
/// holder or waiter references it. Acquiring distinct keys only contends on
/// a short, synchronous map lookup.
///
/// Waiters for the same key obtain it in the order they started waiting.
///
/// # Examples
///
/// ```
/// use braid::sync::KeyedAsyncLock;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> braid::error::Result<()> {
/// let locks: KeyedAsyncLock<u64> = KeyedAsyncLock::new();
/// let cancel = CancellationToken::new();
///
/// let guard = locks.acquire(42, &cancel).await?;
/// assert!(locks.try_acquire(42).is_none());
/// assert!(locks.try_acquire(7).is_some());
///
/// locks.release(guard)?;
/// assert!(locks.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct KeyedAsyncLock<K> {
  entries: Mutex<HashMap<K, LockEntry>>,
}

impl<K> KeyedAsyncLock<K>
where
  K: Eq + Hash + Clone,
{
  /// Creates a new, empty `KeyedAsyncLock`.
  #[inline]
  pub fn new() -> Self {
    Self::with_capacity(CAP_KEYED_LOCKS)
  }

  /// Creates a new `KeyedAsyncLock` with room for `capacity` live keys.
  #[inline]
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      entries: Mutex::new(HashMap::with_capacity(capacity)),
    }
  }

  // ---------------------------------------------------------------------------
  // Acquire & Release
  // ---------------------------------------------------------------------------

  /// Acquires the mutex for `key`, waiting while another holder has it.
  ///
  /// Fails with [`Cancelled`] if `cancel` fires first. A cancelled or dropped
  /// acquire gives up its reference to the key's entry.
  ///
  /// [`Cancelled`]: crate::error::ExceptionGroup::Cancelled
  pub async fn acquire(&self, key: K, cancel: &CancellationToken) -> Result<KeyedGuard<'_, K>> {
    let pending: PendingRef<'_, K> = self.reference(key);

    let permit: SemaphorePermit<'_> = tokio::select! {
      biased;
      () = cancel.cancelled() => return Err(raise_exception!(Cancelled, "keyed lock acquire cancelled")),
      permit = pending.mutex.acquire() => match permit {
        Ok(permit) => permit,
        Err(_) => return Err(raise_exception!(InvariantViolation, "keyed lock entry closed")),
      },
    };

    permit.forget();

    Ok(pending.into_guard())
  }

  /// Acquires the mutex for `key` only if it is free.
  ///
  /// Never waits, and leaves no reference behind when the key is held.
  pub fn try_acquire(&self, key: K) -> Option<KeyedGuard<'_, K>> {
    let pending: PendingRef<'_, K> = self.reference(key);

    let acquired: bool = match pending.mutex.try_acquire() {
      Ok(permit) => {
        permit.forget();
        true
      }
      Err(_) => false,
    };

    acquired.then(|| pending.into_guard())
  }

  /// Acquires the mutex for `key`, waiting at most `timeout`.
  ///
  /// Returns `Ok(None)` if the timeout elapsed first.
  pub async fn try_acquire_for(
    &self,
    key: K,
    timeout: Duration,
    cancel: &CancellationToken,
  ) -> Result<Option<KeyedGuard<'_, K>>> {
    if timeout.is_zero() {
      return Ok(self.try_acquire(key));
    }

    match time::timeout(timeout, self.acquire(key, cancel)).await {
      Ok(result) => result.map(Some),
      Err(_) => Ok(None),
    }
  }

  /// Releases a guard obtained from this lock.
  ///
  /// This is equivalent to dropping the guard, except that a guard issued by
  /// a different lock is rejected with [`InvalidLockState`].
  ///
  /// [`InvalidLockState`]: crate::error::ExceptionGroup::InvalidLockState
  pub fn release(&self, guard: KeyedGuard<'_, K>) -> Result<()> {
    if !ptr::eq(self, guard.lock) {
      return Err(raise_exception!(InvalidLockState, "guard was issued by another keyed lock"));
    }

    drop(guard);

    Ok(())
  }

  // ---------------------------------------------------------------------------
  // Queries
  // ---------------------------------------------------------------------------

  /// Returns the number of holders and waiters referencing `key`.
  #[inline]
  pub fn ref_count(&self, key: &K) -> usize {
    self.entries.lock().get(key).map_or(0, |entry| entry.count)
  }

  /// Returns the number of keys with a live entry.
  #[inline]
  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  /// Returns `true` if no key has a live entry.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.entries.lock().is_empty()
  }

  // ---------------------------------------------------------------------------
  // Reference Counting
  // ---------------------------------------------------------------------------

  fn reference(&self, key: K) -> PendingRef<'_, K> {
    let mut entries: _ = self.entries.lock();

    let entry: &mut LockEntry = entries.entry(key.clone()).or_insert_with(|| {
      tracing::debug!(target: "braid", lock = "keyed", "entry created");
      LockEntry::new()
    });

    entry.count += 1;

    PendingRef {
      lock: self,
      key: Some(key),
      mutex: Arc::clone(&entry.mutex),
    }
  }

  fn unreference(&self, key: &K) {
    let mut entries: _ = self.entries.lock();

    match entries.get_mut(key) {
      Some(entry) if entry.count > 1 => {
        entry.count -= 1;
      }
      Some(_) => {
        entries.remove(key);
        tracing::debug!(target: "braid", lock = "keyed", "entry removed");
      }
      None => {
        tracing::error!(target: "braid", lock = "keyed", "released key without entry");
      }
    }
  }
}

impl<K> Default for KeyedAsyncLock<K>
where
  K: Eq + Hash + Clone,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<K> Debug for KeyedAsyncLock<K> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("KeyedAsyncLock")
      .field("locks", &self.entries.lock().len())
      .finish()
  }
}

impl<K> Display for KeyedAsyncLock<K> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "KeyedAsyncLock[locks: {}]", self.entries.lock().len())
  }
}

// -----------------------------------------------------------------------------
// Pending Ref
// -----------------------------------------------------------------------------

/// A counted reference to a key's entry that has not obtained the mutex.
///
/// Dropping it gives the reference back, which is what unwinds a cancelled
/// or abandoned acquire.
struct PendingRef<'a, K>
where
  K: Eq + Hash + Clone,
{
  lock: &'a KeyedAsyncLock<K>,
  key: Option<K>,
  mutex: Arc<Semaphore>,
}

impl<'a, K> PendingRef<'a, K>
where
  K: Eq + Hash + Clone,
{
  #[inline]
  fn into_guard(mut self) -> KeyedGuard<'a, K> {
    KeyedGuard {
      lock: self.lock,
      key: self.key.take(),
      mutex: Arc::clone(&self.mutex),
    }
  }
}

impl<K> Drop for PendingRef<'_, K>
where
  K: Eq + Hash + Clone,
{
  fn drop(&mut self) {
    if let Some(key) = self.key.take() {
      self.lock.unreference(&key);
    }
  }
}

// -----------------------------------------------------------------------------
// Keyed Guard
// -----------------------------------------------------------------------------

/// Token for a held key of a [`KeyedAsyncLock`].
///
/// Dropping the guard releases the key.
#[must_use = "the key is released as soon as the guard is dropped"]
pub struct KeyedGuard<'a, K>
where
  K: Eq + Hash + Clone,
{
  lock: &'a KeyedAsyncLock<K>,
  key: Option<K>,
  mutex: Arc<Semaphore>,
}

impl<K> KeyedGuard<'_, K>
where
  K: Eq + Hash + Clone,
{
  /// Returns the key this guard holds.
  #[inline]
  pub fn key(&self) -> &K {
    match self.key.as_ref() {
      Some(key) => key,
      None => unreachable!("keyed guard used after release"),
    }
  }
}

impl<K> Drop for KeyedGuard<'_, K>
where
  K: Eq + Hash + Clone,
{
  fn drop(&mut self) {
    if let Some(key) = self.key.take() {
      self.lock.unreference(&key);
      self.mutex.add_permits(1);
    }
  }
}

impl<K> Debug for KeyedGuard<'_, K>
where
  K: Eq + Hash + Clone + Debug,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("KeyedGuard").field("key", &self.key).finish()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
