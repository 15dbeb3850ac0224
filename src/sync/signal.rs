use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::time::Duration;
use tokio::sync::AcquireError;
use tokio::sync::Semaphore;
use tokio::sync::SemaphorePermit;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::error::raise_exception;
use crate::loom::sync::Mutex;

// -----------------------------------------------------------------------------
// Signal
// -----------------------------------------------------------------------------

/// A single-slot asynchronous wake primitive (auto-reset event).
///
/// [`set`] wakes exactly one pending or future waiter. Signals never
/// accumulate: setting an already signaled `Signal` does nothing, and a
/// completed wait consumes the signaled state.
///
/// Waiters are woken in the order they started waiting.
///
/// [`set`]: Signal::set
pub struct Signal {
  permits: Semaphore,
  gate: Mutex<()>,
}

impl Signal {
  /// Creates a new `Signal` in the given initial state.
  #[inline]
  pub fn new(signaled: bool) -> Self {
    Self {
      permits: Semaphore::new(usize::from(signaled)),
      gate: Mutex::new(()),
    }
  }

  /// Returns `true` if a signal is pending and not yet consumed.
  #[inline]
  pub fn is_set(&self) -> bool {
    self.permits.available_permits() != 0
  }

  /// Signals one waiter, or stores the signal for the next waiter.
  pub fn set(&self) {
    let _gate: _ = self.gate.lock();

    if self.permits.available_permits() == 0 {
      self.permits.add_permits(1);
      tracing::trace!(target: "braid", signal = "set");
    }
  }

  /// Consumes a pending signal without waiting.
  ///
  /// Returns `true` if a signal was consumed.
  pub fn try_wait(&self) -> bool {
    match self.permits.try_acquire() {
      Ok(permit) => {
        permit.forget();
        true
      }
      Err(_) => false,
    }
  }

  /// Waits until the signal is set, consuming it.
  ///
  /// Fails with [`Cancelled`] if `cancel` fires first. A cancelled wait
  /// never consumes a signal.
  ///
  /// [`Cancelled`]: crate::error::ExceptionGroup::Cancelled
  pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
      biased;
      () = cancel.cancelled() => Err(raise_exception!(Cancelled, "signal wait cancelled")),
      permit = self.permits.acquire() => Self::consume(permit),
    }
  }

  /// Waits until the signal is set or `timeout` elapses.
  ///
  /// Fails with [`TimedOut`] when the timeout elapses first and with
  /// [`Cancelled`] when `cancel` fires first.
  ///
  /// [`TimedOut`]: crate::error::ExceptionGroup::TimedOut
  /// [`Cancelled`]: crate::error::ExceptionGroup::Cancelled
  pub async fn wait_timeout(&self, timeout: Duration, cancel: &CancellationToken) -> Result<()> {
    match time::timeout(timeout, self.wait(cancel)).await {
      Ok(result) => result,
      Err(_) => Err(raise_exception!(TimedOut, "signal not set within {timeout:?}")),
    }
  }

  #[inline]
  fn consume(permit: Result<SemaphorePermit<'_>, AcquireError>) -> Result<()> {
    match permit {
      Ok(permit) => {
        permit.forget();
        Ok(())
      }
      Err(_) => Err(raise_exception!(ObjectDisposed, "signal closed")),
    }
  }
}

impl Default for Signal {
  #[inline]
  fn default() -> Self {
    Self::new(false)
  }
}

impl Debug for Signal {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Signal").field("set", &self.is_set()).finish()
  }
}

impl Display for Signal {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "Signal[set: {}]", self.is_set())
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
  use tokio_util::sync::CancellationToken;

  use crate::error::ExceptionGroup;
  use crate::sync::Signal;

  #[tokio::test]
  async fn test_initial_state() {
    let cancel: CancellationToken = CancellationToken::new();
    let signal: Signal = Signal::new(true);

    assert!(signal.is_set());
    signal.wait(&cancel).await.unwrap();
    assert!(!signal.is_set());
  }

  #[test]
  fn test_set_does_not_accumulate() {
    let signal: Signal = Signal::default();

    signal.set();
    signal.set();
    signal.set();

    assert!(signal.try_wait());
    assert!(!signal.try_wait());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_set_wakes_pending_waiter() {
    let signal: Arc<Signal> = Arc::new(Signal::default());

    let waiter: JoinHandle<_> = tokio::spawn({
      let signal: Arc<Signal> = Arc::clone(&signal);
      async move { signal.wait(&CancellationToken::new()).await }
    });

    tokio::task::yield_now().await;
    signal.set();

    waiter.await.unwrap().unwrap();
    assert!(!signal.is_set());
  }

  #[tokio::test]
  async fn test_set_wakes_exactly_one_waiter() {
    let signal: Arc<Signal> = Arc::new(Signal::default());
    let cancel: CancellationToken = CancellationToken::new();

    let waiters: Vec<JoinHandle<_>> = (0..2)
      .map(|_| {
        let signal: Arc<Signal> = Arc::clone(&signal);
        let cancel: CancellationToken = cancel.clone();
        tokio::spawn(async move { signal.wait(&cancel).await })
      })
      .collect();

    tokio::task::yield_now().await;
    signal.set();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let done: usize = waiters.iter().filter(|handle| handle.is_finished()).count();
    assert_eq!(done, 1);

    cancel.cancel();

    let mut cancelled: usize = 0;

    for waiter in waiters {
      if let Err(error) = waiter.await.unwrap() {
        assert_eq!(error.group(), ExceptionGroup::Cancelled);
        cancelled += 1;
      }
    }

    assert_eq!(cancelled, 1);
  }

  #[tokio::test]
  async fn test_wait_cancelled() {
    let cancel: CancellationToken = CancellationToken::new();
    let signal: Signal = Signal::default();

    cancel.cancel();

    let error = signal.wait(&cancel).await.unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::Cancelled);
  }

  #[tokio::test(start_paused = true)]
  async fn test_wait_timeout() {
    let cancel: CancellationToken = CancellationToken::new();
    let signal: Signal = Signal::default();

    let error = signal
      .wait_timeout(Duration::from_secs(5), &cancel)
      .await
      .unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::TimedOut);

    signal.set();
    signal.wait_timeout(Duration::from_secs(5), &cancel).await.unwrap();
  }

  #[tokio::test]
  async fn test_cancelled_wait_keeps_signal() {
    let cancel: CancellationToken = CancellationToken::new();
    let signal: Signal = Signal::default();

    cancel.cancel();
    signal.set();

    assert!(signal.wait(&cancel).await.is_err());
    assert!(signal.is_set());
  }

  #[test]
  fn test_display() {
    let signal: Signal = Signal::new(true);
    assert_eq!(signal.to_string(), "Signal[set: true]");
  }
}
