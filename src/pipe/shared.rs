use crate::config::PipeConfig;
use crate::error::Result;
use crate::error::raise_exception;
use crate::loom::sync::Mutex;
use crate::loom::sync::MutexGuard;
use crate::loom::sync::atomic::AtomicBool;
use crate::loom::sync::atomic::Ordering;
use crate::pipe::Cursors;
use crate::pipe::buffer::Store;
use crate::sync::Signal;

/// State shared by a pipe's writer and all of its readers.
///
/// `store` is the one lock serializing writes, trims, and reads of the
/// physical buffer.
#[derive(Debug)]
pub(crate) struct PipeShared {
  pub(crate) store: Mutex<Store>,
  pub(crate) cursors: Cursors,
  pub(crate) drained: Signal,
  disposed: AtomicBool,
}

impl PipeShared {
  #[inline]
  pub(crate) fn new(config: &PipeConfig) -> Self {
    Self {
      store: Mutex::new(Store::new(config)),
      cursors: Cursors::new(),
      drained: Signal::default(),
      disposed: AtomicBool::new(false),
    }
  }

  #[inline]
  pub(crate) fn store(&self) -> MutexGuard<'_, Store> {
    self.store.lock()
  }

  #[inline]
  pub(crate) fn is_disposed(&self) -> bool {
    self.disposed.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn mark_disposed(&self) {
    self.disposed.store(true, Ordering::Release);
  }

  #[inline]
  pub(crate) fn check_disposed(&self) -> Result<()> {
    if self.is_disposed() {
      Err(raise_exception!(ObjectDisposed, "pipe has been disposed"))
    } else {
      Ok(())
    }
  }

  /// Freezes the buffer and wakes every reader.
  ///
  /// Returns `false` if the pipe was already finalized.
  pub(crate) fn finalize(&self) -> bool {
    let mut store: MutexGuard<'_, Store> = self.store();

    let snapshot: _ = match &mut *store {
      Store::Open(buffer) => buffer.freeze(),
      Store::Finalized(_) => return false,
    };

    *store = Store::Finalized(snapshot);

    let len: u64 = store.len();

    drop(store);

    self.cursors.notify_all();

    tracing::debug!(target: "braid", pipe = "finalize", len);

    true
  }
}
