#[cfg(not(loom))]
pub(crate) mod export {
  pub(crate) mod sync {
    pub(crate) use parking_lot::Mutex;
    pub(crate) use parking_lot::MutexGuard;

    pub(crate) mod atomic {
      pub(crate) use std::sync::atomic::AtomicBool;
      pub(crate) use std::sync::atomic::AtomicU64;
      pub(crate) use std::sync::atomic::Ordering;
    }
  }
}

#[cfg(loom)]
pub(crate) mod export {
  pub(crate) mod sync {
    use std::fmt::Debug;
    use std::fmt::Formatter;
    use std::fmt::Result as FmtResult;
    use std::sync::PoisonError;

    pub(crate) use loom::sync::MutexGuard;

    /// `parking_lot`-shaped facade over the loom mutex.
    pub(crate) struct Mutex<T> {
      inner: loom::sync::Mutex<T>,
    }

    impl<T> Mutex<T> {
      #[inline]
      pub(crate) fn new(value: T) -> Self {
        Self {
          inner: loom::sync::Mutex::new(value),
        }
      }

      #[inline]
      pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
      }
    }

    impl<T> Debug for Mutex<T> {
      fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Mutex").finish_non_exhaustive()
      }
    }

    pub(crate) mod atomic {
      pub(crate) use loom::sync::atomic::AtomicBool;
      pub(crate) use loom::sync::atomic::AtomicU64;
      pub(crate) use loom::sync::atomic::Ordering;
    }
  }
}

#[doc(inline)]
pub(crate) use self::export::*;
