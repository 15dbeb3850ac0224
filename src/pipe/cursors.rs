use crossbeam_utils::CachePadded;
use hashbrown::HashMap;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use triomphe::Arc;

use crate::consts::CAP_PIPE_READERS;
use crate::loom::sync::Mutex;
use crate::loom::sync::atomic::AtomicU64;
use crate::loom::sync::atomic::Ordering;
use crate::sync::Signal;

// -----------------------------------------------------------------------------
// Cursor Id
// -----------------------------------------------------------------------------

/// Identifier of a reader cursor, unique within one pipe.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct CursorId(u64);

impl CursorId {
  #[inline]
  pub const fn into_bits(self) -> u64 {
    self.0
  }
}

impl Display for CursorId {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "#{}", self.0)
  }
}

// -----------------------------------------------------------------------------
// Cursor Slot
// -----------------------------------------------------------------------------

/// Shared state of one reader: its published position and wake signal.
#[derive(Debug)]
pub struct CursorSlot {
  position: CachePadded<AtomicU64>,
  signal: Signal,
}

impl CursorSlot {
  #[inline]
  fn new(position: u64) -> Self {
    Self {
      position: CachePadded::new(AtomicU64::new(position)),
      signal: Signal::default(),
    }
  }

  /// Returns the last published position.
  #[inline]
  pub fn position(&self) -> u64 {
    self.position.load(Ordering::Acquire)
  }

  /// Publishes `position`; published positions never move backwards.
  #[inline]
  pub fn advance(&self, position: u64) {
    self.position.fetch_max(position, Ordering::AcqRel);
  }

  /// Returns the signal set whenever the pipe changes.
  #[inline]
  pub fn signal(&self) -> &Signal {
    &self.signal
  }
}

// -----------------------------------------------------------------------------
// Cursors
// -----------------------------------------------------------------------------

/// Registry of the open reader cursors of one pipe.
///
/// The writer uses the registry to wake readers and to find the slowest
/// reader when trimming.
#[derive(Debug)]
pub struct Cursors {
  slots: Mutex<HashMap<CursorId, Arc<CursorSlot>>>,
  next: AtomicU64,
}

impl Cursors {
  #[inline]
  pub fn new() -> Self {
    Self::with_capacity(CAP_PIPE_READERS)
  }

  #[inline]
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      slots: Mutex::new(HashMap::with_capacity(capacity)),
      next: AtomicU64::new(0),
    }
  }

  /// Registers a new cursor at `position`.
  pub fn register(&self, position: u64) -> (CursorId, Arc<CursorSlot>) {
    let id: CursorId = CursorId(self.next.fetch_add(1, Ordering::Relaxed));
    let slot: Arc<CursorSlot> = Arc::new(CursorSlot::new(position));

    self.slots.lock().insert(id, Arc::clone(&slot));

    (id, slot)
  }

  /// Removes a cursor. Returns `false` if it was not registered.
  pub fn deregister(&self, id: CursorId) -> bool {
    self.slots.lock().remove(&id).is_some()
  }

  /// Returns the smallest position among registered cursors.
  pub fn min_position(&self) -> Option<u64> {
    self.slots.lock().values().map(|slot| slot.position()).min()
  }

  /// Sets the signal of every registered cursor.
  pub fn notify_all(&self) {
    for slot in self.slots.lock().values() {
      slot.signal().set();
    }
  }

  /// Returns every registered cursor and its position, ordered by id.
  pub fn positions(&self) -> Vec<(CursorId, u64)> {
    let mut positions: Vec<(CursorId, u64)> = self
      .slots
      .lock()
      .iter()
      .map(|(id, slot)| (*id, slot.position()))
      .collect();

    positions.sort_unstable();
    positions
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.slots.lock().len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.slots.lock().is_empty()
  }
}

impl Default for Cursors {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
