use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use tokio_util::sync::CancellationToken;
use triomphe::Arc;

use crate::config::PipeConfig;
use crate::error::Exception;
use crate::error::Result;
use crate::error::raise_exception;
use crate::loom::sync::MutexGuard;
use crate::pipe::CursorId;
use crate::pipe::CursorSlot;
use crate::pipe::PipeReader;
use crate::pipe::buffer::Store;
use crate::pipe::buffer::TrimBuffer;
use crate::pipe::shared::PipeShared;

// -----------------------------------------------------------------------------
// Concurrent Pipe
// -----------------------------------------------------------------------------

/// The writing end of a single-writer, multi-reader byte pipe.
///
/// A pipe owns one growable buffer addressed by absolute offset. Every
/// [`PipeReader`] opened from it keeps its own position and reads the same
/// bytes independently. The writer trims the prefix no reader needs any
/// more with [`advance_to`], and freezes the pipe with [`end_of_stream`].
///
/// There is exactly one writer per pipe: this type is not `Clone` and all
/// mutating operations take `&mut self`.
///
/// # Lifecycle
///
/// `Open → Finalized → (readers draining) → Disposed`
///
/// Dropping the writer finalizes the pipe so no reader waits forever.
///
/// [`advance_to`]: ConcurrentPipe::advance_to
/// [`end_of_stream`]: ConcurrentPipe::end_of_stream
pub struct ConcurrentPipe {
  shared: Arc<PipeShared>,
}

impl ConcurrentPipe {
  /// Creates a new pipe with the default configuration.
  #[inline]
  pub fn new() -> Self {
    Self::with_config(PipeConfig::new())
  }

  /// Creates a new pipe with the given buffer configuration.
  #[inline]
  pub fn with_config(config: PipeConfig) -> Self {
    Self {
      shared: Arc::new(PipeShared::new(&config)),
    }
  }

  // ---------------------------------------------------------------------------
  // Writer API
  // ---------------------------------------------------------------------------

  /// Appends `bytes` and wakes every reader.
  ///
  /// Fails with [`InvalidOperation`] after [`end_of_stream`].
  ///
  /// [`InvalidOperation`]: crate::error::ExceptionGroup::InvalidOperation
  /// [`end_of_stream`]: ConcurrentPipe::end_of_stream
  pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
    self.shared.check_disposed()?;

    {
      let mut store: MutexGuard<'_, Store> = self.shared.store();

      let Store::Open(buffer) = &mut *store else {
        return Err(raise_exception!(InvalidOperation, "write after end of stream"));
      };

      buffer.append(bytes);

      tracing::trace!(target: "braid", pipe = "write", count = bytes.len(), len = buffer.len());
    }

    self.shared.cursors.notify_all();

    Ok(())
  }

  /// Trims the buffer prefix and returns the new trim offset.
  ///
  /// With `None`, trims up to the slowest open reader, or everything written
  /// so far if no reader is open. With `Some(offset)`, the offset must lie
  /// between the current trim offset and [`len`]; readers left below it fail
  /// their next read with [`OutOfRange`].
  ///
  /// [`len`]: ConcurrentPipe::len
  /// [`OutOfRange`]: crate::error::ExceptionGroup::OutOfRange
  pub fn advance_to(&mut self, target: Option<u64>) -> Result<u64> {
    self.shared.check_disposed()?;

    let mut store: MutexGuard<'_, Store> = self.shared.store();

    let Store::Open(buffer) = &mut *store else {
      return Err(raise_exception!(InvalidOperation, "advance after end of stream"));
    };

    let offset: u64 = match target {
      Some(offset) => offset,
      None => self.slowest_reader(buffer),
    };

    buffer.trim_to(offset)?;

    tracing::debug!(
      target: "braid",
      pipe = "advance",
      trim = offset,
      retained = buffer.retained(),
    );

    Ok(offset)
  }

  /// Finalizes the pipe: freezes its length and wakes every reader.
  ///
  /// Calling this more than once has no further effect.
  pub fn end_of_stream(&mut self) -> Result<()> {
    self.shared.check_disposed()?;
    self.shared.finalize();
    Ok(())
  }

  /// Opens a reader at the current trim offset.
  pub fn open_reader(&self) -> Result<PipeReader> {
    self.shared.check_disposed()?;

    let store: MutexGuard<'_, Store> = self.shared.store();
    let position: u64 = store.trim_offset();

    Ok(self.register(position))
  }

  /// Opens a reader at `position`.
  ///
  /// Fails with [`OutOfRange`] unless `position` lies between the current
  /// trim offset and [`len`].
  ///
  /// [`OutOfRange`]: crate::error::ExceptionGroup::OutOfRange
  /// [`len`]: ConcurrentPipe::len
  pub fn open_reader_at(&self, position: u64) -> Result<PipeReader> {
    self.shared.check_disposed()?;

    let store: MutexGuard<'_, Store> = self.shared.store();
    let trim: u64 = store.trim_offset();
    let len: u64 = store.len();

    if position < trim || position > len {
      return Err(raise_exception!(
        OutOfRange,
        "reader position {position} is outside [{trim}, {len}]",
      ));
    }

    Ok(self.register(position))
  }

  /// Closes a reader opened from this pipe.
  ///
  /// A reader opened from another pipe is handed back untouched, together
  /// with an [`InvalidOperation`] exception.
  ///
  /// [`InvalidOperation`]: crate::error::ExceptionGroup::InvalidOperation
  pub fn close_reader(&self, reader: PipeReader) -> Result<(), (Exception, PipeReader)> {
    if !reader.belongs_to(&self.shared) {
      return Err((raise_exception!(InvalidOperation, "reader belongs to another pipe"), reader));
    }

    reader.close();

    Ok(())
  }

  /// Finalizes the pipe, then waits until every reader has been closed.
  ///
  /// The pipe only becomes disposed once the last reader is gone; later
  /// operations then fail with [`ObjectDisposed`]. While readers drain, the
  /// pipe is merely finalized. Cancelling the wait leaves it finalized and
  /// not disposed; calling `dispose` again resumes waiting.
  ///
  /// [`ObjectDisposed`]: crate::error::ExceptionGroup::ObjectDisposed
  pub async fn dispose(&mut self, cancel: &CancellationToken) -> Result<()> {
    self.shared.finalize();

    tracing::debug!(
      target: "braid",
      pipe = "dispose",
      readers = self.shared.cursors.len(),
    );

    while !self.shared.cursors.is_empty() {
      self.shared.drained.wait(cancel).await?;
    }

    self.shared.mark_disposed();

    tracing::debug!(target: "braid", pipe = "dispose", result = "drained");

    Ok(())
  }

  // ---------------------------------------------------------------------------
  // Queries
  // ---------------------------------------------------------------------------

  /// Returns the total number of bytes written, trimmed bytes included.
  #[inline]
  pub fn len(&self) -> u64 {
    self.shared.store().len()
  }

  /// Returns `true` if nothing has been written.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns the smallest offset still readable.
  #[inline]
  pub fn trim_offset(&self) -> u64 {
    self.shared.store().trim_offset()
  }

  /// Returns the number of bytes currently allocated for the buffer.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.shared.store().capacity()
  }

  #[inline]
  pub fn is_finalized(&self) -> bool {
    self.shared.store().is_finalized()
  }

  #[inline]
  pub fn is_disposed(&self) -> bool {
    self.shared.is_disposed()
  }

  /// Returns the number of open readers.
  #[inline]
  pub fn reader_count(&self) -> usize {
    self.shared.cursors.len()
  }

  /// Returns every open reader and its position, ordered by open time.
  #[inline]
  pub fn reader_positions(&self) -> Vec<(CursorId, u64)> {
    self.shared.cursors.positions()
  }

  // ---------------------------------------------------------------------------
  // Misc. Utilities
  // ---------------------------------------------------------------------------

  fn slowest_reader(&self, buffer: &TrimBuffer) -> u64 {
    match self.shared.cursors.min_position() {
      Some(position) => position.max(buffer.trim_offset()),
      None => buffer.len(),
    }
  }

  fn register(&self, position: u64) -> PipeReader {
    let (id, slot): (CursorId, Arc<CursorSlot>) = self.shared.cursors.register(position);

    tracing::debug!(target: "braid", pipe = "open reader", reader = %id, position);

    PipeReader::new(Arc::clone(&self.shared), id, slot, position)
  }
}

impl Default for ConcurrentPipe {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl Drop for ConcurrentPipe {
  fn drop(&mut self) {
    self.shared.finalize();
  }
}

impl Debug for ConcurrentPipe {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let store: MutexGuard<'_, Store> = self.shared.store();

    f.debug_struct("ConcurrentPipe")
      .field("len", &store.len())
      .field("trim_offset", &store.trim_offset())
      .field("finalized", &store.is_finalized())
      .field("readers", &self.shared.cursors.len())
      .finish()
  }
}
