use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use tokio_util::sync::CancellationToken;
use triomphe::Arc;

use crate::error::Result;
use crate::loom::sync::MutexGuard;
use crate::pipe::CursorId;
use crate::pipe::CursorSlot;
use crate::pipe::buffer::Store;
use crate::pipe::shared::PipeShared;

/// An independent reading cursor over a [`ConcurrentPipe`].
///
/// Positions are absolute offsets into the pipe and only move forward.
/// Dropping the reader deregisters it from the pipe.
///
/// [`ConcurrentPipe`]: crate::pipe::ConcurrentPipe
pub struct PipeReader {
  shared: Arc<PipeShared>,
  slot: Arc<CursorSlot>,
  id: CursorId,
  position: u64,
}

impl PipeReader {
  #[inline]
  pub(crate) fn new(shared: Arc<PipeShared>, id: CursorId, slot: Arc<CursorSlot>, position: u64) -> Self {
    Self {
      shared,
      slot,
      id,
      position,
    }
  }

  /// Returns the identifier of this reader within its pipe.
  #[inline]
  pub fn id(&self) -> CursorId {
    self.id
  }

  /// Returns the absolute offset of the next byte to read.
  #[inline]
  pub fn position(&self) -> u64 {
    self.position
  }

  /// Returns `true` if the pipe is finalized and every byte has been read.
  #[inline]
  pub fn is_end_of_stream(&self) -> bool {
    self.shared.store().is_end_of_stream(self.position)
  }

  // ---------------------------------------------------------------------------
  // Reading
  // ---------------------------------------------------------------------------

  /// Copies the bytes currently available into `buffer` without waiting.
  ///
  /// Returns the number of bytes copied, which is zero when the reader has
  /// caught up with the writer. Fails with [`OutOfRange`] if the writer has
  /// trimmed past this reader's position.
  ///
  /// [`OutOfRange`]: crate::error::ExceptionGroup::OutOfRange
  pub fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize> {
    self.pull(buffer).map(|(count, _)| count)
  }

  /// Reads at least one byte into `buffer`, waiting for the writer if needed.
  ///
  /// Returns zero only at the end of the stream, or when `buffer` is empty.
  pub async fn read(&mut self, buffer: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
    if buffer.is_empty() {
      return Ok(0);
    }

    loop {
      let (count, end): (usize, bool) = self.pull(buffer)?;

      if count != 0 || end {
        return Ok(count);
      }

      self.slot.signal().wait(cancel).await?;
    }
  }

  /// Fills `buffer` completely, or until the end of the stream.
  ///
  /// Returns the number of bytes read. If cancelled midway, the bytes already
  /// copied stay consumed and the position reflects them.
  pub async fn read_to_count(&mut self, buffer: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
    let mut filled: usize = 0;

    while filled < buffer.len() {
      match self.read(&mut buffer[filled..], cancel).await? {
        0 => break,
        count => filled += count,
      }
    }

    Ok(filled)
  }

  /// Reads everything up to the end of the stream.
  pub async fn read_to_end(&mut self, output: &mut Vec<u8>, cancel: &CancellationToken) -> Result<usize> {
    let mut chunk: [u8; 1024] = [0; 1024];
    let mut total: usize = 0;

    loop {
      match self.read(&mut chunk, cancel).await? {
        0 => break Ok(total),
        count => {
          output.extend_from_slice(&chunk[..count]);
          total += count;
        }
      }
    }
  }

  /// Closes the reader. Equivalent to dropping it.
  #[inline]
  pub fn close(self) {}

  // ---------------------------------------------------------------------------
  // Misc. Utilities
  // ---------------------------------------------------------------------------

  #[inline]
  pub(crate) fn belongs_to(&self, shared: &Arc<PipeShared>) -> bool {
    Arc::ptr_eq(&self.shared, shared)
  }

  /// Copies available bytes and reports whether the stream has ended, all
  /// under one acquisition of the buffer lock.
  fn pull(&mut self, buffer: &mut [u8]) -> Result<(usize, bool)> {
    let store: MutexGuard<'_, Store> = self.shared.store();
    let count: usize = store.read_at(self.position, buffer)?;

    self.position += count as u64;
    self.slot.advance(self.position);

    tracing::trace!(target: "braid", pipe = "read", reader = %self.id, count, position = self.position);

    Ok((count, store.is_end_of_stream(self.position)))
  }
}

impl Drop for PipeReader {
  fn drop(&mut self) {
    if self.shared.cursors.deregister(self.id) {
      tracing::debug!(target: "braid", pipe = "close reader", reader = %self.id, position = self.position);
    }

    self.shared.drained.set();
  }
}

impl Debug for PipeReader {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("PipeReader")
      .field("id", &self.id)
      .field("position", &self.position)
      .finish_non_exhaustive()
  }
}
