use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::io::Cursor;
use std::io::SeekFrom;
use tokio::io::AsyncSeek;
use tokio::io::AsyncSeekExt;
use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;
use triomphe::Arc;

use crate::error::Exception;
use crate::error::Result;
use crate::error::raise_exception;
use crate::io::StreamReader;
use crate::io::StreamWriter;

// -----------------------------------------------------------------------------
// Shared Stream
// -----------------------------------------------------------------------------

/// One physical stream shared by any number of independent cursors.
///
/// Cloning a `SharedStream` yields another handle to the same stream.
pub struct SharedStream<S> {
  inner: Arc<Mutex<S>>,
}

impl SharedStream<Cursor<Vec<u8>>> {
  /// Creates a shared stream over an empty in-memory buffer.
  #[inline]
  pub fn memory() -> Self {
    Self::new(Cursor::new(Vec::new()))
  }
}

impl<S> SharedStream<S> {
  /// Wraps `stream` for shared cursor access.
  #[inline]
  pub fn new(stream: S) -> Self {
    Self {
      inner: Arc::new(Mutex::new(stream)),
    }
  }

  /// Returns a writer positioned at the start of the stream.
  #[inline]
  pub fn writer(&self) -> StreamWriter<S> {
    self.writer_at(0)
  }

  /// Returns a writer positioned at `position`.
  #[inline]
  pub fn writer_at(&self, position: u64) -> StreamWriter<S> {
    StreamWriter::new(self.clone(), position)
  }

  /// Returns a reader positioned at the start of the stream.
  #[inline]
  pub fn reader(&self) -> StreamReader<S> {
    self.reader_at(0)
  }

  /// Returns a reader positioned at `position`.
  #[inline]
  pub fn reader_at(&self, position: u64) -> StreamReader<S> {
    StreamReader::new(self.clone(), position)
  }

  /// Returns the physical stream if this is the last handle to it.
  pub fn into_inner(self) -> Result<S, Self> {
    match Arc::try_unwrap(self.inner) {
      Ok(mutex) => Ok(mutex.into_inner()),
      Err(inner) => Err(Self { inner }),
    }
  }

  /// Locks the physical stream, giving up if `cancel` fires first.
  pub(crate) async fn lock(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, S>> {
    tokio::select! {
      biased;
      () = cancel.cancelled() => Err(raise_exception!(Cancelled, "stream lock cancelled")),
      guard = self.inner.lock() => Ok(guard),
    }
  }
}

impl<S> SharedStream<S>
where
  S: AsyncSeek + Unpin,
{
  /// Returns the length of the physical stream.
  pub async fn len(&self, cancel: &CancellationToken) -> Result<u64> {
    let mut stream: MutexGuard<'_, S> = self.lock(cancel).await?;
    stream.seek(SeekFrom::End(0)).await.map_err(Exception::io)
  }

  /// Resolves `target` against a cursor at `position`.
  ///
  /// Fails with [`OutOfRange`] if the result would be negative.
  ///
  /// [`OutOfRange`]: crate::error::ExceptionGroup::OutOfRange
  pub(crate) async fn resolve(&self, position: u64, target: SeekFrom, cancel: &CancellationToken) -> Result<u64> {
    let (origin, delta): (u64, i64) = match target {
      SeekFrom::Start(offset) => return Ok(offset),
      SeekFrom::Current(delta) => (position, delta),
      SeekFrom::End(delta) => (self.len(cancel).await?, delta),
    };

    origin
      .checked_add_signed(delta)
      .ok_or_else(|| raise_exception!(OutOfRange, "seek to {origin} {delta:+} is out of range"))
  }
}

impl<S> Clone for SharedStream<S> {
  #[inline]
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<S> Debug for SharedStream<S> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("SharedStream").finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Misc. Utilities
// -----------------------------------------------------------------------------

/// Seeks the physical stream to `position`.
pub(crate) async fn seek_to<S>(stream: &mut S, position: u64) -> Result<()>
where
  S: AsyncSeek + Unpin,
{
  let actual: u64 = stream.seek(SeekFrom::Start(position)).await.map_err(Exception::io)?;
  check_position(position, actual)
}

/// Checks that the physical stream sits where the cursor expects it.
pub(crate) async fn verify<S>(stream: &mut S, expected: u64) -> Result<()>
where
  S: AsyncSeek + Unpin,
{
  let actual: u64 = stream.stream_position().await.map_err(Exception::io)?;
  check_position(expected, actual)
}

fn check_position(expected: u64, actual: u64) -> Result<()> {
  if expected == actual {
    return Ok(());
  }

  tracing::error!(target: "braid", stream = "position mismatch", expected, actual);

  Err(raise_exception!(
    InvariantViolation,
    "stream position is {actual}, expected {expected}",
  ))
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
