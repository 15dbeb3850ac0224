use std::io::SeekFrom;
use tokio::io::AsyncSeek;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

use crate::error::Exception;
use crate::error::Result;
use crate::io::SharedStream;
use crate::io::shared::seek_to;
use crate::io::shared::verify;

/// A writing cursor over a [`SharedStream`].
#[derive(Debug)]
pub struct StreamWriter<S> {
  stream: SharedStream<S>,
  position: u64,
}

impl<S> StreamWriter<S> {
  #[inline]
  pub(crate) fn new(stream: SharedStream<S>, position: u64) -> Self {
    Self { stream, position }
  }

  /// Returns the offset of the next byte to write.
  #[inline]
  pub fn position(&self) -> u64 {
    self.position
  }

  /// Returns the stream this cursor writes to.
  #[inline]
  pub fn stream(&self) -> &SharedStream<S> {
    &self.stream
  }
}

impl<S> StreamWriter<S>
where
  S: AsyncWrite + AsyncSeek + Unpin,
{
  /// Writes all of `bytes` at the cursor position and advances past them.
  pub async fn write(&mut self, bytes: &[u8], cancel: &CancellationToken) -> Result<()> {
    let mut stream: MutexGuard<'_, S> = self.stream.lock(cancel).await?;
    let target: u64 = self.position + bytes.len() as u64;

    seek_to(&mut *stream, self.position).await?;
    stream.write_all(bytes).await.map_err(Exception::io)?;
    verify(&mut *stream, target).await?;

    tracing::trace!(target: "braid", stream = "write", count = bytes.len(), position = target);

    self.position = target;

    Ok(())
  }

  /// Flushes the physical stream.
  pub async fn flush(&mut self, cancel: &CancellationToken) -> Result<()> {
    let mut stream: MutexGuard<'_, S> = self.stream.lock(cancel).await?;
    stream.flush().await.map_err(Exception::io)
  }

  /// Moves the cursor and returns its new position.
  ///
  /// Only the cursor moves; the physical stream is repositioned by the next
  /// write.
  pub async fn seek(&mut self, target: SeekFrom, cancel: &CancellationToken) -> Result<u64> {
    self.position = self.stream.resolve(self.position, target, cancel).await?;
    Ok(self.position)
  }
}
