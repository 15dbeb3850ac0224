use std::io::SeekFrom;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncSeek;
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

use crate::error::Exception;
use crate::error::Result;
use crate::io::SharedStream;
use crate::io::shared::seek_to;
use crate::io::shared::verify;

/// A reading cursor over a [`SharedStream`].
#[derive(Debug)]
pub struct StreamReader<S> {
  stream: SharedStream<S>,
  position: u64,
}

impl<S> StreamReader<S> {
  #[inline]
  pub(crate) fn new(stream: SharedStream<S>, position: u64) -> Self {
    Self { stream, position }
  }

  /// Returns the offset of the next byte to read.
  #[inline]
  pub fn position(&self) -> u64 {
    self.position
  }

  /// Returns the stream this cursor reads from.
  #[inline]
  pub fn stream(&self) -> &SharedStream<S> {
    &self.stream
  }
}

impl<S> StreamReader<S>
where
  S: AsyncRead + AsyncSeek + Unpin,
{
  /// Reads into `buffer` at the cursor position.
  ///
  /// Returns the number of bytes read; zero means the end of the physical
  /// stream.
  pub async fn read(&mut self, buffer: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
    let mut stream: MutexGuard<'_, S> = self.stream.lock(cancel).await?;

    seek_to(&mut *stream, self.position).await?;

    let count: usize = stream.read(buffer).await.map_err(Exception::io)?;
    let target: u64 = self.position + count as u64;

    verify(&mut *stream, target).await?;

    tracing::trace!(target: "braid", stream = "read", count, position = target);

    self.position = target;

    Ok(count)
  }

  /// Fills `buffer` completely, or until the end of the physical stream.
  ///
  /// The stream lock is released between chunks so other cursors can
  /// interleave.
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

  /// Moves the cursor and returns its new position.
  pub async fn seek(&mut self, target: SeekFrom, cancel: &CancellationToken) -> Result<u64> {
    self.position = self.stream.resolve(self.position, target, cancel).await?;
    Ok(self.position)
  }
}
