//! Independent cursors over one shared physical stream.
//!
//! A [`SharedStream`] wraps a seekable stream behind a single async mutex.
//! Each [`StreamReader`] and [`StreamWriter`] handed out by it keeps its own
//! position; every physical operation takes the mutex, seeks to the cursor's
//! position, performs the I/O, and checks that the physical position moved by
//! exactly the number of bytes transferred.
//!
//! Cancellation applies to acquiring the mutex. Once a physical operation has
//! started it runs to completion, so a cursor never observes a half-applied
//! transfer.

mod reader;
mod shared;
mod writer;

pub use self::reader::StreamReader;
pub use self::shared::SharedStream;
pub use self::writer::StreamWriter;

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::io;
  use std::io::SeekFrom;
  use std::pin::Pin;
  use std::task::Context;
  use std::task::Poll;
  use tokio::io::AsyncRead;
  use tokio::io::AsyncSeek;
  use tokio::io::ReadBuf;
  use tokio::task::JoinHandle;
  use tokio_util::sync::CancellationToken;

  use crate::error::ExceptionClass;
  use crate::error::ExceptionGroup;
  use crate::io::SharedStream;
  use crate::io::StreamReader;
  use crate::io::StreamWriter;

  type Memory = std::io::Cursor<Vec<u8>>;

  /// Serves reads without ever moving its physical position.
  struct Stuck {
    position: u64,
  }

  impl AsyncRead for Stuck {
    fn poll_read(self: Pin<&mut Self>, _: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
      let count: usize = buf.remaining().min(4);
      buf.put_slice(&[7; 4][..count]);
      Poll::Ready(Ok(()))
    }
  }

  impl AsyncSeek for Stuck {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
      if let SeekFrom::Start(offset) = position {
        self.position = offset;
      }

      Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<u64>> {
      Poll::Ready(Ok(self.position))
    }
  }

  #[tokio::test]
  async fn test_independent_cursors() {
    let cancel: CancellationToken = CancellationToken::new();
    let stream: SharedStream<Memory> = SharedStream::memory();

    let mut writer: StreamWriter<Memory> = stream.writer();
    let mut head: StreamReader<Memory> = stream.reader();
    let mut tail: StreamReader<Memory> = stream.reader_at(6);
    let mut buffer: [u8; 5] = [0; 5];

    writer.write(b"hello ", &cancel).await.unwrap();
    writer.write(b"world", &cancel).await.unwrap();

    assert_eq!(writer.position(), 11);

    assert_eq!(tail.read(&mut buffer, &cancel).await.unwrap(), 5);
    assert_eq!(&buffer, b"world");

    assert_eq!(head.read(&mut buffer, &cancel).await.unwrap(), 5);
    assert_eq!(&buffer, b"hello");
    assert_eq!(head.position(), 5);

    assert_eq!(tail.read(&mut buffer, &cancel).await.unwrap(), 0);
    assert_eq!(tail.position(), 11);
    assert_eq!(stream.len(&cancel).await.unwrap(), 11);
  }

  #[tokio::test]
  async fn test_read_to_count() {
    let cancel: CancellationToken = CancellationToken::new();
    let stream: SharedStream<Memory> = SharedStream::memory();

    let mut writer: StreamWriter<Memory> = stream.writer();
    let mut reader: StreamReader<Memory> = stream.reader();
    let mut buffer: [u8; 8] = [0; 8];

    writer.write(b"abcdef", &cancel).await.unwrap();

    assert_eq!(reader.read_to_count(&mut buffer, &cancel).await.unwrap(), 6);
    assert_eq!(&buffer[..6], b"abcdef");
  }

  #[tokio::test]
  async fn test_seek() {
    let cancel: CancellationToken = CancellationToken::new();
    let stream: SharedStream<Memory> = SharedStream::memory();

    let mut writer: StreamWriter<Memory> = stream.writer();
    let mut reader: StreamReader<Memory> = stream.reader();
    let mut buffer: [u8; 3] = [0; 3];

    writer.write(b"0123456789", &cancel).await.unwrap();

    assert_eq!(writer.seek(SeekFrom::Start(2), &cancel).await.unwrap(), 2);
    writer.write(b"xy", &cancel).await.unwrap();

    assert_eq!(reader.seek(SeekFrom::End(-9), &cancel).await.unwrap(), 1);
    assert_eq!(reader.read(&mut buffer, &cancel).await.unwrap(), 3);
    assert_eq!(&buffer, b"1xy");

    assert_eq!(reader.seek(SeekFrom::Current(2), &cancel).await.unwrap(), 6);

    let error = reader.seek(SeekFrom::Current(-7), &cancel).await.unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::OutOfRange);
    assert_eq!(reader.position(), 6);
  }

  #[tokio::test]
  async fn test_write_past_end() {
    let cancel: CancellationToken = CancellationToken::new();
    let stream: SharedStream<Memory> = SharedStream::memory();

    let mut writer: StreamWriter<Memory> = stream.writer_at(3);

    writer.write(b"z", &cancel).await.unwrap();
    writer.flush(&cancel).await.unwrap();

    drop(writer);

    assert_eq!(stream.into_inner().unwrap().into_inner(), b"\0\0\0z");
  }

  #[tokio::test]
  async fn test_cancelled_read() {
    let cancel: CancellationToken = CancellationToken::new();
    let stream: SharedStream<Memory> = SharedStream::memory();
    let mut reader: StreamReader<Memory> = stream.reader();

    cancel.cancel();

    let error = reader.read(&mut [0; 4], &cancel).await.unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::Cancelled);
    assert_eq!(reader.position(), 0);
  }

  #[tokio::test]
  async fn test_position_mismatch() {
    let cancel: CancellationToken = CancellationToken::new();
    let stream: SharedStream<Stuck> = SharedStream::new(Stuck { position: 0 });
    let mut reader: StreamReader<Stuck> = stream.reader();

    let error = reader.read(&mut [0; 8], &cancel).await.unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::InvariantViolation);
    assert_eq!(error.class(), ExceptionClass::Fatal);
    assert_eq!(reader.position(), 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_writers_disjoint_ranges() {
    let stream: SharedStream<Memory> = SharedStream::memory();

    let tasks: Vec<JoinHandle<()>> = (0..8_u8)
      .map(|index| {
        let mut writer: StreamWriter<Memory> = stream.writer_at(u64::from(index) * 16);

        tokio::spawn(async move {
          let cancel: CancellationToken = CancellationToken::new();

          for _ in 0..4 {
            writer.write(&[index; 4], &cancel).await.unwrap();
          }
        })
      })
      .collect();

    for task in tasks {
      task.await.unwrap();
    }

    let bytes: Vec<u8> = stream.into_inner().unwrap().into_inner();

    assert_eq!(bytes.len(), 128);

    for (index, chunk) in bytes.chunks(16).enumerate() {
      assert!(chunk.iter().all(|byte| usize::from(*byte) == index));
    }
  }
}
