//! Pipe storage: a compacting arena while open, a flat snapshot once
//! finalized.
//!
//! Both forms address bytes by absolute logical offset. The arena maps a
//! logical offset to a physical index as `offset - base`, so compaction only
//! changes `base` and `head` and never invalidates reader positions.

use bytes::Bytes;
use std::mem;

use crate::config::PipeConfig;
use crate::error::Result;
use crate::error::raise_exception;

// -----------------------------------------------------------------------------
// Trim Buffer
// -----------------------------------------------------------------------------

/// Growable byte arena with a trimmable prefix.
///
/// ```text
///   data: [ trimmed .. head | retained .......... ]
///          ^ base            ^ trim_offset         ^ len
/// ```
#[derive(Debug)]
pub(crate) struct TrimBuffer {
  data: Vec<u8>,
  head: usize,
  base: u64,
  compact_threshold: usize,
}

impl TrimBuffer {
  #[inline]
  pub(crate) fn new(config: &PipeConfig) -> Self {
    Self {
      data: Vec::with_capacity(config.capacity),
      head: 0,
      base: 0,
      compact_threshold: config.compact_threshold,
    }
  }

  /// Smallest logical offset still retained.
  #[inline]
  pub(crate) fn trim_offset(&self) -> u64 {
    self.base + self.head as u64
  }

  /// Total number of bytes ever written.
  #[inline]
  pub(crate) fn len(&self) -> u64 {
    self.base + self.data.len() as u64
  }

  /// Number of bytes physically retained.
  #[inline]
  pub(crate) fn retained(&self) -> usize {
    self.data.len() - self.head
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    self.data.capacity()
  }

  #[inline]
  pub(crate) fn append(&mut self, bytes: &[u8]) {
    self.data.extend_from_slice(bytes);
  }

  #[inline]
  pub(crate) fn read_at(&self, position: u64, dst: &mut [u8]) -> Result<usize> {
    copy_at(&self.data[self.head..], self.trim_offset(), position, dst)
  }

  /// Drops every byte below `offset`.
  pub(crate) fn trim_to(&mut self, offset: u64) -> Result<()> {
    let trim: u64 = self.trim_offset();
    let len: u64 = self.len();

    if offset < trim || offset > len {
      return Err(raise_exception!(
        OutOfRange,
        "trim target {offset} is outside [{trim}, {len}]",
      ));
    }

    self.head += (offset - trim) as usize;

    if self.head >= self.compact_threshold && self.head >= self.retained() {
      self.compact();
    }

    Ok(())
  }

  /// Moves the retained bytes to the front of the arena.
  fn compact(&mut self) {
    let head: usize = mem::take(&mut self.head);
    let keep: usize = self.data.len() - head;

    self.data.copy_within(head.., 0);
    self.data.truncate(keep);
    self.base += head as u64;

    tracing::trace!(target: "braid", buffer = "compact", moved = keep, dropped = head);
  }

  /// Converts the retained bytes into an immutable snapshot, leaving the
  /// arena empty.
  pub(crate) fn freeze(&mut self) -> Snapshot {
    let base: u64 = self.trim_offset();
    let mut data: Vec<u8> = mem::take(&mut self.data);

    data.drain(..self.head);

    self.base = base;
    self.head = 0;

    Snapshot {
      base,
      bytes: Bytes::from(data),
    }
  }
}

// -----------------------------------------------------------------------------
// Snapshot
// -----------------------------------------------------------------------------

/// The retained bytes of a finalized pipe.
#[derive(Debug)]
pub(crate) struct Snapshot {
  base: u64,
  bytes: Bytes,
}

impl Snapshot {
  #[inline]
  pub(crate) fn trim_offset(&self) -> u64 {
    self.base
  }

  #[inline]
  pub(crate) fn len(&self) -> u64 {
    self.base + self.bytes.len() as u64
  }

  #[inline]
  pub(crate) fn read_at(&self, position: u64, dst: &mut [u8]) -> Result<usize> {
    copy_at(&self.bytes, self.base, position, dst)
  }
}

// -----------------------------------------------------------------------------
// Store
// -----------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum Store {
  Open(TrimBuffer),
  Finalized(Snapshot),
}

impl Store {
  #[inline]
  pub(crate) fn new(config: &PipeConfig) -> Self {
    Self::Open(TrimBuffer::new(config))
  }

  #[inline]
  pub(crate) fn is_finalized(&self) -> bool {
    matches!(self, Self::Finalized(_))
  }

  #[inline]
  pub(crate) fn trim_offset(&self) -> u64 {
    match self {
      Self::Open(buffer) => buffer.trim_offset(),
      Self::Finalized(snapshot) => snapshot.trim_offset(),
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> u64 {
    match self {
      Self::Open(buffer) => buffer.len(),
      Self::Finalized(snapshot) => snapshot.len(),
    }
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    match self {
      Self::Open(buffer) => buffer.capacity(),
      Self::Finalized(snapshot) => snapshot.bytes.len(),
    }
  }

  #[inline]
  pub(crate) fn read_at(&self, position: u64, dst: &mut [u8]) -> Result<usize> {
    match self {
      Self::Open(buffer) => buffer.read_at(position, dst),
      Self::Finalized(snapshot) => snapshot.read_at(position, dst),
    }
  }

  /// Returns `true` if a reader at `position` has consumed everything.
  #[inline]
  pub(crate) fn is_end_of_stream(&self, position: u64) -> bool {
    self.is_finalized() && position == self.len()
  }
}

// -----------------------------------------------------------------------------
// Misc. Utilities
// -----------------------------------------------------------------------------

fn copy_at(live: &[u8], start: u64, position: u64, dst: &mut [u8]) -> Result<usize> {
  if position < start {
    return Err(raise_exception!(
      OutOfRange,
      "position {position} is below trim offset {start}",
    ));
  }

  let offset: u64 = position - start;

  if offset > live.len() as u64 {
    return Err(raise_exception!(
      OutOfRange,
      "position {position} is beyond length {}",
      start + live.len() as u64,
    ));
  }

  let src: &[u8] = &live[offset as usize..];
  let count: usize = src.len().min(dst.len());

  dst[..count].copy_from_slice(&src[..count]);

  Ok(count)
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
