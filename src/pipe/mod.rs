//! Single-writer, multi-reader byte pipe over one growable buffer.
//!
//! # Architecture
//!
//! - [`ConcurrentPipe`]: the only writer; appends, trims, finalizes
//! - [`PipeReader`]: an independent cursor with its own position
//! - `Cursors`: the registry of open readers, their published positions,
//!   and the [`Signal`] each reader parks on while caught up
//!
//! Writes, trims, and reads all serialize on one short lock around the
//! buffer, so a reader never observes a partially applied write. Readers
//! never hold that lock while waiting; they park on their own signal, which
//! the writer sets after every write and on finalization.
//!
//! # Offsets
//!
//! Every position is an absolute offset into everything ever written.
//! Trimming drops the prefix below the new trim offset; the storage is
//! compacted by index, so positions stay valid across compaction.
//!
//! [`Signal`]: crate::sync::Signal

mod buffer;
mod cursors;
mod reader;
mod shared;
mod writer;

pub use self::cursors::CursorId;
pub use self::reader::PipeReader;
pub use self::writer::ConcurrentPipe;

#[cfg(not(loom))]
pub(crate) use self::cursors::CursorSlot;
#[cfg(not(loom))]
pub(crate) use self::cursors::Cursors;

#[cfg(loom)]
pub use self::cursors::CursorSlot;
#[cfg(loom)]
pub use self::cursors::Cursors;

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
