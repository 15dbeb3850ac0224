//! Braid - async coordination primitives and a concurrent byte pipe for tokio.
//!
//! Braid provides the small pieces cooperating tasks need to share state:
//! a one-slot signal, a reentrant mutex bound to a logical call chain, a
//! reference-counted mutex per key, independent cursors over one physical
//! stream, and a single-writer, multi-reader pipe with trimming.
//!
//! # Quick Start
//!
//! ```no_run
//! use braid::pipe::ConcurrentPipe;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> braid::error::Result<()> {
//! let cancel = CancellationToken::new();
//! let mut pipe = ConcurrentPipe::new();
//! let mut reader = pipe.open_reader()?;
//!
//! pipe.write(b"hello")?;
//! pipe.end_of_stream()?;
//!
//! let mut output = Vec::new();
//! reader.read_to_end(&mut output, &cancel).await?;
//!
//! assert_eq!(output, b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! # Core Modules
//!
//! - [`sync`]: `Signal`, `ReentrantAsyncLock`, `KeyedAsyncLock`
//! - [`pipe`]: `ConcurrentPipe` and its readers
//! - [`io`]: shared-cursor access to one physical stream
//! - [`error`]: Exception system
//! - [`config`]: Pipe and tracing configuration
//! - [`consts`]: Default capacities

mod loom;

pub mod config;
pub mod consts;
pub mod error;
pub mod io;
pub mod pipe;
pub mod sync;
