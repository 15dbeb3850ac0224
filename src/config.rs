//! Construction-time configuration.
//!
//! Nothing here changes observable behavior; the pipe knobs only affect
//! allocation and compaction, and the tracing knobs only affect log output.

use crate::consts;

// -----------------------------------------------------------------------------
// Pipe Config
// -----------------------------------------------------------------------------

/// Buffer configuration for a [`ConcurrentPipe`].
///
/// [`ConcurrentPipe`]: crate::pipe::ConcurrentPipe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipeConfig {
  /// Number of bytes pre-allocated for the live buffer.
  pub capacity: usize,
  /// Minimum number of trimmed bytes before the buffer is compacted.
  pub compact_threshold: usize,
}

impl PipeConfig {
  #[inline]
  pub const fn new() -> Self {
    Self {
      capacity: consts::DEFAULT_PIPE_CAPACITY,
      compact_threshold: consts::DEFAULT_COMPACT_THRESHOLD,
    }
  }

  #[inline]
  pub const fn with_capacity(capacity: usize) -> Self {
    Self {
      capacity,
      compact_threshold: consts::DEFAULT_COMPACT_THRESHOLD,
    }
  }
}

impl Default for PipeConfig {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Tracing Config
// -----------------------------------------------------------------------------

/// Tracing subscriber configuration used by [`init_tracing`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TracingConfig {
  pub source_file: bool,
  pub source_line: bool,
  pub source_name: bool,
  pub thread_info: bool,
  pub verbose: bool,
  pub very_verbose: bool,
}

impl TracingConfig {
  #[inline]
  pub const fn new() -> Self {
    Self {
      source_file: false,
      source_line: false,
      source_name: true,
      thread_info: true,
      verbose: false,
      very_verbose: false,
    }
  }

  #[inline]
  pub const fn filter(&self) -> tracing::Level {
    if self.very_verbose {
      tracing::Level::TRACE
    } else if self.verbose {
      tracing::Level::DEBUG
    } else {
      tracing::Level::INFO
    }
  }
}

impl Default for TracingConfig {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

/// Installs a global `fmt` tracing subscriber built from `config`.
///
/// Fails if a global subscriber has already been set.
#[cfg(feature = "tracing")]
pub fn init_tracing(config: &TracingConfig) -> crate::error::Result<()> {
  use tracing_subscriber::FmtSubscriber;
  use tracing_subscriber::fmt::format;
  use tracing_subscriber::util::SubscriberInitExt;

  use crate::error::raise_exception;

  FmtSubscriber::builder()
    .event_format(format().compact())
    .log_internal_errors(true)
    .with_ansi(true)
    .with_file(config.source_file)
    .with_level(true)
    .with_line_number(config.source_line)
    .with_max_level(config.filter())
    .with_target(config.source_name)
    .with_thread_ids(config.thread_info)
    .with_thread_names(config.thread_info)
    .finish()
    .try_init()
    .map_err(|error| raise_exception!(InvalidOperation, "failed to set tracing subscriber: {error}"))
}

/// Installs a global tracing subscriber built from `config`.
///
/// The `tracing` feature is disabled, so this does nothing.
#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_config: &TracingConfig) -> crate::error::Result<()> {
  Ok(())
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
