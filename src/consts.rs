// -----------------------------------------------------------------------------
// Pipe - Memory Allocation
// -----------------------------------------------------------------------------

/// Number of bytes pre-allocated for a new pipe buffer.
pub const DEFAULT_PIPE_CAPACITY: usize = 8 * 1024;

/// Minimum number of trimmed bytes before the pipe buffer is compacted.
///
/// Note: Compaction also requires the trimmed prefix to be at least as
///       large as the retained bytes, so each byte is moved at most a
///       bounded number of times.
pub const DEFAULT_COMPACT_THRESHOLD: usize = 4 * 1024;

/// Number of pre-allocated reader slots in a pipe's cursor registry.
pub const CAP_PIPE_READERS: usize = 4;

// -----------------------------------------------------------------------------
// Locks - Memory Allocation
// -----------------------------------------------------------------------------

/// Number of pre-allocated entries in a keyed lock map.
pub const CAP_KEYED_LOCKS: usize = 16;

