//! Async coordination primitives.
//!
//! - [`Signal`]: single-slot auto-reset wake primitive
//! - [`ReentrantAsyncLock`]: mutex re-enterable by its owning [`LockContext`]
//! - [`KeyedAsyncLock`]: lazily created, reference-counted mutex per key
//!
//! All primitives are instance-scoped; nothing here relies on global state.
//! Every wait is cancellable through a [`CancellationToken`] and by dropping
//! the future, and neither path leaves partial ownership or dangling
//! references behind.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod context;
mod keyed;
mod reentrant;
mod signal;

pub use self::context::LockContext;
pub use self::keyed::KeyedAsyncLock;
pub use self::keyed::KeyedGuard;
pub use self::reentrant::ReentrantAsyncLock;
pub use self::reentrant::ReentrantGuard;
pub use self::signal::Signal;
