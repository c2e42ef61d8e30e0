//! Key-value persistence backends.
//!
//! The profile store only needs four named string slots, so a backend is a
//! plain async get/set/remove/clear over string keys. Two implementations
//! ship with the crate:
//!
//! - [`MemoryBackend`]: process-local map, for tests and embedders that
//!   persist elsewhere
//! - [`RedbBackend`]: ACID-compliant on-disk storage using redb
//!
//! A backend is moved into the [`ProfileStore`](crate::store::ProfileStore)
//! when the store is built and is never handed out again, which keeps the
//! store the sole mutator of its keys.

use std::future::Future;

use crate::error::VaultError;

mod disk;
mod memory;

pub use disk::RedbBackend;
pub use memory::MemoryBackend;

/// Async key-value primitive supplied by the host.
pub trait KeyValueBackend: Send + Sync + 'static {
    /// Read a value; `None` if the key was never set or was removed.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, VaultError>> + Send;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), VaultError>> + Send;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), VaultError>> + Send;

    /// Remove every key.
    fn clear(&self) -> impl Future<Output = Result<(), VaultError>> + Send;
}
