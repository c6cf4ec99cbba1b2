//! Scene-scoped persistence and local preferences.

mod file;
mod memory;
mod permanent;
mod prefs;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use permanent::PermanentStore;
pub use prefs::{FilePreferences, MemoryPreferences, PreferenceStore, Preferences};

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Key/value store scoped by scene.
///
/// Values are JSON documents. Implementations must be `Send + Sync`; the
/// futures they return are not required to be.
pub trait SceneStore: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`.
    fn get(&self, scene: &str, key: &str) -> BoxFuture<'_, StorageResult<Option<serde_json::Value>>>;

    /// Write a value, replacing any previous one.
    fn set(&self, scene: &str, key: &str, value: serde_json::Value) -> BoxFuture<'_, StorageResult<()>>;

    /// Remove a value. Removing a missing key succeeds.
    fn remove(&self, scene: &str, key: &str) -> BoxFuture<'_, StorageResult<()>>;
}

/// Minimal executor for driving store futures in tests.
#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
