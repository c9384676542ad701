//! Fault injection for the store's commit log.

use recbolt_store::{InMemoryBackend, StorageBackend, StoreError, StoreResult};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An in-memory backend whose appends can be made to fail.
///
/// Clones share both the buffer and the switch, so a test keeps one clone
/// and hands the other to the store.
#[derive(Debug, Clone, Default)]
pub struct FailingBackend {
    inner: InMemoryBackend,
    failing: Arc<AtomicBool>,
}

impl FailingBackend {
    /// Creates a backend that works until told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later append and sync fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns a copy of everything written so far.
    pub fn data(&self) -> Vec<u8> {
        self.inner.data()
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        Ok(())
    }
}

impl StorageBackend for FailingBackend {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        self.check()?;
        self.inner.append(data)
    }

    fn size(&self) -> StoreResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.check()?;
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StoreResult<()> {
        self.inner.truncate(new_size)
    }
}
