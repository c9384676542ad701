//! The store handle: open, transactions, close.

use crate::backend::StorageBackend;
use crate::error::{StoreError, StoreResult};
use crate::file::FileBackend;
use crate::frame::{self, Op};
use crate::tx::{self, Buckets, ReadTx, WriteTx};
use fs2::FileExt;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Delay between attempts to take the file lock.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Options for opening a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long to wait for another holder to release the file lock.
    pub open_timeout: Duration,
    /// Whether every commit is synced to durable storage before it returns.
    pub sync_on_commit: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_millis(50),
            sync_on_commit: true,
        }
    }
}

impl StoreOptions {
    /// Sets the lock wait timeout.
    #[must_use]
    pub const fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets whether commits are synced.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

struct State {
    buckets: Buckets,
    log: Box<dyn StorageBackend>,
}

/// A transactional, bucket-organized key/value store.
///
/// All state lives in memory as ordered maps and every committed write
/// transaction is appended to a commit log before it becomes visible.
/// Readers run concurrently; a writer excludes readers and other writers for
/// the duration of its closure and commit.
///
/// # Example
///
/// ```rust
/// use recbolt_store::{Store, StoreError};
///
/// let store = Store::open_in_memory().unwrap();
/// store
///     .update(|tx| -> Result<(), StoreError> {
///         tx.create_bucket_if_not_exists(b"fruit")?.put(b"apple", b"red")
///     })
///     .unwrap();
///
/// let colour = store
///     .view(|tx| -> Result<_, StoreError> {
///         Ok(tx.bucket(b"fruit").and_then(|b| b.get(b"apple")).map(<[u8]>::to_vec))
///     })
///     .unwrap();
/// assert_eq!(colour.as_deref(), Some(&b"red"[..]));
/// ```
pub struct Store {
    path: Option<PathBuf>,
    options: StoreOptions,
    state: RwLock<Option<State>>,
}

impl Store {
    /// Opens or creates the store file at `path`.
    ///
    /// Takes an exclusive advisory lock on the file, retrying until
    /// `options.open_timeout` has elapsed, then replays the commit log.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Locked`] if another holder keeps the lock past the timeout
    /// - [`StoreError::Corrupted`] if a complete frame fails validation
    /// - [`StoreError::Io`] for file system failures
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        let backend = FileBackend::open(path)?;
        acquire_lock(&backend, options.open_timeout)?;

        debug!(path = %path.display(), "store file locked");
        Self::from_backend(Some(path.to_path_buf()), Box::new(backend), options)
    }

    /// Opens an ephemeral store with no file behind it.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches the other constructors.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_with_backend(
            Box::new(crate::memory::InMemoryBackend::new()),
            StoreOptions::default(),
        )
    }

    /// Opens a store over an arbitrary backend without file locking.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend's existing log cannot be replayed.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        Self::from_backend(None, backend, options)
    }

    fn from_backend(
        path: Option<PathBuf>,
        mut log: Box<dyn StorageBackend>,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let replay = frame::replay(log.as_ref())?;

        if replay.torn_tail {
            warn!(
                valid_len = replay.valid_len,
                "discarding torn frame at end of commit log"
            );
            log.truncate(replay.valid_len)?;
        }

        let mut buckets = Buckets::new();
        let frames = replay.frames.len();
        for ops in replay.frames {
            tx::apply(&mut buckets, ops);
        }
        debug!(frames, buckets = buckets.len(), "commit log replayed");

        Ok(Self {
            path,
            options,
            state: RwLock::new(Some(State { buckets, log })),
        })
    }

    /// Returns the store file path, or `None` for backend-only stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the options the store was opened with.
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Returns whether [`Store::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().is_none()
    }

    /// Returns the commit log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after close.
    pub fn log_size(&self) -> StoreResult<u64> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(StoreError::Closed)?;
        state.log.size()
    }

    /// Runs `f` in a read-only transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after close, or whatever `f` returns.
    pub fn view<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&ReadTx<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(StoreError::Closed)?;
        f(&ReadTx::new(&state.buckets))
    }

    /// Runs `f` in a read/write transaction.
    ///
    /// If `f` fails nothing is written. If it succeeds its writes are
    /// appended to the commit log as one frame and synced (when
    /// `sync_on_commit` is set) before they become visible. A failed append
    /// is rolled back from the log and leaves the buckets untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after close, the log's error if the
    /// commit fails, or whatever `f` returns.
    pub fn update<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut WriteTx<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(StoreError::Closed)?;

        let mut tx = WriteTx::new(&state.buckets);
        let out = f(&mut tx)?;
        let ops = tx.into_ops();

        if !ops.is_empty() {
            self.commit(state, ops)?;
        }

        Ok(out)
    }

    fn commit(&self, state: &mut State, ops: Vec<Op>) -> StoreResult<()> {
        let frame = frame::encode_frame(&ops)?;
        let before = state.log.size()?;

        let written = state.log.append(&frame).and_then(|_| {
            if self.options.sync_on_commit {
                state.log.sync()
            } else {
                Ok(())
            }
        });

        if let Err(err) = written {
            if let Err(rollback) = state.log.truncate(before) {
                error!(error = %rollback, len = before, "failed to roll back commit log");
            }
            return Err(err);
        }

        tx::apply(&mut state.buckets, ops);
        Ok(())
    }

    /// Syncs the log and releases the file lock.
    ///
    /// Later transactions fail with [`StoreError::Closed`]. Closing an
    /// already closed store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails; the store is closed anyway.
    pub fn close(&self) -> StoreResult<()> {
        let Some(mut state) = self.state.write().take() else {
            return Ok(());
        };
        state.log.sync()?;
        debug!(path = ?self.path, "store closed");
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn acquire_lock(backend: &FileBackend, timeout: Duration) -> StoreResult<()> {
    let contended = fs2::lock_contended_error().raw_os_error();
    let started = Instant::now();

    loop {
        match backend.with_file(|file| file.try_lock_exclusive()) {
            Ok(()) => return Ok(()),
            Err(err) if err.raw_os_error() == contended => {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(StoreError::Locked {
                        path: backend.path().to_path_buf(),
                        timeout,
                    });
                }
                std::thread::sleep(LOCK_RETRY_DELAY.min(timeout - elapsed));
            }
            Err(err) => return Err(err.into()),
        }
    }
}
