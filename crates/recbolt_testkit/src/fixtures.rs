//! Registry fixtures.
//!
//! Provides registries over temporary files that clean up after themselves
//! and can be closed and reopened against the same file.

use recbolt_core::{Options, Registry};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// A registry over a store file in a temporary directory.
pub struct TempRegistry {
    registry: Option<Registry>,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TempRegistry {
    /// Creates a registry over `models.db` in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("models.db");
        let registry = Registry::open(Self::options(&path)).expect("Failed to open registry");

        Self {
            registry: Some(registry),
            path,
            _temp_dir: temp_dir,
        }
    }

    fn options(path: &Path) -> Options {
        Options::new()
            .file(path)
            .open_timeout(Duration::from_millis(10))
    }

    /// Returns the store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the options used to open the store.
    pub fn open_options(&self) -> Options {
        Self::options(&self.path)
    }

    /// Returns the live registry.
    pub fn registry(&self) -> &Registry {
        self.registry.as_ref().expect("registry is open")
    }

    /// Closes the registry and opens a fresh one over the same file.
    ///
    /// Collections must be registered again on the new registry.
    pub fn reopen(&mut self) -> &Registry {
        if let Some(registry) = self.registry.take() {
            registry.close().expect("Failed to close registry");
        }
        let registry = Registry::open(self.open_options()).expect("Failed to reopen registry");
        self.registry.insert(registry)
    }
}

impl Default for TempRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempRegistry {
    type Target = Registry;

    fn deref(&self) -> &Self::Target {
        self.registry()
    }
}

/// Runs a test with a registry over a temporary file.
pub fn with_temp_registry<F, R>(f: F) -> R
where
    F: FnOnce(&Registry) -> R,
{
    let temp = TempRegistry::new();
    f(&temp)
}

/// Runs a test with an in-memory registry.
pub fn with_memory_registry<F, R>(f: F) -> R
where
    F: FnOnce(&Registry) -> R,
{
    let registry = Registry::in_memory().expect("Failed to open in-memory registry");
    f(&registry)
}
