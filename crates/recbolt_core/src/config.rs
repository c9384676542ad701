//! Registry configuration.

use recbolt_store::StoreOptions;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extra time allowed on top of `open_timeout` for the lock retry loop.
pub const OPEN_TIMEOUT_SLACK: Duration = Duration::from_millis(50);

/// Configuration for opening a [`crate::Registry`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Path of the store file.
    pub file: PathBuf,

    /// How long to wait for another holder of the store file.
    pub open_timeout: Duration,

    /// Whether to sync the store on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            file: PathBuf::from("models.db"),
            open_timeout: Duration::from_millis(50),
            sync_on_commit: true,
        }
    }
}

impl Options {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store file path.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = path.into();
        self
    }

    /// Sets the open timeout.
    #[must_use]
    pub const fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Returns the store name: the file stem of the path.
    #[must_use]
    pub fn name(&self) -> String {
        match self.file.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => self.file.display().to_string(),
        }
    }

    /// Returns how long opening actually waits for the lock.
    #[must_use]
    pub fn effective_open_timeout(&self) -> Duration {
        self.open_timeout.saturating_add(OPEN_TIMEOUT_SLACK)
    }

    /// Returns the options for the underlying store.
    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::default()
            .open_timeout(self.effective_open_timeout())
            .sync_on_commit(self.sync_on_commit)
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (timeout {:?}, sync {})",
            self.file.display(),
            self.open_timeout,
            self.sync_on_commit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::new();
        assert_eq!(options.path(), Path::new("models.db"));
        assert_eq!(options.name(), "models");
        assert_eq!(options.open_timeout, Duration::from_millis(50));
        assert!(options.sync_on_commit);
    }

    #[test]
    fn store_options_carry_slack() {
        let options = Options::new()
            .file("/var/lib/app/parts.db")
            .open_timeout(Duration::from_millis(200))
            .sync_on_commit(false);

        let store = options.store_options();
        assert_eq!(store.open_timeout, Duration::from_millis(250));
        assert!(!store.sync_on_commit);
        assert_eq!(options.name(), "parts");
    }

    #[test]
    fn display_names_the_file() {
        let shown = Options::new().file("parts.db").to_string();
        assert!(shown.starts_with("parts.db"));
    }
}
