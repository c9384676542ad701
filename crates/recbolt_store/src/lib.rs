//! # recbolt store
//!
//! A small embedded key/value store organized in named buckets, used by
//! `recbolt_core` to persist record collections.
//!
//! ## Design
//!
//! - Buckets are ordered maps from byte keys to byte values
//! - Read transactions ([`Store::view`]) run concurrently
//! - Write transactions ([`Store::update`]) are serialized and atomic: a
//!   transaction's writes are appended to the commit log as one checksummed
//!   frame and synced before they become visible
//! - Opening a file store takes an exclusive advisory lock with a bounded
//!   wait, so two holders never share a file
//!
//! ## Backends
//!
//! - [`FileBackend`] - persistent storage using OS file APIs
//! - [`InMemoryBackend`] - for tests and ephemeral stores
//!
//! ## Example
//!
//! ```rust
//! use recbolt_store::{Store, StoreResult};
//!
//! let store = Store::open_in_memory().unwrap();
//! store
//!     .update(|tx| -> StoreResult<()> {
//!         let mut bucket = tx.create_bucket_if_not_exists(b"Widget")?;
//!         bucket.put(b"id-1", b"payload")
//!     })
//!     .unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
pub mod frame;
mod memory;
mod store;
mod tx;

pub use backend::StorageBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use store::{Store, StoreOptions};
pub use tx::{Bucket, BucketMut, ReadTx, WriteTx};
