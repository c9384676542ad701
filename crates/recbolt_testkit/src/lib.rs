//! # recbolt testkit
//!
//! Test utilities for recbolt.
//!
//! This crate provides:
//! - Sample record types ([`Widget`], [`Gadget`])
//! - Temporary on-disk registries that can be closed and reopened
//! - A storage backend whose writes can be made to fail on demand
//! - Property-based generators for record fields
//!
//! ## Usage
//!
//! ```rust
//! use recbolt_testkit::prelude::*;
//!
//! with_temp_registry(|registry| {
//!     let widgets = registry.register::<Widget>().unwrap();
//!     widgets.create(&Widget::rec("bolt", 42)).unwrap();
//!     assert_eq!(widgets.len(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod fixtures;
pub mod generators;
pub mod records;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::records::*;
}

pub use backend::*;
pub use fixtures::*;
pub use generators::*;
pub use records::*;
