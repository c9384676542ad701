//! # recbolt core
//!
//! Binds user-defined record types to a bucket store, giving each record a
//! stable identity and creation/update timestamps.
//!
//! This crate provides:
//! - [`Record`] - the capability a type implements to be stored
//! - [`embed`] - validation and one-time identity installation
//! - [`Collection`] - the in-memory index and bucket of one record type
//! - [`Registry`] - the owner of the store and of every collection
//!
//! ## Durability
//!
//! A collection's index never runs ahead of the store: a save writes the
//! record's bytes first and indexes it only once the write succeeded. A
//! failed [`Rec::save`] puts the record's timestamps back exactly as they
//! were.
//!
//! ## Logging
//!
//! Nothing here installs a subscriber. A [`Registry`] logs under the span it
//! is opened in and gives each collection a child span.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod error;
mod model;
mod registry;

pub use collection::Collection;
pub use config::{Options, OPEN_TIMEOUT_SLACK};
pub use error::{CoreError, CoreResult};
pub use model::{
    check_record, decode_envelope, embed, encode_envelope, short_type_name, unmarshal, Identity,
    Model, ModelId, Rec, Record, Slot, Timestamp, Timestamps,
};
pub use registry::Registry;
