//! Core types for the status hub
//!
//! This crate provides the fundamental types shared by the status tree and
//! everything built on top of it: [`StatusUrl`] addressing, [`Revision`]
//! write contracts, the [`Entry`]/[`Matches`] read model and [`StatusError`].

mod entry;
mod error;
mod revision;
mod url;

pub use entry::{Entry, Matches};
pub use error::{StatusError, StatusResult};
pub use revision::Revision;
pub use url::{StatusUrl, WILDCARD};

/// Scheme used when a store is created without an explicit one
pub const DEFAULT_SCHEME: &str = "status";
