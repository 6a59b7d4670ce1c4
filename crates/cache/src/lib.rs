//! SQLite metadata store for the offline article cache.
//!
//! This crate is the single source of truth for "is this cached". It tracks
//! which content groups (article pages) and which items (page documents and
//! shared sub-resources) have been registered for offline use, and the
//! many-to-many ownership relation between them.
//!
//! # Architecture
//! Two entity tables and a join table:
//! - **Groups**: one row per cacheable bundle, identified by its derived
//!   content key. No state beyond identity.
//! - **Items**: one row per downloadable unit, shared across groups, carrying
//!   the download / pending-delete / migration flags.
//! - **group_items**: the ownership relation; the store's reference counting
//!   is "does any join row still point at this item".
//!
//! The actual bytes live elsewhere (an external file writer owns them); this
//! store only ever records what should exist and what state it is in.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{Group, Item};
pub use crate::repo::Repository;
