//! Reference-counted orchestration for the offline article cache.
//!
//! This crate ties the metadata store to the external collaborators that do
//! the actual work: a [`ResourceLister`] that discovers which sub-resources
//! make up an article page, and a [`FileWriter`] that downloads and deletes
//! the bytes. The [`Tracker`] serializes every metadata mutation onto one
//! worker task and reacts to the writer's completion signals, so the
//! group/item ownership graph stays consistent however the network and disk
//! interleave.
//!
//! # Lifecycle of a cached article
//! Enabling registers the page document and each discovered resource under
//! the article's group and submits downloads; completion flips items to
//! downloaded. Disabling marks items nothing else references as
//! pending-delete and asks the writer to drop their bytes; only the writer's
//! confirmation removes records (and cascades away emptied groups). Content
//! already on disk from before tracking existed is adopted through
//! [`Tracker::register_migrated`].

pub mod config;
pub mod error;
mod fetcher;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod notify;
mod tracker;
mod writer;

pub use offprint_keys::{ContentKey, derive_key};

pub use crate::config::TrackerConfig;
pub use crate::fetcher::{ResourceKind, ResourceLister};
pub use crate::notify::CacheChange;
pub use crate::tracker::Tracker;
pub use crate::writer::{FileWriter, WriteEvent, WriteEventReceiver, WriteEventSender, event_channel};
