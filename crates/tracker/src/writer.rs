//! File writer collaborator and its completion channel.
//!
//! The file writer owns the actual bytes on durable storage; the orchestrator
//! never touches file content. Requests flow out through the [`FileWriter`]
//! trait and completion flows back in as [`WriteEvent`]s on an mpsc channel,
//! so every state change lands on the orchestrator's worker task instead of
//! whatever thread the writer happens to finish on.

use async_trait::async_trait;
use offprint_keys::ContentKey;
use tokio::sync::mpsc;
use url::Url;

/// Completion signals emitted by the file writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    /// Byte content for the item was written to durable storage.
    Downloaded(ContentKey),
    /// The download failed; the item keeps its current state and a later
    /// explicit user action retries.
    DownloadFailed(ContentKey, String),
    /// Pre-existing on-disk content for the item was adopted successfully.
    Migrated(ContentKey),
    /// The item's backing bytes are confirmed gone.
    Deleted(ContentKey),
    /// Byte deletion failed; the item stays marked pending-delete.
    DeleteFailed(ContentKey, String),
}

pub type WriteEventSender = mpsc::UnboundedSender<WriteEvent>;
pub type WriteEventReceiver = mpsc::UnboundedReceiver<WriteEvent>;

/// Create the completion channel shared between a file writer and the
/// tracker: hand the sender to the writer, the receiver to
/// [`Tracker::spawn`](crate::Tracker::spawn).
pub fn event_channel() -> (WriteEventSender, WriteEventReceiver) {
    mpsc::unbounded_channel()
}

/// Byte-level storage collaborator.
///
/// Both methods are submissions, not completions: they return once the
/// request is accepted, and the outcome arrives later as a [`WriteEvent`].
/// Late results for items no longer tracked are harmless — the tracker
/// ignores completion for unknown keys.
// TODO: When `dyn async trait` stabilizes, migrate to native 2024 Edition async traits.
#[async_trait]
pub trait FileWriter: Send + Sync {
    /// Request the item's bytes be fetched from `locator` and written to
    /// durable storage.
    async fn download(&self, key: &ContentKey, locator: &Url);

    /// Request the item's backing bytes be removed from durable storage.
    ///
    /// Only ever called for items no group references any more; the
    /// orchestrator guarantees that by construction.
    async fn delete(&self, key: &ContentKey);
}
