//! Resource discovery collaborator.
//!
//! Discovering which sub-resources make up an article page is network work
//! performed outside this crate. The orchestrator only depends on the
//! [`ResourceLister`] contract; failures are logged and treated as "zero
//! resources for this class", never as a reason to abort caching the rest of
//! the group.

use crate::error::Result;
use async_trait::async_trait;
use derive_more::Display;
use url::Url;

/// The two resource classes fetched independently when a group is cached.
/// A failure in one class does not cancel the other.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Stylesheets, scripts and images the offline page needs to render.
    #[display("offline resources")]
    OfflineResources,
    /// The page's media list (galleries, video posters, audio).
    #[display("media list")]
    MediaList,
}

/// Enumerates the resource locators belonging to an article page.
// TODO: When `dyn async trait` stabilizes, migrate to native 2024 Edition async traits.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    /// List the locators of one resource class for the given article.
    ///
    /// Implementations own their retry and timeout policy; the orchestrator
    /// applies none of its own.
    async fn list(&self, article: &Url, kind: ResourceKind) -> Result<Vec<Url>>;
}
