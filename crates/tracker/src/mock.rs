//! In-memory collaborator doubles for testing.
//!
//! Available to other crates' dev-dependencies through the `mock` feature.

use crate::error::{ErrorKind, Result};
use crate::fetcher::{ResourceKind, ResourceLister};
use crate::writer::{FileWriter, WriteEvent, WriteEventSender};
use async_trait::async_trait;
use offprint_keys::ContentKey;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

enum Listing {
    Resources(Vec<Url>),
    Failure(String),
}

/// Scriptable [`ResourceLister`].
///
/// Unscripted (article, class) pairs list as empty, matching a page with no
/// resources of that class. Interior mutability keeps the trait methods on
/// `&self` without external synchronisation.
#[derive(Default)]
pub struct MockLister {
    scripts: Mutex<HashMap<(String, ResourceKind), Listing>>,
}

impl MockLister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the locators returned for one resource class of an article.
    pub fn resources<'a>(&self, article: &Url, kind: ResourceKind, locators: impl IntoIterator<Item = &'a str>) {
        let locators = locators
            .into_iter()
            .map(|raw| {
                // The panic here is DELIBERATE. If the test script itself is
                // broken, the test should not pass.
                Url::parse(raw).unwrap_or_else(|_| panic!("MockLister::resources: invalid locator {raw}"))
            })
            .collect();
        self.scripts
            .lock()
            .unwrap()
            .insert((article.to_string(), kind), Listing::Resources(locators));
    }

    /// Script a listing failure for one resource class of an article.
    pub fn fails(&self, article: &Url, kind: ResourceKind, reason: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap()
            .insert((article.to_string(), kind), Listing::Failure(reason.into()));
    }
}

#[async_trait]
impl ResourceLister for MockLister {
    async fn list(&self, article: &Url, kind: ResourceKind) -> Result<Vec<Url>> {
        match self.scripts.lock().unwrap().get(&(article.to_string(), kind)) {
            Some(Listing::Resources(locators)) => Ok(locators.clone()),
            Some(Listing::Failure(reason)) => exn::bail!(ErrorKind::ResourceList(reason.clone())),
            None => Ok(Vec::new()),
        }
    }
}

/// Recording [`FileWriter`] that never touches real storage.
///
/// With `auto_complete` enabled, every accepted request immediately emits its
/// success event (`Downloaded` / `Deleted`). With it disabled, the test
/// drives completion by pushing [`WriteEvent`]s through the sender itself,
/// which is how failure and restart scenarios are exercised.
pub struct MockWriter {
    events: WriteEventSender,
    auto_complete: bool,
    downloads: Mutex<Vec<(ContentKey, Url)>>,
    deletes: Mutex<Vec<ContentKey>>,
}

impl MockWriter {
    pub fn new(events: WriteEventSender, auto_complete: bool) -> Self {
        Self {
            events,
            auto_complete,
            downloads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        }
    }

    /// Keys of every download request accepted so far.
    pub fn downloads(&self) -> Vec<ContentKey> {
        self.downloads.lock().unwrap().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Keys of every delete request accepted so far.
    pub fn deletes(&self) -> Vec<ContentKey> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileWriter for MockWriter {
    async fn download(&self, key: &ContentKey, locator: &Url) {
        self.downloads.lock().unwrap().push((key.clone(), locator.clone()));
        if self.auto_complete {
            // Receiver gone just means the tracker shut down first.
            let _ = self.events.send(WriteEvent::Downloaded(key.clone()));
        }
    }

    async fn delete(&self, key: &ContentKey) {
        self.deletes.lock().unwrap().push(key.clone());
        if self.auto_complete {
            let _ = self.events.send(WriteEvent::Deleted(key.clone()));
        }
    }
}
