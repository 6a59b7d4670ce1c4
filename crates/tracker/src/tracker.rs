//! The cache orchestrator: a handle plus the worker task that owns the store.
//!
//! All metadata mutation happens on one spawned worker task — the serialized
//! execution context. The worker is the sole writer of the metadata store,
//! which removes lost-update races on the group/item relation graph without
//! any fine-grained locking. Callers talk to it through the cloneable
//! [`Tracker`] handle: cache operations are fire-and-forget enqueues, while
//! [`is_cached`](Tracker::is_cached) round-trips through the worker and waits
//! for the answer.

use crate::error::{ErrorKind, Result};
use crate::fetcher::{ResourceKind, ResourceLister};
use crate::notify::CacheChange;
use crate::writer::{FileWriter, WriteEvent, WriteEventReceiver};
use exn::ResultExt;
use offprint_cache::{Database, Repository};
use offprint_keys::{ContentKey, derive_key};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use url::Url;

// Callers are expected to be a handful of UI-adjacent call sites; a small
// backlog is enough and keeps a runaway producer visible early.
const COMMAND_BACKLOG: usize = 64;
const CHANGE_BACKLOG: usize = 64;

enum Command {
    Enable(Url),
    Disable(Url),
    Toggle(Url),
    RegisterMigrated(Url),
    IsCached(Url, oneshot::Sender<bool>),
}

type StoreResult<T> = offprint_cache::error::Result<T>;

/// Handle to the cache orchestrator.
///
/// Cheap to clone; every clone feeds the same worker task. Dropping the last
/// handle shuts the worker down once its queue drains.
#[derive(Clone)]
pub struct Tracker {
    commands: mpsc::Sender<Command>,
    changes: broadcast::Sender<CacheChange>,
}

impl Tracker {
    /// Spawn the worker task against an open metadata store.
    ///
    /// `events` is the receiving half of [`event_channel`](crate::event_channel);
    /// the matching sender belongs to the file writer. Before accepting
    /// commands the worker re-issues delete
    /// requests for any item a previous run left marked pending-delete.
    pub fn spawn(
        db: &Database,
        lister: Arc<dyn ResourceLister>,
        writer: Arc<dyn FileWriter>,
        events: WriteEventReceiver,
    ) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_BACKLOG);
        let (changes, _) = broadcast::channel(CHANGE_BACKLOG);
        let worker = Worker {
            repo: Repository::from(db),
            lister,
            writer,
            changes: changes.clone(),
        };
        tokio::spawn(worker.run(receiver, events));
        Self { commands, changes }
    }

    /// Whether the group for this locator is currently tracked as cached.
    ///
    /// The lookup runs on the worker after everything already queued, and the
    /// caller waits for the reply. Must not be called from code executing on
    /// the worker itself (the reply could never arrive); keep call sites to
    /// places where briefly waiting is acceptable.
    pub async fn is_cached(&self, article: &Url) -> Result<bool> {
        let (reply, answer) = oneshot::channel();
        self.send(Command::IsCached(article.clone(), reply)).await?;
        answer.await.or_raise(|| ErrorKind::Closed)
    }

    /// Cache this article's group for offline use: register the page
    /// document, discover both resource classes, and submit downloads.
    ///
    /// Returns once the request is queued; effects become observable through
    /// later lookups and [`CacheChange`] notifications.
    pub async fn enable(&self, article: &Url) -> Result<()> {
        self.send(Command::Enable(article.clone())).await
    }

    /// Uncache this article's group: items no other group references are
    /// marked pending-delete and their byte deletion is requested. Records
    /// are only removed once the file writer confirms.
    pub async fn disable(&self, article: &Url) -> Result<()> {
        self.send(Command::Disable(article.clone())).await
    }

    /// Enable or disable based on the current cached state.
    ///
    /// The check-and-flip runs as one unit on the worker, so it cannot
    /// interleave with other queued operations.
    pub async fn toggle(&self, article: &Url) -> Result<()> {
        self.send(Command::Toggle(article.clone())).await
    }

    /// Adopt pre-existing on-disk content for this article's page document
    /// into the tracked model without re-downloading it. Sub-resources are
    /// not discovered and no downloads are submitted.
    pub async fn register_migrated(&self, article: &Url) -> Result<()> {
        self.send(Command::RegisterMigrated(article.clone())).await
    }

    /// Subscribe to cache-state change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheChange> {
        self.changes.subscribe()
    }

    async fn send(&self, command: Command) -> Result<()> {
        if self.commands.send(command).await.is_err() {
            exn::bail!(ErrorKind::Closed);
        }
        Ok(())
    }
}

/// The serialized execution context. Owns the repository; nothing else ever
/// mutates the store.
struct Worker {
    repo: Repository,
    lister: Arc<dyn ResourceLister>,
    writer: Arc<dyn FileWriter>,
    changes: broadcast::Sender<CacheChange>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut events: WriteEventReceiver) {
        if let Err(err) = self.resume_pending_deletes().await {
            error!(error = %err, "metadata store failure during startup reconciliation");
            return;
        }
        let mut events_open = true;
        loop {
            // Completion signals finalize in-flight state; drain them ahead
            // of new commands so queued lookups observe settled state.
            let step = tokio::select! {
                biased;
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        // Writer gone; keep serving commands.
                        events_open = false;
                        continue;
                    },
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // All handles dropped.
                    None => break,
                },
            };
            if let Err(err) = step {
                // The store is the single source of truth; a failed commit is
                // configuration-fatal, so don't limp along half-written.
                error!(error = %err, "metadata store failure; shutting down cache tracker");
                break;
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> StoreResult<()> {
        match command {
            Command::Enable(article) => self.enable(&article).await,
            Command::Disable(article) => self.disable(&article).await,
            Command::Toggle(article) => self.toggle(&article).await,
            Command::RegisterMigrated(article) => self.register_migrated(&article).await,
            Command::IsCached(article, reply) => {
                let cached = self.lookup(&article).await?;
                // The caller may have given up waiting; that's fine.
                let _ = reply.send(cached);
                Ok(())
            },
        }
    }

    async fn lookup(&self, article: &Url) -> StoreResult<bool> {
        let Ok(group) = derive_key(article) else {
            return Ok(false);
        };
        Ok(self.repo.find_group(&group).await?.is_some())
    }

    async fn enable(&mut self, article: &Url) -> StoreResult<()> {
        let group = match derive_key(article) {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "cannot cache article with invalid locator");
                return Ok(());
            },
        };
        debug!(group = %group, "enabling offline cache");
        // The page document shares the group's identity.
        self.repo.register(&group, &group, false).await?;
        self.writer.download(&group, article).await;
        // Both resource classes are fetched independently; one failing leaves
        // the other intact.
        let (resources, media) = futures::join!(
            self.lister.list(article, ResourceKind::OfflineResources),
            self.lister.list(article, ResourceKind::MediaList),
        );
        let listings = [(ResourceKind::OfflineResources, resources), (ResourceKind::MediaList, media)];
        for (kind, listing) in listings {
            match listing {
                Ok(locators) => self.register_resources(&group, locators).await?,
                Err(err) => {
                    warn!(group = %group, %kind, error = %err, "resource listing failed; treating class as empty");
                },
            }
        }
        Ok(())
    }

    async fn register_resources(&mut self, group: &ContentKey, locators: Vec<Url>) -> StoreResult<()> {
        for locator in locators {
            // Best-effort enumeration: one underivable resource must not
            // abort the rest of the class.
            let item = match derive_key(&locator) {
                Ok(key) => key,
                Err(err) => {
                    warn!(group = %group, error = %err, "skipping resource with invalid locator");
                    continue;
                },
            };
            self.repo.register(group, &item, false).await?;
            self.writer.download(&item, &locator).await;
        }
        Ok(())
    }

    async fn disable(&mut self, article: &Url) -> StoreResult<()> {
        let group = match derive_key(article) {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "cannot uncache article with invalid locator");
                return Ok(());
            },
        };
        if self.repo.find_group(&group).await?.is_none() {
            // A no-op, not a failure: nothing is cached under this key.
            warn!(group = %group, "disable requested for untracked group");
            return Ok(());
        }
        debug!(group = %group, "disabling offline cache");
        // Only items no other group references may lose their bytes; shared
        // items stay untouched. Re-running a disable re-issues deletes for
        // anything still pending from a failed earlier attempt.
        for item in self.repo.exclusive_items(&group).await? {
            self.repo.mark_pending_delete(&item.key).await?;
            self.writer.delete(&item.key).await;
        }
        // Unlinking and record deletion wait for delete confirmation, so the
        // pending marker survives a restart mid-deletion.
        Ok(())
    }

    async fn toggle(&mut self, article: &Url) -> StoreResult<()> {
        if self.lookup(article).await? {
            self.disable(article).await
        } else {
            self.enable(article).await
        }
    }

    async fn register_migrated(&mut self, article: &Url) -> StoreResult<()> {
        let group = match derive_key(article) {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "cannot adopt content with invalid locator");
                return Ok(());
            },
        };
        debug!(group = %group, "adopting migrated on-disk content");
        self.repo.register(&group, &group, true).await
    }

    async fn handle_event(&mut self, event: WriteEvent) -> StoreResult<()> {
        match event {
            WriteEvent::Downloaded(key) => {
                if self.repo.set_downloaded(&key).await? {
                    self.notify(key, true);
                } else {
                    // A late result for an item already purged; drop it.
                    debug!(item = %key, "download completed for an untracked item");
                }
            },
            WriteEvent::DownloadFailed(key, reason) => {
                // No automatic retry at this layer; a later explicit
                // re-enable resubmits the download.
                warn!(item = %key, %reason, "byte download failed");
            },
            WriteEvent::Migrated(key) => {
                if self.repo.confirm_migration(&key).await? {
                    self.notify(key, true);
                }
            },
            WriteEvent::Deleted(key) => {
                match self.repo.purge_item(&key).await? {
                    Some(removed) => {
                        if !removed.is_empty() {
                            debug!(item = %key, groups = removed.len(), "removed groups emptied by deletion");
                        }
                        self.notify(key, false);
                    },
                    // A duplicate or stale confirmation; drop it.
                    None => debug!(item = %key, "deletion confirmed for an untracked item"),
                }
            },
            WriteEvent::DeleteFailed(key, reason) => {
                // Item stays pending-delete; the next disable pass or the
                // next startup reconciliation tries again.
                warn!(item = %key, %reason, "byte deletion failed");
            },
        }
        Ok(())
    }

    async fn resume_pending_deletes(&mut self) -> StoreResult<()> {
        let pending = self.repo.pending_delete_items().await?;
        if pending.is_empty() {
            return Ok(());
        }
        info!(count = pending.len(), "re-issuing delete requests left pending by a previous run");
        for item in pending {
            self.writer.delete(&item.key).await;
        }
        Ok(())
    }

    fn notify(&self, key: ContentKey, is_cached: bool) {
        // Nobody subscribed is fine.
        let _ = self.changes.send(CacheChange { key, is_cached });
    }
}
