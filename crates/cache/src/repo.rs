//! Repository for Group and Item entities and their ownership relation.
//!
//! Groups and items form a many-to-many graph through the `group_items` join
//! table. The graph is the cache's reference-counting mechanism: an item is
//! only eligible for byte deletion once no group links to it any more.
//!
//! # Relationships
//!
//! - Many groups can reference the same item (a flag image shared by two
//!   cached articles exists once).
//! - A group's own page document is itself an item, keyed identically to the
//!   group.
//! - Deleting an item's last join row leaves an orphan;
//!   [`Repository::purge_item`] removes the orphan and any group emptied by
//!   it in one transaction.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Group, Item, ItemRow};
use exn::{OptionExt, ResultExt};
use offprint_keys::ContentKey;
use sqlx::SqlitePool;
use time::UtcDateTime;

/// Repository for the cache metadata store.
///
/// All mutating methods run inside a transaction; a failed commit surfaces as
/// the fatal [`ErrorKind::Database`] because the store must remain the single
/// source of truth for "is this cached".
///
/// The repository itself is not a synchronisation point. Callers that mutate
/// the graph are expected to do so from a single serialized context (the
/// tracker's worker task); the repository only guarantees that each
/// individual operation is atomic.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Exact-match group lookup. `None` is the typed "not found", never an error.
    pub async fn find_group(&self, key: &ContentKey) -> Result<Option<Group>> {
        let row: Option<(String,)> = sqlx::query_as(include_str!("../queries/find_group.sql"))
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(row.map(|(key,)| Group::from_key(key)))
    }

    /// Exact-match item lookup.
    pub async fn find_item(&self, key: &ContentKey) -> Result<Option<Item>> {
        let row: Option<ItemRow> = sqlx::query_as(include_str!("../queries/find_item.sql"))
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Item::try_from).transpose()
    }

    /// All items currently linked to a group.
    pub async fn items_for_group(&self, group: &ContentKey) -> Result<Vec<Item>> {
        let rows: Vec<ItemRow> = sqlx::query_as(include_str!("../queries/items_for_group.sql"))
            .bind(group.as_str())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Item::try_from).collect()
    }

    /// Items whose *only* referencing group is the given one.
    ///
    /// This is the dedup-preserving selection used when a group is uncached:
    /// items that appear here may be marked pending-delete, items shared with
    /// any other group must be left untouched. Byte deletion is therefore
    /// never requested for an item another group still needs.
    pub async fn exclusive_items(&self, group: &ContentKey) -> Result<Vec<Item>> {
        let rows: Vec<ItemRow> = sqlx::query_as(include_str!("../queries/exclusive_items_for_group.sql"))
            .bind(group.as_str())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Item::try_from).collect()
    }

    /// Keys of all groups currently linked to an item.
    pub async fn groups_for_item(&self, item: &ContentKey) -> Result<Vec<ContentKey>> {
        let keys: Vec<String> = sqlx::query_scalar(include_str!("../queries/groups_for_item.sql"))
            .bind(item.as_str())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(keys.into_iter().map(ContentKey::from_raw).collect())
    }

    /// Items still marked pending-delete, oldest first.
    ///
    /// A pending marker survives process restarts by design (the record is
    /// only removed once the file writer confirms deletion), so on startup
    /// the orchestrator re-issues delete requests for everything listed here.
    pub async fn pending_delete_items(&self) -> Result<Vec<Item>> {
        let rows: Vec<ItemRow> = sqlx::query_as(include_str!("../queries/pending_delete_items.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Item::try_from).collect()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Create a group record if absent. Existing records are untouched.
    pub async fn upsert_group(&self, key: &ContentKey) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_group.sql"))
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Create an item record if absent, returning the stored item.
    ///
    /// Creation stamps `created_at = now` with all flags false; an existing
    /// record is returned as-is.
    pub async fn upsert_item(&self, key: &ContentKey) -> Result<Item> {
        sqlx::query(include_str!("../queries/upsert_item.sql"))
            .bind(key.as_str())
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        self.find_item(key).await?.ok_or_raise(|| ErrorKind::Database)
    }

    /// Add a join row between a group and an item. Idempotent.
    pub async fn link(&self, group: &ContentKey, item: &ContentKey) -> Result<()> {
        sqlx::query(include_str!("../queries/link.sql"))
            .bind(group.as_str())
            .bind(item.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Remove the join row between a group and an item, if present.
    ///
    /// The caller is responsible for checking for orphaned items afterwards
    /// (normally via [`purge_item`](Self::purge_item), which does both in one
    /// transaction).
    pub async fn unlink(&self, group: &ContentKey, item: &ContentKey) -> Result<()> {
        sqlx::query(include_str!("../queries/unlink.sql"))
            .bind(group.as_str())
            .bind(item.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Register an item under a group: upsert both records and link them, in
    /// one transaction.
    ///
    /// `from_migration` is stamped onto the item whether it is new or
    /// existing — re-registering previously migrated content through the
    /// normal path clears the migration marker. `created_at` is preserved on
    /// existing items.
    pub async fn register(&self, group: &ContentKey, item: &ContentKey, from_migration: bool) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/upsert_group.sql"))
            .bind(group.as_str())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/register_item.sql"))
            .bind(item.as_str())
            .bind(from_migration)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/link.sql"))
            .bind(group.as_str())
            .bind(item.as_str())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    /// Mark an item for removal. The record (and its join rows) survive until
    /// the file writer confirms the bytes are gone.
    ///
    /// Returns `false` if no such item exists.
    pub async fn mark_pending_delete(&self, item: &ContentKey) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/mark_pending_delete.sql"))
            .bind(item.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a confirmed byte download.
    pub async fn set_downloaded(&self, item: &ContentKey) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/set_downloaded.sql"))
            .bind(item.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a confirmed migration: the adopted bytes count as downloaded
    /// and the migration marker is cleared.
    pub async fn confirm_migration(&self, item: &ContentKey) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/confirm_migration.sql"))
            .bind(item.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Removal cascade
    // =========================================================================

    /// Remove an item whose backing bytes the file writer has confirmed
    /// deleted, cascading to any group it empties.
    ///
    /// In one transaction: delete every join row for the item, delete the
    /// item record, then delete each previously linked group that has no
    /// items left. A group is never retained with an empty item set past this
    /// point.
    ///
    /// Returns `None` when no item row existed under this key (a late or
    /// duplicate confirmation); otherwise the keys of the groups deleted by
    /// the cascade.
    pub async fn purge_item(&self, item: &ContentKey) -> Result<Option<Vec<ContentKey>>> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let linked_groups: Vec<String> = sqlx::query_scalar(include_str!("../queries/groups_for_item.sql"))
            .bind(item.as_str())
            .fetch_all(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/unlink_item_everywhere.sql"))
            .bind(item.as_str())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let deleted = sqlx::query(include_str!("../queries/delete_item.sql"))
            .bind(item.as_str())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if deleted.rows_affected() == 0 {
            // Untracked key: no joins existed either, so nothing cascades.
            tx.commit().await.or_raise(|| ErrorKind::Database)?;
            return Ok(None);
        }
        let mut removed = Vec::new();
        for group in linked_groups {
            let result = sqlx::query(include_str!("../queries/delete_group_if_empty.sql"))
                .bind(&group)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            if result.rows_affected() > 0 {
                removed.push(ContentKey::from_raw(group));
            }
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use rstest::rstest;

    fn key(s: &str) -> ContentKey {
        ContentKey::from_raw(s)
    }

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    #[tokio::test]
    async fn test_find_miss_is_none() {
        let repo = repo().await;
        assert!(repo.find_group(&key("nope")).await.unwrap().is_none());
        assert!(repo.find_item(&key("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_item_stamps_defaults() {
        let repo = repo().await;
        let item = repo.upsert_item(&key("host/doc")).await.unwrap();
        assert!(!item.is_downloaded);
        assert!(!item.is_pending_delete);
        assert!(!item.from_migration);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let repo = repo().await;
        let g = key("host/article");
        repo.register(&g, &g, false).await.unwrap();
        let first = repo.find_item(&g).await.unwrap().unwrap();
        repo.register(&g, &g, false).await.unwrap();
        // No duplicate join rows, created_at untouched.
        assert_eq!(repo.items_for_group(&g).await.unwrap().len(), 1);
        let second = repo.find_item(&g).await.unwrap().unwrap();
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn test_register_stamps_migration_flag() {
        let repo = repo().await;
        let g = key("host/article");
        repo.register(&g, &g, true).await.unwrap();
        assert!(repo.find_item(&g).await.unwrap().unwrap().from_migration);
        // Re-registering through the normal path clears the marker.
        repo.register(&g, &g, false).await.unwrap();
        assert!(!repo.find_item(&g).await.unwrap().unwrap().from_migration);
    }

    #[tokio::test]
    async fn test_shared_item_has_single_record() {
        let repo = repo().await;
        let (cat, dog, flag) = (key("host/cat"), key("host/dog"), key("cdn/flag.svg"));
        repo.register(&cat, &flag, false).await.unwrap();
        repo.register(&dog, &flag, false).await.unwrap();
        let groups = repo.groups_for_item(&flag).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.contains(&cat) && groups.contains(&dog));
    }

    #[tokio::test]
    async fn test_exclusive_items_respect_sharing() {
        let repo = repo().await;
        let (cat, dog, flag) = (key("host/cat"), key("host/dog"), key("cdn/flag.svg"));
        repo.register(&cat, &cat, false).await.unwrap();
        repo.register(&cat, &flag, false).await.unwrap();
        repo.register(&dog, &dog, false).await.unwrap();
        repo.register(&dog, &flag, false).await.unwrap();
        // The shared flag must not appear in either group's exclusive set.
        let exclusive: Vec<_> = repo.exclusive_items(&cat).await.unwrap();
        assert_eq!(exclusive.len(), 1);
        assert_eq!(exclusive[0].key, cat);
    }

    #[rstest]
    #[case::sole_owner(1, true)]
    #[case::shared_by_two(2, false)]
    #[case::shared_by_three(3, false)]
    #[tokio::test]
    async fn test_exclusive_items_by_reference_count(#[case] owners: usize, #[case] expect_exclusive: bool) {
        let repo = repo().await;
        let flag = key("cdn/flag.svg");
        let groups: Vec<_> = (0..owners).map(|n| key(&format!("host/article-{n}"))).collect();
        for group in &groups {
            repo.register(group, &flag, false).await.unwrap();
        }
        let exclusive = repo.exclusive_items(&groups[0]).await.unwrap();
        assert_eq!(exclusive.iter().any(|item| item.key == flag), expect_exclusive);
    }

    #[tokio::test]
    async fn test_exclusive_items_after_other_group_removed() {
        let repo = repo().await;
        let (cat, dog, flag) = (key("host/cat"), key("host/dog"), key("cdn/flag.svg"));
        repo.register(&cat, &flag, false).await.unwrap();
        repo.register(&dog, &flag, false).await.unwrap();
        repo.unlink(&cat, &flag).await.unwrap();
        let exclusive = repo.exclusive_items(&dog).await.unwrap();
        assert_eq!(exclusive.len(), 1);
        assert_eq!(exclusive[0].key, flag);
    }

    #[tokio::test]
    async fn test_purge_cascades_to_empty_groups() {
        let repo = repo().await;
        let g = key("host/article");
        repo.register(&g, &g, false).await.unwrap();
        let removed = repo.purge_item(&g).await.unwrap().unwrap();
        assert_eq!(removed, vec![g.clone()]);
        assert!(repo.find_item(&g).await.unwrap().is_none());
        assert!(repo.find_group(&g).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_spares_groups_with_other_items() {
        let repo = repo().await;
        let (g, img) = (key("host/article"), key("cdn/img1.png"));
        repo.register(&g, &g, false).await.unwrap();
        repo.register(&g, &img, false).await.unwrap();
        let removed = repo.purge_item(&img).await.unwrap().unwrap();
        assert!(removed.is_empty());
        assert!(repo.find_group(&g).await.unwrap().is_some());
        assert!(repo.find_item(&g).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_unknown_item_reports_untracked() {
        let repo = repo().await;
        let g = key("host/article");
        repo.register(&g, &g, false).await.unwrap();
        assert!(repo.purge_item(&key("cdn/ghost.png")).await.unwrap().is_none());
        // A repeat purge of an already removed item reports the same.
        assert!(repo.purge_item(&g).await.unwrap().is_some());
        assert!(repo.purge_item(&g).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_delete_listing() {
        let repo = repo().await;
        let (g, img) = (key("host/article"), key("cdn/img1.png"));
        repo.register(&g, &g, false).await.unwrap();
        repo.register(&g, &img, false).await.unwrap();
        assert!(repo.pending_delete_items().await.unwrap().is_empty());
        assert!(repo.mark_pending_delete(&img).await.unwrap());
        let pending = repo.pending_delete_items().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, img);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let repo = repo().await;
        let g = key("host/article");
        repo.register(&g, &g, true).await.unwrap();
        assert!(repo.confirm_migration(&g).await.unwrap());
        let item = repo.find_item(&g).await.unwrap().unwrap();
        assert!(item.is_downloaded && !item.from_migration);
        assert!(repo.set_downloaded(&g).await.unwrap());
        // Transitions against unknown keys report "not found", not an error.
        assert!(!repo.set_downloaded(&key("nope")).await.unwrap());
        assert!(!repo.mark_pending_delete(&key("nope")).await.unwrap());
    }
}
