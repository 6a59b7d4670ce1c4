use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use offprint_keys::ContentKey;
use time::UtcDateTime;

/// One downloadable unit: the page document itself or a shared sub-resource
/// (image, stylesheet, media list). Items are shared across groups; the join
/// table tracks which groups currently depend on which items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: ContentKey,
    /// Byte content has been written to durable storage by the file writer.
    pub is_downloaded: bool,
    /// Marked for removal; purged once the file writer confirms deletion.
    /// While set, the item is excluded from cached-content queries.
    pub is_pending_delete: bool,
    /// Registered from pre-existing on-disk content rather than a fresh
    /// fetch. Cleared when a download or migration confirmation completes.
    pub from_migration: bool,
    /// Stamped at creation, never mutated.
    pub created_at: UtcDateTime,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ItemRow {
    key: String,
    is_downloaded: i64,
    is_pending_delete: i64,
    from_migration: i64,
    created_at: i64,
}

impl TryFrom<ItemRow> for Item {
    type Error = Error;
    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            key: ContentKey::from_raw(row.key),
            is_downloaded: row.is_downloaded != 0,
            is_pending_delete: row.is_pending_delete != 0,
            from_migration: row.from_migration != 0,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_model() {
        let created = UtcDateTime::now();
        let row = ItemRow {
            key: "en.wikipedia.org/wiki/Cat".to_string(),
            is_downloaded: 1,
            is_pending_delete: 0,
            from_migration: 0,
            created_at: created.unix_timestamp(),
        };
        let item = Item::try_from(row).unwrap();
        assert_eq!(item.key.as_str(), "en.wikipedia.org/wiki/Cat");
        assert!(item.is_downloaded);
        assert!(!item.is_pending_delete);
        // Converting to a Unix timestamp (measured in seconds) inherently
        // strips the nanoseconds component.
        assert_eq!(item.created_at, created.replace_nanosecond(0).unwrap());
    }

    #[test]
    fn test_row_with_bogus_timestamp() {
        let row = ItemRow {
            key: "en.wikipedia.org/wiki/Cat".to_string(),
            is_downloaded: 0,
            is_pending_delete: 0,
            from_migration: 0,
            created_at: i64::MAX,
        };
        assert!(Item::try_from(row).is_err());
    }
}
