use offprint_keys::ContentKey;

/// One cacheable content bundle, typically a single article page.
///
/// A group carries no state of its own beyond its identity; everything else
/// lives on the items it is linked to. Its record exists exactly as long as
/// at least one item references it (a completed uncache deletes the group in
/// the same transaction as its last item's detachment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub key: ContentKey,
}

impl Group {
    pub(crate) fn from_key(key: String) -> Self {
        Self { key: ContentKey::from_raw(key) }
    }
}
