use std::cmp::Ordering;
use std::collections::HashSet;

use super::id::{FolderId, ItemId};

/// Anything with an item identity. Equality, set membership and
/// "new vs. known" decisions all go through [`Identified::item_id`].
pub trait Identified {
    fn item_id(&self) -> ItemId;
}

/// Identity comparison. Two records are the same item iff their ids match,
/// whatever their other fields say.
pub fn same_item<A: Identified, B: Identified>(a: &A, b: &B) -> bool {
    a.item_id() == b.item_id()
}

/// Identity ordering (creation order), newest last.
pub fn identity_cmp<A: Identified, B: Identified>(a: &A, b: &B) -> Ordering {
    a.item_id().cmp(&b.item_id())
}

pub fn id_set<T: Identified>(items: &[T]) -> HashSet<ItemId> {
    items.iter().map(Identified::item_id).collect()
}

/// Drop later duplicates by identity, keeping the first occurrence.
pub fn dedup_by_identity<T: Identified>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.item_id()))
        .collect()
}

/// Presentation ordering key: who the item is grouped under, then when.
/// Unrelated to identity ordering.
pub trait DisplayKey {
    fn group_key(&self) -> &str;
    fn timestamp(&self) -> i64;
}

/// Sort for display: lexicographic by group key (case-insensitive), then
/// timestamp.
pub fn sort_for_display<T: DisplayKey>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.group_key()
            .to_lowercase()
            .cmp(&b.group_key().to_lowercase())
            .then_with(|| a.timestamp().cmp(&b.timestamp()))
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: ItemId,
    pub title: String,
    pub sender: String,
    pub timestamp: i64,
    pub body: String,
}

impl Identified for Note {
    fn item_id(&self) -> ItemId {
        self.id
    }
}

impl DisplayKey for Note {
    fn group_key(&self) -> &str {
        &self.sender
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// A note folder as listed remotely. `remote_count` is the remote's own
/// claim about how many notes the folder holds; it is only ever compared,
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFolder {
    pub id: FolderId,
    pub title: String,
    pub remote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryFolder {
    pub id: FolderId,
    pub title: String,
    pub description: String,
    pub url: String,
}

/// Full deviation detail, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deviation {
    pub id: ItemId,
    pub title: String,
    pub url: String,
    pub username: String,
    pub timestamp: i64,
    pub description: String,
}

impl Identified for Deviation {
    fn item_id(&self) -> ItemId {
        self.id
    }
}

impl DisplayKey for Deviation {
    fn group_key(&self) -> &str {
        &self.username
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// A gallery listing entry: enough to decide new vs. known, plus the
/// complete set of gallery folders the deviation currently sits in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviationSummary {
    pub id: ItemId,
    pub title: String,
    pub url: String,
    pub folders: Vec<GalleryFolder>,
}

impl DeviationSummary {
    pub fn folder_ids(&self) -> HashSet<FolderId> {
        self.folders.iter().map(|f| f.id.clone()).collect()
    }
}

impl Identified for DeviationSummary {
    fn item_id(&self) -> ItemId {
        self.id
    }
}
