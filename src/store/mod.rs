//! SQLite mirror of notes, deviations and their folders.
//!
//! This module is split into:
//! - `mod.rs` - Store handle, connection pool, transactional operations
//! - `schema.rs` - Schema initialization
//! - `membership.rs` - Item/folder membership access shared by both kinds
//! - `note.rs` - Note and note folder rows
//! - `deviation.rs` - Deviation and gallery folder rows
//!
//! Each public operation that mutates runs in one transaction, so an item is
//! never left without the membership it was recorded with, and a membership
//! never outlives its item.

mod deviation;
mod membership;
mod note;
mod schema;

use sqlx::SqlitePool;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SyncResult;
use crate::model::{Deviation, FolderId, GalleryFolder, ItemId, Note, NoteFolder};

pub use membership::{FolderRemoval, MembershipChange};
use membership::{DEVIATIONS, NOTES};

/// One writer at a time is enforced outside the store (instance lock); a
/// small pool still lets reads overlap.
const POOL_SIZE: u32 = 4;

/// Outcome of recording a folder seen in a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderUpsert {
    Created,
    Renamed { previous: String },
    Unchanged,
}

/// Outcome of recording an item with its memberships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    pub item_created: bool,
    pub folders_created: Vec<FolderId>,
    pub membership: MembershipChange,
}

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn open(path: &Path) -> SyncResult<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .connect_with(options)
            .await?;

        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> SyncResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn conn(&self) -> SyncResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    //
    // Notes
    //

    /// Record a listed folder, detecting renames.
    pub async fn upsert_note_folder(&self, folder: &NoteFolder) -> SyncResult<FolderUpsert> {
        let mut tx = self.pool.begin().await?;
        let outcome = note::upsert_note_folder(&mut *tx, folder).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn delete_note_folder(&self, folder: &FolderId) -> SyncResult<FolderRemoval> {
        let mut tx = self.pool.begin().await?;
        let removal = membership::delete_folder(&mut *tx, NOTES, folder).await?;
        tx.commit().await?;
        Ok(removal)
    }

    pub async fn note_folder_ids(&self) -> SyncResult<HashSet<FolderId>> {
        membership::folder_ids(&mut *self.conn().await?, NOTES).await
    }

    #[cfg(test)]
    pub async fn note_folder_title(&self, folder: &FolderId) -> SyncResult<Option<String>> {
        membership::folder_title(&mut *self.conn().await?, NOTES, folder).await
    }

    /// Highest note id recorded in `folder`.
    pub async fn note_frontier(&self, folder: &FolderId) -> SyncResult<ItemId> {
        membership::folder_frontier(&mut *self.conn().await?, NOTES, folder).await
    }

    pub async fn note_ids_in_folder(&self, folder: &FolderId) -> SyncResult<HashSet<ItemId>> {
        membership::folder_item_ids(&mut *self.conn().await?, NOTES, folder).await
    }

    pub async fn note_count_in_folder(&self, folder: &FolderId) -> SyncResult<u64> {
        membership::folder_item_count(&mut *self.conn().await?, NOTES, folder).await
    }

    pub async fn note_folders_of(&self, item: ItemId) -> SyncResult<HashSet<FolderId>> {
        membership::item_folder_ids(&mut *self.conn().await?, NOTES, item).await
    }

    /// Record a note as a member of `folder`. The folder row is created if
    /// garbage collection removed it earlier in the pass.
    pub async fn record_note(&self, note: &Note, folder: &NoteFolder) -> SyncResult<RecordOutcome> {
        let mut tx = self.pool.begin().await?;

        let mut outcome = RecordOutcome::default();
        if note::ensure_note_folder(&mut *tx, folder).await? {
            outcome.folders_created.push(folder.id.clone());
        }
        outcome.item_created = note::insert_note(&mut *tx, note).await?;
        outcome.membership = membership::apply_memberships(
            &mut *tx,
            NOTES,
            note.id,
            std::slice::from_ref(&folder.id),
            &[],
        )
        .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// Apply a membership diff for an existing note.
    pub async fn apply_note_memberships(
        &self,
        item: ItemId,
        added: &[FolderId],
        removed: &[FolderId],
    ) -> SyncResult<MembershipChange> {
        let mut tx = self.pool.begin().await?;
        let change = membership::apply_memberships(&mut *tx, NOTES, item, added, removed).await?;
        tx.commit().await?;
        Ok(change)
    }

    /// Add an already-stored note to `folder`, recording the folder row if
    /// it is missing.
    pub async fn link_note(&self, item: ItemId, folder: &NoteFolder) -> SyncResult<RecordOutcome> {
        let mut tx = self.pool.begin().await?;

        let mut outcome = RecordOutcome::default();
        if note::ensure_note_folder(&mut *tx, folder).await? {
            outcome.folders_created.push(folder.id.clone());
        }
        outcome.membership = membership::apply_memberships(
            &mut *tx,
            NOTES,
            item,
            std::slice::from_ref(&folder.id),
            &[],
        )
        .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn has_note(&self, item: ItemId) -> SyncResult<bool> {
        membership::item_exists(&mut *self.conn().await?, NOTES, item).await
    }

    #[cfg(test)]
    pub async fn get_note(&self, id: ItemId) -> SyncResult<Option<Note>> {
        note::get_note(&self.pool, id).await
    }

    pub async fn get_notes(&self) -> SyncResult<Vec<Note>> {
        note::get_notes(&self.pool).await
    }

    //
    // Deviations
    //

    /// Highest deviation id recorded at all.
    pub async fn deviation_frontier(&self) -> SyncResult<ItemId> {
        membership::max_item_id(&mut *self.conn().await?, DEVIATIONS).await
    }

    pub async fn deviation_ids(&self) -> SyncResult<HashSet<ItemId>> {
        membership::all_item_ids(&mut *self.conn().await?, DEVIATIONS).await
    }

    #[cfg(test)]
    pub async fn has_deviation(&self, item: ItemId) -> SyncResult<bool> {
        membership::item_exists(&mut *self.conn().await?, DEVIATIONS, item).await
    }

    pub async fn deviation_folders_of(&self, item: ItemId) -> SyncResult<HashSet<FolderId>> {
        membership::item_folder_ids(&mut *self.conn().await?, DEVIATIONS, item).await
    }

    #[cfg(test)]
    pub async fn gallery_folder_ids(&self) -> SyncResult<HashSet<FolderId>> {
        membership::folder_ids(&mut *self.conn().await?, DEVIATIONS).await
    }

    /// Record a new deviation with its gallery folder memberships. Folders in
    /// `folders` are recorded first if not already present; `members` must
    /// only name folders that exist by then.
    pub async fn record_deviation(
        &self,
        deviation: &Deviation,
        folders: &[GalleryFolder],
        members: &[FolderId],
    ) -> SyncResult<RecordOutcome> {
        let mut tx = self.pool.begin().await?;

        let mut outcome = RecordOutcome::default();
        for folder in folders {
            if deviation::ensure_gallery_folder(&mut *tx, folder).await? {
                outcome.folders_created.push(folder.id.clone());
            }
        }
        outcome.item_created = deviation::insert_deviation(&mut *tx, deviation).await?;
        outcome.membership =
            membership::apply_memberships(&mut *tx, DEVIATIONS, deviation.id, members, &[]).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// Apply a membership diff for an existing deviation, recording the
    /// given gallery folders first.
    pub async fn apply_deviation_memberships(
        &self,
        item: ItemId,
        folders: &[GalleryFolder],
        added: &[FolderId],
        removed: &[FolderId],
    ) -> SyncResult<RecordOutcome> {
        let mut tx = self.pool.begin().await?;

        let mut outcome = RecordOutcome::default();
        for folder in folders {
            if deviation::ensure_gallery_folder(&mut *tx, folder).await? {
                outcome.folders_created.push(folder.id.clone());
            }
        }
        outcome.membership =
            membership::apply_memberships(&mut *tx, DEVIATIONS, item, added, removed).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn delete_deviation(&self, item: ItemId) -> SyncResult<MembershipChange> {
        let mut tx = self.pool.begin().await?;
        let change = membership::delete_item(&mut *tx, DEVIATIONS, item).await?;
        tx.commit().await?;
        Ok(change)
    }

    #[cfg(test)]
    pub async fn get_deviation(&self, id: ItemId) -> SyncResult<Option<Deviation>> {
        deviation::get_deviation(&self.pool, id).await
    }

    pub async fn get_deviations(&self) -> SyncResult<Vec<Deviation>> {
        deviation::get_deviations(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn note(id: u64) -> Note {
        Note {
            id: ItemId::new(id),
            title: format!("Note {}", id),
            sender: "sender".to_string(),
            timestamp: 1_000 + id as i64,
            body: "body".to_string(),
        }
    }

    fn folder(raw: &str, title: &str) -> NoteFolder {
        NoteFolder {
            id: FolderId::parse(raw).unwrap(),
            title: title.to_string(),
            remote_count: 0,
        }
    }

    fn gallery(raw: &str) -> GalleryFolder {
        GalleryFolder {
            id: FolderId::parse(raw).unwrap(),
            title: format!("Gallery {}", raw),
            description: String::new(),
            url: format!("https://example.com/gallery/{}", raw),
        }
    }

    fn deviation(id: u64) -> Deviation {
        Deviation {
            id: ItemId::new(id),
            title: format!("Deviation {}", id),
            url: format!("https://example.com/art/{}", id),
            username: "artist".to_string(),
            timestamp: 2_000 + id as i64,
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_folder_upsert_detects_rename() {
        let store = Store::open_in_memory().await.unwrap();
        let inbox = folder("1", "Inbox");

        assert_eq!(store.upsert_note_folder(&inbox).await.unwrap(), FolderUpsert::Created);
        assert_eq!(
            store.upsert_note_folder(&inbox).await.unwrap(),
            FolderUpsert::Unchanged
        );

        let renamed = folder("1", "Received");
        assert_eq!(
            store.upsert_note_folder(&renamed).await.unwrap(),
            FolderUpsert::Renamed {
                previous: "Inbox".to_string()
            }
        );
        assert_eq!(
            store.note_folder_title(&renamed.id).await.unwrap().as_deref(),
            Some("Received")
        );
    }

    #[tokio::test]
    async fn test_record_note_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        let inbox = folder("1", "Inbox");
        store.upsert_note_folder(&inbox).await.unwrap();

        let first = store.record_note(&note(10), &inbox).await.unwrap();
        assert!(first.item_created);
        assert_eq!(first.membership.added, vec![inbox.id.clone()]);

        let second = store.record_note(&note(10), &inbox).await.unwrap();
        assert!(!second.item_created);
        assert!(second.membership.is_empty());
        assert_eq!(store.note_count_in_folder(&inbox.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_note_in_many_folders() {
        let store = Store::open_in_memory().await.unwrap();
        let inbox = folder("1", "Inbox");
        let starred = folder("starred", "Starred");

        store.record_note(&note(10), &inbox).await.unwrap();
        let outcome = store.record_note(&note(10), &starred).await.unwrap();
        assert!(!outcome.item_created);
        assert_eq!(outcome.folders_created, vec![starred.id.clone()]);

        let folders = store.note_folders_of(ItemId::new(10)).await.unwrap();
        assert_eq!(folders, HashSet::from([inbox.id.clone(), starred.id.clone()]));
    }

    #[tokio::test]
    async fn test_frontier_per_folder() {
        let store = Store::open_in_memory().await.unwrap();
        let inbox = folder("1", "Inbox");
        let sent = folder("2", "Sent");

        assert_eq!(store.note_frontier(&inbox.id).await.unwrap(), ItemId::ZERO);

        store.record_note(&note(5), &inbox).await.unwrap();
        store.record_note(&note(9), &inbox).await.unwrap();
        store.record_note(&note(7), &sent).await.unwrap();

        assert_eq!(store.note_frontier(&inbox.id).await.unwrap(), ItemId::new(9));
        assert_eq!(store.note_frontier(&sent.id).await.unwrap(), ItemId::new(7));
    }

    #[tokio::test]
    async fn test_removing_last_membership_collects_folder_and_note() {
        let store = Store::open_in_memory().await.unwrap();
        let inbox = folder("1", "Inbox");
        let unread = folder("unread", "Unread");

        store.record_note(&note(1), &inbox).await.unwrap();
        store.record_note(&note(1), &unread).await.unwrap();
        store.record_note(&note(2), &inbox).await.unwrap();

        let change = store
            .apply_note_memberships(ItemId::new(1), &[], &[unread.id.clone()])
            .await
            .unwrap();
        assert_eq!(change.removed, vec![unread.id.clone()]);
        assert_eq!(change.folders_collected, vec![unread.id.clone()]);
        assert!(!change.item_pruned, "note 1 is still in the inbox");

        let change = store
            .apply_note_memberships(ItemId::new(1), &[], &[inbox.id.clone()])
            .await
            .unwrap();
        assert!(change.folders_collected.is_empty(), "note 2 keeps the inbox alive");
        assert!(change.item_pruned);
        assert!(store.get_note(ItemId::new(1)).await.unwrap().is_none());
        assert!(store.get_note(ItemId::new(2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_folder_prunes_orphans_only() {
        let store = Store::open_in_memory().await.unwrap();
        let inbox = folder("1", "Inbox");
        let archive = folder("3", "Archive");

        store.record_note(&note(1), &inbox).await.unwrap();
        store.record_note(&note(2), &inbox).await.unwrap();
        store.record_note(&note(2), &archive).await.unwrap();

        let removal = store.delete_note_folder(&inbox.id).await.unwrap();
        assert!(removal.existed);
        assert_eq!(removal.members_removed, 2);
        assert_eq!(removal.items_pruned, vec![ItemId::new(1)]);

        assert!(store.get_note(ItemId::new(2)).await.unwrap().is_some());
        assert_eq!(
            store.note_folder_ids().await.unwrap(),
            HashSet::from([archive.id.clone()])
        );
    }

    #[tokio::test]
    async fn test_symbolic_folder_behaves_like_numeric() {
        let store = Store::open_in_memory().await.unwrap();
        let unread = folder("unread", "Unread");

        store.upsert_note_folder(&unread).await.unwrap();
        store.record_note(&note(4), &unread).await.unwrap();

        assert_eq!(
            store.note_ids_in_folder(&unread.id).await.unwrap(),
            HashSet::from([ItemId::new(4)])
        );
        assert_eq!(
            store.note_folders_of(ItemId::new(4)).await.unwrap(),
            HashSet::from([FolderId::symbolic("unread")])
        );

        let removal = store.delete_note_folder(&unread.id).await.unwrap();
        assert_eq!(removal.items_pruned, vec![ItemId::new(4)]);
        assert!(store.note_folder_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dangling_membership_is_an_integrity_error() {
        let store = Store::open_in_memory().await.unwrap();
        let inbox = folder("1", "Inbox");
        store.upsert_note_folder(&inbox).await.unwrap();

        // Note 99 was never recorded
        let err = store
            .apply_note_memberships(ItemId::new(99), &[inbox.id.clone()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Integrity(_)), "got {:?}", err);
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_record_deviation_with_folders() {
        let store = Store::open_in_memory().await.unwrap();

        let outcome = store
            .record_deviation(
                &deviation(50),
                &[gallery("10"), gallery("11")],
                &[FolderId::Numeric(10), FolderId::Numeric(11)],
            )
            .await
            .unwrap();
        assert!(outcome.item_created);
        assert_eq!(outcome.folders_created.len(), 2);
        assert_eq!(outcome.membership.added.len(), 2);

        assert_eq!(store.deviation_frontier().await.unwrap(), ItemId::new(50));
        assert!(store.has_deviation(ItemId::new(50)).await.unwrap());
        assert_eq!(
            store.get_deviation(ItemId::new(50)).await.unwrap().unwrap().title,
            "Deviation 50"
        );
    }

    #[tokio::test]
    async fn test_deviation_survives_losing_all_folders() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .record_deviation(&deviation(50), &[gallery("10")], &[FolderId::Numeric(10)])
            .await
            .unwrap();

        let outcome = store
            .apply_deviation_memberships(ItemId::new(50), &[], &[], &[FolderId::Numeric(10)])
            .await
            .unwrap();
        assert_eq!(outcome.membership.folders_collected, vec![FolderId::Numeric(10)]);
        assert!(!outcome.membership.item_pruned);
        assert!(store.has_deviation(ItemId::new(50)).await.unwrap());
        assert!(store.gallery_folder_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_deviation_collects_empty_folders() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .record_deviation(
                &deviation(1),
                &[gallery("10"), gallery("11")],
                &[FolderId::Numeric(10), FolderId::Numeric(11)],
            )
            .await
            .unwrap();
        store
            .record_deviation(&deviation(2), &[], &[FolderId::Numeric(11)])
            .await
            .unwrap();

        let change = store.delete_deviation(ItemId::new(1)).await.unwrap();
        assert!(change.item_pruned);
        assert_eq!(change.folders_collected, vec![FolderId::Numeric(10)]);
        assert_eq!(
            store.deviation_ids().await.unwrap(),
            HashSet::from([ItemId::new(2)])
        );
        assert_eq!(
            store.gallery_folder_ids().await.unwrap(),
            HashSet::from([FolderId::Numeric(11)])
        );
    }

    #[tokio::test]
    async fn test_link_note_recreates_collected_folder() {
        let store = Store::open_in_memory().await.unwrap();
        let inbox = folder("1", "Inbox");
        let sent = folder("2", "Sent");

        store.record_note(&note(1), &inbox).await.unwrap();
        store.record_note(&note(1), &sent).await.unwrap();
        store
            .apply_note_memberships(ItemId::new(1), &[], &[sent.id.clone()])
            .await
            .unwrap();
        assert!(!store.note_folder_ids().await.unwrap().contains(&sent.id));

        let outcome = store.link_note(ItemId::new(1), &sent).await.unwrap();
        assert_eq!(outcome.folders_created, vec![sent.id.clone()]);
        assert_eq!(outcome.membership.added, vec![sent.id.clone()]);
        assert!(!outcome.item_created);
        assert!(store.has_note(ItemId::new(1)).await.unwrap());
        assert!(!store.has_note(ItemId::new(2)).await.unwrap());
    }
}
