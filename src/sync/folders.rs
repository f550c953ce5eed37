//! Note folder listing refresh.
//!
//! Every listed folder gets a row, even one that holds no notes yet, so its
//! title and rename history are tracked from the first listing. Empty-folder
//! collection therefore only applies to folders emptied by a removal: such a
//! folder is deleted on the spot and recorded again (with a fresh
//! `FolderCreated`) the next time the remote lists it.

use std::collections::HashSet;

use crate::error::SyncResult;
use crate::model::{FolderId, ItemId, NoteFolder};
use crate::remote::NoteSource;
use crate::store::{FolderUpsert, Store};

use super::events::{EntityKind, SyncEvent, SyncObserver};
use super::reconcile::set_difference;

#[derive(Debug, Clone, Default)]
pub struct FolderRefresh {
    /// Remote folders to sync this pass, ignored folders excluded, in
    /// listing order.
    pub folders: Vec<NoteFolder>,
    pub created: Vec<FolderId>,
    pub renamed: Vec<FolderId>,
    pub deleted: Vec<FolderId>,
    /// Notes deleted because a deleted folder was their last one.
    pub notes_pruned: Vec<ItemId>,
}

/// List remote folders and bring local folder rows in line: record new
/// ones, retitle renamed ones, delete the ones the remote no longer lists.
/// Ignored folders count as not listed.
pub async fn refresh_note_folders<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    ignored: &[FolderId],
) -> SyncResult<FolderRefresh>
where
    R: NoteSource,
    O: SyncObserver,
{
    let listed = remote.list_note_folders().await?;

    let mut refresh = FolderRefresh::default();
    let mut seen = HashSet::new();
    for folder in listed {
        if ignored.contains(&folder.id) {
            tracing::debug!("Ignoring folder {} ({})", folder.id, folder.title);
            continue;
        }
        if !seen.insert(folder.id.clone()) {
            tracing::warn!("Folder {} listed twice, keeping the first", folder.id);
            continue;
        }
        refresh.folders.push(folder);
    }

    for folder in &refresh.folders {
        match store.upsert_note_folder(folder).await? {
            FolderUpsert::Created => {
                observer.on_event(SyncEvent::FolderCreated {
                    kind: EntityKind::Note,
                    folder: folder.id.clone(),
                    title: folder.title.clone(),
                });
                refresh.created.push(folder.id.clone());
            }
            FolderUpsert::Renamed { previous } => {
                observer.on_event(SyncEvent::FolderRenamed {
                    kind: EntityKind::Note,
                    folder: folder.id.clone(),
                    previous,
                    title: folder.title.clone(),
                });
                refresh.renamed.push(folder.id.clone());
            }
            FolderUpsert::Unchanged => {}
        }
    }

    let local = store.note_folder_ids().await?;
    for folder in set_difference(&local, &seen) {
        let removal = store.delete_note_folder(&folder).await?;
        if !removal.existed {
            continue;
        }
        tracing::info!(
            "Folder {} vanished remotely: {} memberships removed, {} notes deleted",
            folder,
            removal.members_removed,
            removal.items_pruned.len()
        );
        observer.on_event(SyncEvent::FolderDeleted {
            kind: EntityKind::Note,
            folder: folder.clone(),
        });
        for item in &removal.items_pruned {
            observer.on_event(SyncEvent::ItemDeleted {
                kind: EntityKind::Note,
                item: *item,
            });
        }
        refresh.notes_pruned.extend(removal.items_pruned);
        refresh.deleted.push(folder);
    }

    Ok(refresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{FakeRemote, NullObserver, folder_id, note};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_detects_create_rename_delete() {
        let store = Store::open_in_memory().await.unwrap();
        let remote = FakeRemote::with_page_size(25);
        remote.add_folder("1", "Inbox");
        let old = remote.add_folder("2", "Old");
        remote.add_folder("unread", "Unread");

        let first = refresh_note_folders(&remote, &store, &NullObserver, &[])
            .await
            .unwrap();
        assert_eq!(first.created.len(), 3);
        assert_eq!(first.folders.len(), 3);

        store.record_note(&note(1), &old).await.unwrap();
        remote.rename_folder("1", "Received");
        remote.remove_folder("2");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let second = refresh_note_folders(&remote, &store, &tx, &[]).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.renamed, vec![folder_id("1")]);
        assert_eq!(second.deleted, vec![folder_id("2")]);
        assert_eq!(second.notes_pruned, vec![ItemId::new(1)]);
        assert_eq!(
            store.note_folder_title(&folder_id("1")).await.unwrap().as_deref(),
            Some("Received")
        );
        assert!(store.get_note(ItemId::new(1)).await.unwrap().is_none());

        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                SyncEvent::FolderRenamed {
                    kind: EntityKind::Note,
                    folder: folder_id("1"),
                    previous: "Inbox".to_string(),
                    title: "Received".to_string(),
                },
                SyncEvent::FolderDeleted {
                    kind: EntityKind::Note,
                    folder: folder_id("2"),
                },
                SyncEvent::ItemDeleted {
                    kind: EntityKind::Note,
                    item: ItemId::new(1),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_emptied_folder_is_collected_then_listed_again() {
        let store = Store::open_in_memory().await.unwrap();
        let remote = FakeRemote::with_page_size(25);
        let drafts = remote.add_folder("7", "Drafts");

        // Listed but empty: recorded anyway
        let first = refresh_note_folders(&remote, &store, &NullObserver, &[])
            .await
            .unwrap();
        assert_eq!(first.created, vec![folder_id("7")]);
        assert!(store.note_folder_ids().await.unwrap().contains(&drafts.id));

        store.record_note(&note(4), &drafts).await.unwrap();
        let change = store
            .apply_note_memberships(ItemId::new(4), &[], std::slice::from_ref(&drafts.id))
            .await
            .unwrap();
        assert_eq!(change.folders_collected, vec![folder_id("7")]);
        assert!(store.note_folder_ids().await.unwrap().is_empty());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let second = refresh_note_folders(&remote, &store, &tx, &[]).await.unwrap();
        assert_eq!(second.created, vec![folder_id("7")]);
        drop(tx);
        assert_eq!(
            rx.recv().await,
            Some(SyncEvent::FolderCreated {
                kind: EntityKind::Note,
                folder: folder_id("7"),
                title: "Drafts".to_string(),
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_ignored_folder_is_removed_locally() {
        let store = Store::open_in_memory().await.unwrap();
        let remote = FakeRemote::with_page_size(25);
        remote.add_folder("1", "Inbox");
        let unread = remote.add_folder("unread", "Unread");

        refresh_note_folders(&remote, &store, &NullObserver, &[])
            .await
            .unwrap();
        store.record_note(&note(3), &unread).await.unwrap();

        let refresh = refresh_note_folders(
            &remote,
            &store,
            &NullObserver,
            &[FolderId::symbolic("unread")],
        )
        .await
        .unwrap();
        assert_eq!(refresh.folders.len(), 1);
        assert_eq!(refresh.deleted, vec![FolderId::symbolic("unread")]);
        assert_eq!(
            store.note_folder_ids().await.unwrap(),
            HashSet::from([folder_id("1")])
        );
    }
}
