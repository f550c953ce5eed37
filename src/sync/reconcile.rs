//! Membership Reconciler.
//!
//! `added = remote - local`, `removed = local - remote`, applied as minimal
//! inserts and deletes. New items and existing items go through the same
//! diff; for a new item the local set is simply empty.

use std::collections::HashSet;
use std::hash::Hash;

use crate::error::SyncResult;
use crate::model::{FolderId, ItemId};
use crate::store::{MembershipChange, RecordOutcome, Store};

use super::events::{EntityKind, SyncEvent, SyncObserver};

/// Elements of `left` missing from `right`, in ascending order.
pub fn set_difference<T>(left: &HashSet<T>, right: &HashSet<T>) -> Vec<T>
where
    T: Eq + Hash + Ord + Clone,
{
    let mut diff: Vec<T> = left.difference(right).cloned().collect();
    diff.sort();
    diff
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub added: Vec<FolderId>,
    pub removed: Vec<FolderId>,
}

impl MembershipDiff {
    pub fn compute(remote: &HashSet<FolderId>, local: &HashSet<FolderId>) -> Self {
        Self {
            added: set_difference(remote, local),
            removed: set_difference(local, remote),
        }
    }

    /// Diff that only drops the item from `folder`.
    pub fn removal(folder: FolderId) -> Self {
        Self {
            added: Vec::new(),
            removed: vec![folder],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Apply a diff to a stored note and report what changed.
pub async fn apply_note_diff<O: SyncObserver>(
    store: &Store,
    observer: &O,
    item: ItemId,
    diff: &MembershipDiff,
) -> SyncResult<MembershipChange> {
    if diff.is_empty() {
        return Ok(MembershipChange::default());
    }
    let change = store
        .apply_note_memberships(item, &diff.added, &diff.removed)
        .await?;
    report_change(observer, EntityKind::Note, item, &change);
    Ok(change)
}

pub(crate) fn report_change<O: SyncObserver>(
    observer: &O,
    kind: EntityKind,
    item: ItemId,
    change: &MembershipChange,
) {
    for folder in &change.added {
        observer.on_event(SyncEvent::MembershipAdded {
            kind,
            item,
            folder: folder.clone(),
        });
    }
    for folder in &change.removed {
        observer.on_event(SyncEvent::MembershipRemoved {
            kind,
            item,
            folder: folder.clone(),
        });
    }
    for folder in &change.folders_collected {
        observer.on_event(SyncEvent::FolderDeleted {
            kind,
            folder: folder.clone(),
        });
    }
    if change.item_pruned {
        observer.on_event(SyncEvent::ItemDeleted { kind, item });
    }
}

/// Report a recorded item. `folder_title` resolves titles for folders the
/// store had to create.
pub(crate) fn report_record<O, F>(
    observer: &O,
    kind: EntityKind,
    item: ItemId,
    title: &str,
    outcome: &RecordOutcome,
    folder_title: F,
) where
    O: SyncObserver,
    F: Fn(&FolderId) -> String,
{
    for folder in &outcome.folders_created {
        observer.on_event(SyncEvent::FolderCreated {
            kind,
            folder: folder.clone(),
            title: folder_title(folder),
        });
    }
    if outcome.item_created {
        observer.on_event(SyncEvent::ItemCreated {
            kind,
            item,
            title: title.to_string(),
        });
    }
    report_change(observer, kind, item, &outcome.membership);
}
