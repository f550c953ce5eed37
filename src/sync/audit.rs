//! Full Audit Pass: make a folder's local id set equal to the remote one.
//!
//! Costs one request per remote page plus one per missing note. Runs when a
//! folder's reported count disagrees with the local count, or for every
//! folder on a forced audit.
//!
//! The count trigger cannot see a folder where N notes were deleted and N
//! others added between passes. Only a forced audit repairs that.

use crate::error::{SyncError, SyncResult};
use crate::model::{ItemId, Note, NoteFolder};
use crate::remote::NoteSource;
use crate::store::Store;

use super::events::{EntityKind, SyncObserver};
use super::reconcile::{MembershipDiff, apply_note_diff, report_record, set_difference};

#[derive(Debug, Clone, Default)]
pub struct AuditOutcome {
    pub remote_total: usize,
    /// Notes dropped from the folder because the remote no longer lists them.
    pub removed: Vec<ItemId>,
    /// Notes deleted outright because no folder holds them anymore.
    pub pruned: Vec<ItemId>,
    /// Notes fetched and stored for the first time.
    pub created: Vec<Note>,
    /// Notes already stored via another folder, added to this one.
    pub linked: Vec<ItemId>,
}

pub async fn audit_folder<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    folder: &NoteFolder,
) -> SyncResult<AuditOutcome>
where
    R: NoteSource,
    O: SyncObserver,
{
    let remote_ids = remote.list_all_note_ids_in_folder(&folder.id).await?;
    let local_ids = store.note_ids_in_folder(&folder.id).await?;

    let to_delete = set_difference(&local_ids, &remote_ids);
    let to_fetch = set_difference(&remote_ids, &local_ids);

    tracing::info!(
        "Auditing folder {} ({}): {} remote, {} local, {} to delete, {} to fetch",
        folder.id,
        folder.title,
        remote_ids.len(),
        local_ids.len(),
        to_delete.len(),
        to_fetch.len()
    );

    let mut outcome = AuditOutcome {
        remote_total: remote_ids.len(),
        ..Default::default()
    };

    for item in to_delete {
        let change =
            apply_note_diff(store, observer, item, &MembershipDiff::removal(folder.id.clone()))
                .await?;
        outcome.removed.push(item);
        if change.item_pruned {
            outcome.pruned.push(item);
        }
    }

    for item in to_fetch {
        // Content is immutable; a note already stored elsewhere only needs
        // the membership.
        if store.has_note(item).await? {
            let linked = store.link_note(item, folder).await?;
            report_record(observer, EntityKind::Note, item, "", &linked, |_| {
                folder.title.clone()
            });
            outcome.linked.push(item);
            continue;
        }

        let note = remote.fetch_note(&folder.id, item).await?;
        if note.id != item {
            return Err(SyncError::parse(
                format!("note {} in folder '{}'", item, folder.id),
                format!("remote returned note {}", note.id),
            ));
        }
        let recorded = store.record_note(&note, folder).await?;
        report_record(
            observer,
            EntityKind::Note,
            note.id,
            &note.title,
            &recorded,
            |_| folder.title.clone(),
        );
        outcome.created.push(note);
    }

    Ok(outcome)
}
