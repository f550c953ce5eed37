//! Frontier Sync: forward-only scan of one folder down to the first
//! already-known note.
//!
//! The scan reads newest-first pages from offset 0 and stops at the first
//! note whose id is at or below the folder's frontier, or at a short page.
//! Everything seen above the frontier is recorded oldest-first once the
//! scan is complete, one transaction per note. A failed fetch therefore
//! persists nothing, and a failed write leaves a committed prefix that the
//! next pass resumes from without leaving a hole under the new frontier.

use crate::error::SyncResult;
use crate::model::{ItemId, Note, NoteFolder, dedup_by_identity, identity_cmp};
use crate::remote::NoteSource;
use crate::store::Store;

use super::events::{EntityKind, SyncObserver};
use super::reconcile::report_record;

#[derive(Debug, Clone, Default)]
pub struct FrontierOutcome {
    pub frontier_before: ItemId,
    pub frontier_after: ItemId,
    pub pages_fetched: usize,
    /// Notes stored for the first time, oldest first.
    pub created: Vec<Note>,
    /// Notes above the frontier that were already stored via another folder.
    pub linked: usize,
}

pub async fn sync_folder<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    folder: &NoteFolder,
) -> SyncResult<FrontierOutcome>
where
    R: NoteSource,
    O: SyncObserver,
{
    let frontier = store.note_frontier(&folder.id).await?;
    let page_size = remote.page_size().max(1);

    let mut outcome = FrontierOutcome {
        frontier_before: frontier,
        frontier_after: frontier,
        ..Default::default()
    };

    let mut fresh = Vec::new();
    let mut offset = 0;
    'scan: loop {
        let page = remote.list_notes_in_folder(&folder.id, offset).await?;
        outcome.pages_fetched += 1;

        let len = page.len();
        for note in page {
            if note.id <= frontier {
                break 'scan;
            }
            fresh.push(note);
        }
        // A full page may be the last one; the next fetch comes back empty
        if len < page_size {
            break;
        }
        offset += page_size;
    }

    let mut fresh = dedup_by_identity(fresh);
    fresh.sort_by(identity_cmp);

    for note in fresh {
        let recorded = store.record_note(&note, folder).await?;
        report_record(
            observer,
            EntityKind::Note,
            note.id,
            &note.title,
            &recorded,
            |_| folder.title.clone(),
        );
        outcome.frontier_after = outcome.frontier_after.max(note.id);
        if recorded.item_created {
            outcome.created.push(note);
        } else {
            outcome.linked += 1;
        }
    }

    tracing::debug!(
        "Folder {}: frontier {} -> {} ({} new, {} linked, {} pages)",
        folder.id,
        outcome.frontier_before,
        outcome.frontier_after,
        outcome.created.len(),
        outcome.linked,
        outcome.pages_fetched
    );

    Ok(outcome)
}
