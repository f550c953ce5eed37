//! Synchronization and reconciliation engine.
//!
//! This module is split into:
//! - `mod.rs` - Pass orchestration and error policy
//! - `events.rs` - Observer hook for every create/delete/rename decision
//! - `reconcile.rs` - Membership Reconciler (set differences, minimal mutations)
//! - `frontier.rs` - Frontier Sync (forward-only incremental scan)
//! - `audit.rs` - Full Audit Pass (set equality per folder)
//! - `folders.rs` - Note folder listing refresh
//! - `gallery.rs` - Gallery pass for deviations
//!
//! Error policy: a transport failure abandons the pass, since the remote is
//! unusable until the next poll. A parse failure skips the folder it came
//! from. Store failures stop the pass.

pub mod audit;
pub mod events;
pub mod folders;
pub mod frontier;
pub mod gallery;
pub mod reconcile;
#[cfg(test)]
mod testing;

pub use events::{LogObserver, SyncObserver};

use crate::error::{SyncError, SyncResult};
use crate::model::{Deviation, FolderId, ItemId, Note, NoteFolder};
use crate::remote::{GallerySource, NoteSource};
use crate::store::Store;

/// What one pass changed, for logging and notifications.
#[derive(Debug, Default)]
pub struct PassReport {
    pub new_notes: Vec<Note>,
    pub new_deviations: Vec<Deviation>,
    pub notes_deleted: Vec<ItemId>,
    pub deviations_deleted: Vec<ItemId>,
    pub folders_audited: Vec<FolderId>,
    /// Folders skipped after a parse failure, with the reason.
    pub folders_skipped: Vec<(FolderId, String)>,
}

impl PassReport {
    pub fn has_changes(&self) -> bool {
        !self.new_notes.is_empty()
            || !self.new_deviations.is_empty()
            || !self.notes_deleted.is_empty()
            || !self.deviations_deleted.is_empty()
    }

    fn skip(&mut self, folder: &NoteFolder, err: SyncError) -> SyncResult<()> {
        if err.aborts_pass() {
            return Err(err);
        }
        tracing::warn!("Skipping folder {} ({}): {}", folder.id, folder.title, err);
        self.folders_skipped
            .push((folder.id.clone(), err.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    pub notes: bool,
    pub gallery: bool,
    /// Audit every note folder instead of running Frontier Sync.
    pub force_audit: bool,
    pub ignored_folders: Vec<FolderId>,
}

/// Steady-state note sync: refresh folders, run Frontier Sync on each, then
/// audit folders whose reported count disagrees with the local count.
pub async fn run_note_pass<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    ignored: &[FolderId],
    report: &mut PassReport,
) -> SyncResult<()>
where
    R: NoteSource,
    O: SyncObserver,
{
    let refresh = refresh_folders(remote, store, observer, ignored, report).await?;

    for folder in &refresh.folders {
        match frontier::sync_folder(remote, store, observer, folder).await {
            Ok(outcome) => report.new_notes.extend(outcome.created),
            Err(e) => {
                report.skip(folder, e)?;
                continue;
            }
        }

        let local = store.note_count_in_folder(&folder.id).await?;
        if local == folder.remote_count {
            continue;
        }
        tracing::info!(
            "Folder {} ({}) count mismatch: remote {}, local {}",
            folder.id,
            folder.title,
            folder.remote_count,
            local
        );
        audit_into(remote, store, observer, folder, report).await?;
    }

    Ok(())
}

/// Forced audit ("fsck"): refresh folders and audit every one of them.
/// Frontier Sync is skipped; the audit already covers it.
pub async fn run_forced_audit<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    ignored: &[FolderId],
    report: &mut PassReport,
) -> SyncResult<()>
where
    R: NoteSource,
    O: SyncObserver,
{
    let refresh = refresh_folders(remote, store, observer, ignored, report).await?;

    for folder in &refresh.folders {
        audit_into(remote, store, observer, folder, report).await?;
    }

    Ok(())
}

async fn refresh_folders<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    ignored: &[FolderId],
    report: &mut PassReport,
) -> SyncResult<folders::FolderRefresh>
where
    R: NoteSource,
    O: SyncObserver,
{
    let mut refresh = folders::refresh_note_folders(remote, store, observer, ignored).await?;
    if !refresh.created.is_empty() || !refresh.renamed.is_empty() || !refresh.deleted.is_empty() {
        tracing::info!(
            "Note folders: {} new, {} renamed, {} deleted",
            refresh.created.len(),
            refresh.renamed.len(),
            refresh.deleted.len()
        );
    }
    report
        .notes_deleted
        .extend(std::mem::take(&mut refresh.notes_pruned));
    Ok(refresh)
}

async fn audit_into<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    folder: &NoteFolder,
    report: &mut PassReport,
) -> SyncResult<()>
where
    R: NoteSource,
    O: SyncObserver,
{
    match audit::audit_folder(remote, store, observer, folder).await {
        Ok(outcome) => {
            tracing::info!(
                "Folder {} audited: {} remote, {} removed, {} fetched, {} linked",
                folder.id,
                outcome.remote_total,
                outcome.removed.len(),
                outcome.created.len(),
                outcome.linked.len()
            );
            report.folders_audited.push(folder.id.clone());
            report.notes_deleted.extend(outcome.pruned);
            report.new_notes.extend(outcome.created);
            Ok(())
        }
        Err(e) => report.skip(folder, e),
    }
}

pub async fn run_gallery_pass<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    report: &mut PassReport,
) -> SyncResult<()>
where
    R: GallerySource,
    O: SyncObserver,
{
    let outcome = gallery::sync_gallery(remote, store, observer).await?;
    report.new_deviations.extend(outcome.created);
    report.deviations_deleted.extend(outcome.deleted);
    Ok(())
}

/// One complete pass over everything enabled in `options`.
pub async fn run_pass<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
    options: &PassOptions,
) -> SyncResult<PassReport>
where
    R: NoteSource + GallerySource,
    O: SyncObserver,
{
    let mut report = PassReport::default();

    if options.notes {
        if options.force_audit {
            run_forced_audit(remote, store, observer, &options.ignored_folders, &mut report)
                .await?;
        } else {
            run_note_pass(remote, store, observer, &options.ignored_folders, &mut report).await?;
        }
    }

    if options.gallery {
        match run_gallery_pass(remote, store, observer, &mut report).await {
            Ok(()) => {}
            Err(e) if e.aborts_pass() => return Err(e),
            Err(e) => tracing::warn!("Gallery pass skipped: {}", e),
        }
    }

    tracing::info!(
        "Pass complete: {} new notes, {} new deviations, {} notes deleted, {} deviations deleted, {} folders audited, {} skipped",
        report.new_notes.len(),
        report.new_deviations.len(),
        report.notes_deleted.len(),
        report.deviations_deleted.len(),
        report.folders_audited.len(),
        report.folders_skipped.len()
    );

    Ok(report)
}
