//! Gallery pass: mirror every listed deviation and its folder memberships.
//!
//! The gallery listing is global rather than per folder, and each entry
//! carries its complete folder set. The whole listing is read before
//! anything is deleted, so a failed page never removes a deviation.

use std::collections::{HashMap, HashSet};

use crate::error::{SyncError, SyncResult};
use crate::model::{
    Deviation, DeviationSummary, FolderId, GalleryFolder, ItemId, dedup_by_identity, id_set,
    identity_cmp, same_item,
};
use crate::remote::GallerySource;
use crate::store::{MembershipChange, Store};

use super::events::{EntityKind, SyncObserver};
use super::reconcile::{MembershipDiff, report_change, report_record, set_difference};

/// Gallery folders already recorded during this pass.
#[derive(Debug, Default)]
struct FolderCache {
    recorded: HashSet<FolderId>,
}

impl FolderCache {
    /// Folders of `wanted` that still need recording.
    fn unrecorded(&self, wanted: &[&GalleryFolder]) -> Vec<GalleryFolder> {
        wanted
            .iter()
            .filter(|f| !self.recorded.contains(&f.id))
            .map(|f| (*f).clone())
            .collect()
    }

    fn mark<'a>(&mut self, folders: impl IntoIterator<Item = &'a FolderId>) {
        self.recorded.extend(folders.into_iter().cloned());
    }

    /// Forget folders the store just collected.
    fn evict(&mut self, change: &MembershipChange) {
        for folder in &change.folders_collected {
            self.recorded.remove(folder);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GalleryOutcome {
    pub listed: usize,
    pub frontier: ItemId,
    pub created: Vec<Deviation>,
    /// Known deviations whose folder set changed.
    pub moved: Vec<ItemId>,
    pub deleted: Vec<ItemId>,
    /// Deviations skipped because their detail could not be parsed.
    pub skipped: Vec<ItemId>,
}

async fn list_complete_gallery<R: GallerySource>(remote: &R) -> SyncResult<Vec<DeviationSummary>> {
    let page_size = remote.bulk_page_size().max(1);
    let mut listing = Vec::new();
    let mut offset = 0;
    loop {
        let page = remote.list_gallery(offset).await?;
        let len = page.len();
        listing.extend(page);
        if len < page_size {
            return Ok(listing);
        }
        offset += page_size;
    }
}

pub async fn sync_gallery<R, O>(
    remote: &R,
    store: &Store,
    observer: &O,
) -> SyncResult<GalleryOutcome>
where
    R: GallerySource,
    O: SyncObserver,
{
    let frontier = store.deviation_frontier().await?;
    let mut listing = dedup_by_identity(list_complete_gallery(remote).await?);
    listing.sort_by(identity_cmp);

    let local = store.deviation_ids().await?;
    let mut cache = FolderCache::default();
    let mut outcome = GalleryOutcome {
        listed: listing.len(),
        frontier,
        ..Default::default()
    };

    for summary in &listing {
        let titles: HashMap<&FolderId, &str> = summary
            .folders
            .iter()
            .map(|f| (&f.id, f.title.as_str()))
            .collect();
        let folder_title =
            |id: &FolderId| titles.get(id).map(|t| t.to_string()).unwrap_or_default();

        if local.contains(&summary.id) {
            let current = store.deviation_folders_of(summary.id).await?;
            let diff = MembershipDiff::compute(&summary.folder_ids(), &current);
            if !diff.is_empty() {
                let wanted: Vec<&GalleryFolder> = summary
                    .folders
                    .iter()
                    .filter(|f| diff.added.contains(&f.id))
                    .collect();
                let recorded = store
                    .apply_deviation_memberships(
                        summary.id,
                        &cache.unrecorded(&wanted),
                        &diff.added,
                        &diff.removed,
                    )
                    .await?;
                report_record(
                    observer,
                    EntityKind::Deviation,
                    summary.id,
                    &summary.title,
                    &recorded,
                    folder_title,
                );
                cache.evict(&recorded.membership);
                outcome.moved.push(summary.id);
            }
            cache.mark(summary.folders.iter().map(|f| &f.id));
            continue;
        }

        if summary.id <= frontier {
            tracing::debug!(
                "Deviation {} is below frontier {} but missing locally",
                summary.id,
                frontier
            );
        }

        let deviation = match fetch_detail(remote, summary).await {
            Ok(deviation) => deviation,
            Err(e) if e.aborts_pass() => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping deviation {}: {}", summary.id, e);
                outcome.skipped.push(summary.id);
                continue;
            }
        };

        let diff = MembershipDiff::compute(&summary.folder_ids(), &HashSet::new());
        let wanted: Vec<&GalleryFolder> = summary.folders.iter().collect();
        let recorded = store
            .record_deviation(&deviation, &cache.unrecorded(&wanted), &diff.added)
            .await?;
        report_record(
            observer,
            EntityKind::Deviation,
            deviation.id,
            &deviation.title,
            &recorded,
            folder_title,
        );
        cache.mark(summary.folders.iter().map(|f| &f.id));
        if recorded.item_created {
            outcome.created.push(deviation);
        }
    }

    for item in set_difference(&local, &id_set(&listing)) {
        let change = store.delete_deviation(item).await?;
        report_change(observer, EntityKind::Deviation, item, &change);
        cache.evict(&change);
        outcome.deleted.push(item);
    }

    tracing::info!(
        "Gallery: {} listed, {} new, {} moved, {} deleted, {} skipped (frontier {})",
        outcome.listed,
        outcome.created.len(),
        outcome.moved.len(),
        outcome.deleted.len(),
        outcome.skipped.len(),
        outcome.frontier
    );

    Ok(outcome)
}

async fn fetch_detail<R: GallerySource>(
    remote: &R,
    summary: &DeviationSummary,
) -> SyncResult<Deviation> {
    let deviation = remote.fetch_deviation(summary).await?;
    if !same_item(&deviation, summary) {
        return Err(SyncError::parse(
            format!("deviation {}", summary.id),
            format!("remote returned deviation {}", deviation.id),
        ));
    }
    Ok(deviation)
}
