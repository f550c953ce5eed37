//! Remote capabilities consumed by the sync engine.
//!
//! This module is split into:
//! - `mod.rs` - The `NoteSource` / `GallerySource` capability traits
//! - `http.rs` - reqwest-backed JSON implementation of both
//! - `retry.rs` - Exponential backoff for transient request failures
//!
//! The engine only ever talks to these traits. Transport and payload
//! parsing live behind them.

pub mod http;
pub mod retry;

use std::collections::HashSet;

use crate::constants::{BULK_PAGE_SIZE, NOTE_PAGE_SIZE};
use crate::error::SyncResult;
use crate::model::{Deviation, DeviationSummary, FolderId, ItemId, Note, NoteFolder};

pub use http::HttpRemote;

/// Folder-organized, newest-first paged access to notes.
pub trait NoteSource {
    /// Page size the remote enforces on folder listings. A page shorter
    /// than this is the last one.
    fn page_size(&self) -> usize {
        NOTE_PAGE_SIZE
    }

    /// All folders, each with the remote's own item count.
    async fn list_note_folders(&self) -> SyncResult<Vec<NoteFolder>>;

    /// Up to `page_size` notes from `folder` starting at `offset`, newest
    /// first.
    async fn list_notes_in_folder(&self, folder: &FolderId, offset: usize)
    -> SyncResult<Vec<Note>>;

    async fn fetch_note(&self, folder: &FolderId, note: ItemId) -> SyncResult<Note>;

    /// The complete id set of a folder. Pages until a short page; never
    /// stops early.
    async fn list_all_note_ids_in_folder(&self, folder: &FolderId) -> SyncResult<HashSet<ItemId>> {
        let page_size = self.page_size().max(1);
        let mut ids = HashSet::new();
        let mut offset = 0;
        loop {
            let page = self.list_notes_in_folder(folder, offset).await?;
            let len = page.len();
            ids.extend(page.into_iter().map(|note| note.id));
            if len < page_size {
                return Ok(ids);
            }
            offset += page_size;
        }
    }
}

/// Global gallery listing plus per-deviation detail.
pub trait GallerySource {
    fn bulk_page_size(&self) -> usize {
        BULK_PAGE_SIZE
    }

    /// Up to `bulk_page_size` gallery entries starting at `offset`, newest
    /// first, each with its complete folder set.
    async fn list_gallery(&self, offset: usize) -> SyncResult<Vec<DeviationSummary>>;

    async fn fetch_deviation(&self, summary: &DeviationSummary) -> SyncResult<Deviation>;
}
