//! In-memory remote for engine tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{SyncError, SyncResult};
use crate::model::{
    Deviation, DeviationSummary, FolderId, GalleryFolder, ItemId, Note, NoteFolder,
};
use crate::remote::{GallerySource, NoteSource};

use super::events::{SyncEvent, SyncObserver};

pub struct NullObserver;

impl SyncObserver for NullObserver {
    fn on_event(&self, _event: SyncEvent) {}
}

pub fn note(id: u64) -> Note {
    Note {
        id: ItemId::new(id),
        title: format!("Note {}", id),
        sender: format!("sender{}", id % 3),
        timestamp: 1_000 + id as i64,
        body: format!("body of {}", id),
    }
}

pub fn folder_id(raw: &str) -> FolderId {
    FolderId::parse(raw).unwrap()
}

pub fn gallery_folder(raw: &str) -> GalleryFolder {
    GalleryFolder {
        id: folder_id(raw),
        title: format!("Gallery {}", raw),
        description: String::new(),
        url: format!("https://example.com/gallery/{}", raw),
    }
}

pub fn deviation(id: u64) -> Deviation {
    Deviation {
        id: ItemId::new(id),
        title: format!("Deviation {}", id),
        url: format!("https://example.com/art/{}", id),
        username: "artist".to_string(),
        timestamp: 5_000 + id as i64,
        description: String::new(),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Transport,
    Parse,
}

impl Failure {
    fn error(self, context: String) -> SyncError {
        match self {
            Failure::Transport => SyncError::transport(context, "injected timeout"),
            Failure::Parse => SyncError::parse(context, "injected missing field"),
        }
    }
}

#[derive(Default)]
struct State {
    folders: Vec<(FolderId, String)>,
    reported_counts: HashMap<FolderId, u64>,
    notes: HashMap<FolderId, BTreeMap<ItemId, Note>>,
    arrivals: Vec<(usize, FolderId, Note)>,
    page_failures: HashMap<(FolderId, usize), Failure>,
    folder_list_failure: Option<Failure>,
    gallery: BTreeMap<ItemId, DeviationSummary>,
    details: HashMap<ItemId, Deviation>,
    gallery_failures: HashMap<usize, Failure>,
    detail_failures: HashMap<ItemId, Failure>,
}

/// Folder-organized remote held in memory, with request counters and
/// injectable failures.
pub struct FakeRemote {
    page_size: usize,
    bulk_page_size: usize,
    state: Mutex<State>,
    listing_calls: AtomicUsize,
    note_fetches: AtomicUsize,
    gallery_calls: AtomicUsize,
    detail_fetches: AtomicUsize,
}

impl FakeRemote {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            bulk_page_size: 4,
            state: Mutex::new(State::default()),
            listing_calls: AtomicUsize::new(0),
            note_fetches: AtomicUsize::new(0),
            gallery_calls: AtomicUsize::new(0),
            detail_fetches: AtomicUsize::new(0),
        }
    }

    pub fn add_folder(&self, raw: &str, title: &str) -> NoteFolder {
        let id = folder_id(raw);
        let mut state = self.state.lock().unwrap();
        state.folders.push((id.clone(), title.to_string()));
        state.notes.entry(id.clone()).or_default();
        NoteFolder {
            id,
            title: title.to_string(),
            remote_count: 0,
        }
    }

    pub fn rename_folder(&self, raw: &str, title: &str) {
        let id = folder_id(raw);
        let mut state = self.state.lock().unwrap();
        for (folder, current) in state.folders.iter_mut() {
            if *folder == id {
                *current = title.to_string();
            }
        }
    }

    pub fn remove_folder(&self, raw: &str) {
        let id = folder_id(raw);
        let mut state = self.state.lock().unwrap();
        state.folders.retain(|(folder, _)| *folder != id);
        state.notes.remove(&id);
    }

    pub fn put_note(&self, raw: &str, id: u64) {
        let mut state = self.state.lock().unwrap();
        state
            .notes
            .entry(folder_id(raw))
            .or_default()
            .insert(ItemId::new(id), note(id));
    }

    pub fn remove_note(&self, raw: &str, id: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(notes) = state.notes.get_mut(&folder_id(raw)) {
            notes.remove(&ItemId::new(id));
        }
    }

    /// Make a note appear in `raw` once `calls` folder listings have been
    /// served.
    pub fn arrive_after(&self, calls: usize, raw: &str, id: u64) {
        let mut state = self.state.lock().unwrap();
        state.arrivals.push((calls, folder_id(raw), note(id)));
    }

    /// Override the count reported by the folder listing.
    pub fn report_count(&self, raw: &str, count: u64) {
        let mut state = self.state.lock().unwrap();
        state.reported_counts.insert(folder_id(raw), count);
    }

    pub fn fail_page(&self, raw: &str, offset: usize, failure: Failure) {
        let mut state = self.state.lock().unwrap();
        state.page_failures.insert((folder_id(raw), offset), failure);
    }

    pub fn fail_folder_list(&self, failure: Failure) {
        self.state.lock().unwrap().folder_list_failure = Some(failure);
    }

    pub fn fail_gallery_page(&self, offset: usize, failure: Failure) {
        let mut state = self.state.lock().unwrap();
        state.gallery_failures.insert(offset, failure);
    }

    pub fn fail_detail(&self, id: u64, failure: Failure) {
        let mut state = self.state.lock().unwrap();
        state.detail_failures.insert(ItemId::new(id), failure);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.page_failures.clear();
        state.folder_list_failure = None;
        state.gallery_failures.clear();
        state.detail_failures.clear();
    }

    pub fn put_deviation(&self, id: u64, folders: &[&str]) {
        let summary = DeviationSummary {
            id: ItemId::new(id),
            title: format!("Deviation {}", id),
            url: format!("https://example.com/art/{}", id),
            folders: folders.iter().map(|raw| gallery_folder(raw)).collect(),
        };
        let mut state = self.state.lock().unwrap();
        state.gallery.insert(summary.id, summary);
        state.details.insert(ItemId::new(id), deviation(id));
    }

    pub fn remove_deviation(&self, id: u64) {
        let mut state = self.state.lock().unwrap();
        state.gallery.remove(&ItemId::new(id));
        state.details.remove(&ItemId::new(id));
    }

    pub fn note_ids(&self, raw: &str) -> HashSet<ItemId> {
        let state = self.state.lock().unwrap();
        state
            .notes
            .get(&folder_id(raw))
            .map(|notes| notes.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn note_fetches(&self) -> usize {
        self.note_fetches.load(Ordering::SeqCst)
    }

    pub fn gallery_calls(&self) -> usize {
        self.gallery_calls.load(Ordering::SeqCst)
    }

    pub fn detail_fetches(&self) -> usize {
        self.detail_fetches.load(Ordering::SeqCst)
    }
}

impl NoteSource for FakeRemote {
    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn list_note_folders(&self) -> SyncResult<Vec<NoteFolder>> {
        let state = self.state.lock().unwrap();
        if let Some(failure) = state.folder_list_failure {
            return Err(failure.error("note folder listing".to_string()));
        }
        Ok(state
            .folders
            .iter()
            .map(|(id, title)| NoteFolder {
                id: id.clone(),
                title: title.clone(),
                remote_count: state.reported_counts.get(id).copied().unwrap_or_else(|| {
                    state.notes.get(id).map(|n| n.len() as u64).unwrap_or(0)
                }),
            })
            .collect())
    }

    async fn list_notes_in_folder(
        &self,
        folder: &FolderId,
        offset: usize,
    ) -> SyncResult<Vec<Note>> {
        let served = self.listing_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.arrivals)
            .into_iter()
            .partition(|(after, _, _)| *after <= served);
        state.arrivals = pending;
        for (_, target, note) in due {
            state.notes.entry(target).or_default().insert(note.id, note);
        }

        if let Some(failure) = state.page_failures.get(&(folder.clone(), offset)) {
            return Err(failure.error(format!("notes in folder '{}' at offset {}", folder, offset)));
        }

        Ok(state
            .notes
            .get(folder)
            .map(|notes| {
                notes
                    .values()
                    .rev()
                    .skip(offset)
                    .take(self.page_size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_note(&self, folder: &FolderId, id: ItemId) -> SyncResult<Note> {
        self.note_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        state
            .notes
            .get(folder)
            .and_then(|notes| notes.get(&id))
            .cloned()
            .ok_or_else(|| SyncError::transport(format!("note {}", id), "HTTP 404 Not Found"))
    }
}

impl GallerySource for FakeRemote {
    fn bulk_page_size(&self) -> usize {
        self.bulk_page_size
    }

    async fn list_gallery(&self, offset: usize) -> SyncResult<Vec<DeviationSummary>> {
        self.gallery_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(failure) = state.gallery_failures.get(&offset) {
            return Err(failure.error(format!("gallery at offset {}", offset)));
        }
        Ok(state
            .gallery
            .values()
            .rev()
            .skip(offset)
            .take(self.bulk_page_size)
            .cloned()
            .collect())
    }

    async fn fetch_deviation(&self, summary: &DeviationSummary) -> SyncResult<Deviation> {
        self.detail_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(failure) = state.detail_failures.get(&summary.id) {
            return Err(failure.error(format!("deviation {}", summary.id)));
        }
        state
            .details
            .get(&summary.id)
            .cloned()
            .ok_or_else(|| SyncError::transport(format!("deviation {}", summary.id), "HTTP 404"))
    }
}
