//! Identity & ordering model for mirrored notes, deviations and folders.

mod id;
mod types;

pub use id::{FolderId, IdError, ItemId};
pub use types::{
    Deviation, DeviationSummary, GalleryFolder, Note, NoteFolder, dedup_by_identity, id_set,
    identity_cmp, same_item, sort_for_display,
};
