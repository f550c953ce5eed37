//! Observer hook for every create/delete/rename decision the engine makes.

use tokio::sync::mpsc;

use crate::model::{FolderId, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Note,
    Deviation,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Note => "note",
            EntityKind::Deviation => "deviation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ItemCreated {
        kind: EntityKind,
        item: ItemId,
        title: String,
    },
    ItemDeleted {
        kind: EntityKind,
        item: ItemId,
    },
    FolderCreated {
        kind: EntityKind,
        folder: FolderId,
        title: String,
    },
    FolderRenamed {
        kind: EntityKind,
        folder: FolderId,
        previous: String,
        title: String,
    },
    FolderDeleted {
        kind: EntityKind,
        folder: FolderId,
    },
    MembershipAdded {
        kind: EntityKind,
        item: ItemId,
        folder: FolderId,
    },
    MembershipRemoved {
        kind: EntityKind,
        item: ItemId,
        folder: FolderId,
    },
}

impl std::fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncEvent::ItemCreated { kind, item, title } => {
                write!(f, "new {} {}: {}", kind.as_str(), item, title)
            }
            SyncEvent::ItemDeleted { kind, item } => {
                write!(f, "deleted {} {}", kind.as_str(), item)
            }
            SyncEvent::FolderCreated {
                kind,
                folder,
                title,
            } => write!(f, "new {} folder {} ({})", kind.as_str(), folder, title),
            SyncEvent::FolderRenamed {
                kind,
                folder,
                previous,
                title,
            } => write!(
                f,
                "{} folder {} renamed: {} -> {}",
                kind.as_str(),
                folder,
                previous,
                title
            ),
            SyncEvent::FolderDeleted { kind, folder } => {
                write!(f, "deleted {} folder {}", kind.as_str(), folder)
            }
            SyncEvent::MembershipAdded { kind, item, folder } => {
                write!(f, "{} {} added to folder {}", kind.as_str(), item, folder)
            }
            SyncEvent::MembershipRemoved { kind, item, folder } => {
                write!(f, "{} {} removed from folder {}", kind.as_str(), item, folder)
            }
        }
    }
}

/// Receives every decision as it is committed.
pub trait SyncObserver {
    fn on_event(&self, event: SyncEvent);
}

/// Logs events through tracing. Verbose runs log at info, otherwise debug.
pub struct LogObserver {
    verbose: bool,
}

impl LogObserver {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl SyncObserver for LogObserver {
    fn on_event(&self, event: SyncEvent) {
        if self.verbose {
            tracing::info!("{}", event);
        } else {
            tracing::debug!("{}", event);
        }
    }
}

/// Forward events over a channel. A closed receiver just drops them.
impl SyncObserver for mpsc::UnboundedSender<SyncEvent> {
    fn on_event(&self, event: SyncEvent) {
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_observer_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.on_event(SyncEvent::FolderDeleted {
            kind: EntityKind::Note,
            folder: FolderId::symbolic("unread"),
        });
        assert_eq!(
            rx.recv().await,
            Some(SyncEvent::FolderDeleted {
                kind: EntityKind::Note,
                folder: FolderId::symbolic("unread"),
            })
        );
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.on_event(SyncEvent::ItemDeleted {
            kind: EntityKind::Deviation,
            item: ItemId::new(1),
        });
    }

    #[test]
    fn test_display() {
        let event = SyncEvent::FolderRenamed {
            kind: EntityKind::Note,
            folder: FolderId::Numeric(3),
            previous: "Old".to_string(),
            title: "New".to_string(),
        };
        assert_eq!(event.to_string(), "note folder 3 renamed: Old -> New");
    }
}
