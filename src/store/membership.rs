//! Item/folder membership access shared by notes and deviations.
//!
//! Every function takes a connection so callers can compose them inside a
//! single transaction. Table names come from a [`Tables`] triple, never
//! from user input.

use std::collections::HashSet;

use sqlx::SqliteConnection;

use crate::error::SyncResult;
use crate::model::{FolderId, ItemId};

/// Names of one isomorphic items/folders/memberships table triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tables {
    pub items: &'static str,
    pub folders: &'static str,
    pub members: &'static str,
    /// Delete an item once its last membership is removed.
    pub prune_orphan_items: bool,
}

pub const NOTES: Tables = Tables {
    items: "notes",
    folders: "note_folders",
    members: "note_folder_members",
    prune_orphan_items: true,
};

/// Deviations live as long as the gallery lists them, folders or not.
pub const DEVIATIONS: Tables = Tables {
    items: "deviations",
    folders: "gallery_folders",
    members: "deviation_folder_members",
    prune_orphan_items: false,
};

/// What applying a membership diff actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    pub added: Vec<FolderId>,
    pub removed: Vec<FolderId>,
    /// Folders deleted because their last membership went away.
    pub folders_collected: Vec<FolderId>,
    /// The item itself was deleted because it has no memberships left.
    pub item_pruned: bool,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.folders_collected.is_empty()
            && !self.item_pruned
    }
}

fn parse_folder_keys(keys: Vec<String>) -> SyncResult<HashSet<FolderId>> {
    keys.iter()
        .map(|key| FolderId::parse(key).map_err(Into::into))
        .collect()
}

pub async fn folder_item_ids(
    conn: &mut SqliteConnection,
    t: Tables,
    folder: &FolderId,
) -> SyncResult<HashSet<ItemId>> {
    let sql = format!("SELECT item_id FROM {} WHERE folder_id = ?", t.members);
    let ids: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(folder.key())
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids.into_iter().map(ItemId::from_db).collect())
}

pub async fn folder_item_count(
    conn: &mut SqliteConnection,
    t: Tables,
    folder: &FolderId,
) -> SyncResult<u64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE folder_id = ?", t.members);
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(folder.key())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count as u64)
}

/// Highest item id recorded in a folder, or [`ItemId::ZERO`].
pub async fn folder_frontier(
    conn: &mut SqliteConnection,
    t: Tables,
    folder: &FolderId,
) -> SyncResult<ItemId> {
    let sql = format!("SELECT MAX(item_id) FROM {} WHERE folder_id = ?", t.members);
    let max: Option<i64> = sqlx::query_scalar(&sql)
        .bind(folder.key())
        .fetch_one(&mut *conn)
        .await?;
    Ok(max.map(ItemId::from_db).unwrap_or(ItemId::ZERO))
}

/// Highest item id recorded at all, or [`ItemId::ZERO`].
pub async fn max_item_id(conn: &mut SqliteConnection, t: Tables) -> SyncResult<ItemId> {
    let sql = format!("SELECT MAX(id) FROM {}", t.items);
    let max: Option<i64> = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
    Ok(max.map(ItemId::from_db).unwrap_or(ItemId::ZERO))
}

pub async fn all_item_ids(conn: &mut SqliteConnection, t: Tables) -> SyncResult<HashSet<ItemId>> {
    let sql = format!("SELECT id FROM {}", t.items);
    let ids: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;
    Ok(ids.into_iter().map(ItemId::from_db).collect())
}

pub async fn item_exists(conn: &mut SqliteConnection, t: Tables, item: ItemId) -> SyncResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", t.items);
    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(item.as_db())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub async fn item_folder_ids(
    conn: &mut SqliteConnection,
    t: Tables,
    item: ItemId,
) -> SyncResult<HashSet<FolderId>> {
    let sql = format!("SELECT folder_id FROM {} WHERE item_id = ?", t.members);
    let keys: Vec<String> = sqlx::query_scalar(&sql)
        .bind(item.as_db())
        .fetch_all(&mut *conn)
        .await?;
    parse_folder_keys(keys)
}

pub async fn folder_ids(conn: &mut SqliteConnection, t: Tables) -> SyncResult<HashSet<FolderId>> {
    let sql = format!("SELECT id FROM {}", t.folders);
    let keys: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;
    parse_folder_keys(keys)
}

pub async fn folder_title(
    conn: &mut SqliteConnection,
    t: Tables,
    folder: &FolderId,
) -> SyncResult<Option<String>> {
    let sql = format!("SELECT title FROM {} WHERE id = ?", t.folders);
    Ok(sqlx::query_scalar(&sql)
        .bind(folder.key())
        .fetch_optional(&mut *conn)
        .await?)
}

/// Insert a membership row. Returns false when the pair already existed.
/// Duplicates are absorbed by the UNIQUE constraint; a missing item or
/// folder row still fails with a foreign key violation.
pub async fn add_membership(
    conn: &mut SqliteConnection,
    t: Tables,
    item: ItemId,
    folder: &FolderId,
) -> SyncResult<bool> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} (item_id, folder_id) VALUES (?, ?)",
        t.members
    );
    let result = sqlx::query(&sql)
        .bind(item.as_db())
        .bind(folder.key())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_membership(
    conn: &mut SqliteConnection,
    t: Tables,
    item: ItemId,
    folder: &FolderId,
) -> SyncResult<bool> {
    let sql = format!("DELETE FROM {} WHERE item_id = ? AND folder_id = ?", t.members);
    let result = sqlx::query(&sql)
        .bind(item.as_db())
        .bind(folder.key())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete the folder row if nothing references it any more.
pub async fn collect_folder_if_empty(
    conn: &mut SqliteConnection,
    t: Tables,
    folder: &FolderId,
) -> SyncResult<bool> {
    let sql = format!(
        "DELETE FROM {folders} WHERE id = ? AND NOT EXISTS (SELECT 1 FROM {members} WHERE folder_id = ?)",
        folders = t.folders,
        members = t.members
    );
    let key = folder.key();
    let result = sqlx::query(&sql)
        .bind(&key)
        .bind(&key)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete the item row if it has no memberships left.
pub async fn prune_item_if_orphaned(
    conn: &mut SqliteConnection,
    t: Tables,
    item: ItemId,
) -> SyncResult<bool> {
    let sql = format!(
        "DELETE FROM {items} WHERE id = ? AND NOT EXISTS (SELECT 1 FROM {members} WHERE item_id = ?)",
        items = t.items,
        members = t.members
    );
    let result = sqlx::query(&sql)
        .bind(item.as_db())
        .bind(item.as_db())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Apply `added` and `removed` memberships for one item.
///
/// Folders left empty by a removal are deleted. For kinds with
/// `prune_orphan_items`, the item is deleted once its last membership goes.
pub async fn apply_memberships(
    conn: &mut SqliteConnection,
    t: Tables,
    item: ItemId,
    added: &[FolderId],
    removed: &[FolderId],
) -> SyncResult<MembershipChange> {
    let mut change = MembershipChange::default();

    for folder in added {
        if add_membership(conn, t, item, folder).await? {
            change.added.push(folder.clone());
        }
    }

    for folder in removed {
        if remove_membership(conn, t, item, folder).await? {
            change.removed.push(folder.clone());
        }
        if collect_folder_if_empty(conn, t, folder).await? {
            change.folders_collected.push(folder.clone());
        }
    }

    if t.prune_orphan_items && !removed.is_empty() {
        change.item_pruned = prune_item_if_orphaned(conn, t, item).await?;
    }

    Ok(change)
}

/// Items that lost their membership when a folder was deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderRemoval {
    pub existed: bool,
    pub members_removed: usize,
    pub items_pruned: Vec<ItemId>,
}

/// Delete a folder, its membership rows, and (for pruning kinds) any items
/// it leaves orphaned.
pub async fn delete_folder(
    conn: &mut SqliteConnection,
    t: Tables,
    folder: &FolderId,
) -> SyncResult<FolderRemoval> {
    let mut members: Vec<ItemId> = folder_item_ids(conn, t, folder).await?.into_iter().collect();
    members.sort();

    let key = folder.key();
    let sql = format!("DELETE FROM {} WHERE folder_id = ?", t.members);
    let removed = sqlx::query(&sql).bind(&key).execute(&mut *conn).await?;

    let sql = format!("DELETE FROM {} WHERE id = ?", t.folders);
    let deleted = sqlx::query(&sql).bind(&key).execute(&mut *conn).await?;

    let mut items_pruned = Vec::new();
    if t.prune_orphan_items {
        for item in members {
            if prune_item_if_orphaned(conn, t, item).await? {
                items_pruned.push(item);
            }
        }
    }

    Ok(FolderRemoval {
        existed: deleted.rows_affected() > 0,
        members_removed: removed.rows_affected() as usize,
        items_pruned,
    })
}

/// Delete an item outright along with its memberships, collecting folders
/// that end up empty.
pub async fn delete_item(
    conn: &mut SqliteConnection,
    t: Tables,
    item: ItemId,
) -> SyncResult<MembershipChange> {
    let mut folders: Vec<FolderId> = item_folder_ids(conn, t, item).await?.into_iter().collect();
    folders.sort();

    let mut change = MembershipChange::default();
    for folder in &folders {
        if remove_membership(conn, t, item, folder).await? {
            change.removed.push(folder.clone());
        }
        if collect_folder_if_empty(conn, t, folder).await? {
            change.folders_collected.push(folder.clone());
        }
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", t.items);
    let result = sqlx::query(&sql).bind(item.as_db()).execute(&mut *conn).await?;
    change.item_pruned = result.rows_affected() > 0;

    Ok(change)
}
