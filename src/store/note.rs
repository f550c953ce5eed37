//! Note and note folder rows.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::SyncResult;
use crate::model::{ItemId, Note, NoteFolder};

use super::FolderUpsert;
use super::membership::{self, NOTES};

fn row_to_note(row: SqliteRow) -> Note {
    Note {
        id: ItemId::from_db(row.get("id")),
        title: row.get("title"),
        sender: row.get("sender"),
        timestamp: row.get("timestamp"),
        body: row.get("body"),
    }
}

/// Insert a note row unless it already exists. Notes are immutable once
/// fetched, so an existing row is left untouched.
pub async fn insert_note(conn: &mut SqliteConnection, note: &Note) -> SyncResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO notes (id, title, sender, timestamp, body)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(note.id.as_db())
    .bind(&note.title)
    .bind(&note.sender)
    .bind(note.timestamp)
    .bind(&note.body)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Record a folder on first sight, or update its title if it was renamed.
pub async fn upsert_note_folder(
    conn: &mut SqliteConnection,
    folder: &NoteFolder,
) -> SyncResult<FolderUpsert> {
    let current = membership::folder_title(conn, NOTES, &folder.id).await?;
    match current {
        None => {
            sqlx::query("INSERT INTO note_folders (id, title) VALUES (?, ?)")
                .bind(folder.id.key())
                .bind(&folder.title)
                .execute(&mut *conn)
                .await?;
            Ok(FolderUpsert::Created)
        }
        Some(previous) if previous != folder.title => {
            sqlx::query("UPDATE note_folders SET title = ? WHERE id = ?")
                .bind(&folder.title)
                .bind(folder.id.key())
                .execute(&mut *conn)
                .await?;
            Ok(FolderUpsert::Renamed { previous })
        }
        Some(_) => Ok(FolderUpsert::Unchanged),
    }
}

/// Make sure the folder row exists without touching an existing title.
pub async fn ensure_note_folder(
    conn: &mut SqliteConnection,
    folder: &NoteFolder,
) -> SyncResult<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO note_folders (id, title) VALUES (?, ?)")
        .bind(folder.id.key())
        .bind(&folder.title)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub async fn get_note(pool: &SqlitePool, id: ItemId) -> SyncResult<Option<Note>> {
    let row = sqlx::query("SELECT id, title, sender, timestamp, body FROM notes WHERE id = ?")
        .bind(id.as_db())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_note))
}

pub async fn get_notes(pool: &SqlitePool) -> SyncResult<Vec<Note>> {
    let rows = sqlx::query("SELECT id, title, sender, timestamp, body FROM notes ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(row_to_note).collect())
}
