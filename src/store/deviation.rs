//! Deviation and gallery folder rows.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::SyncResult;
use crate::model::{Deviation, GalleryFolder, ItemId};

fn row_to_deviation(row: SqliteRow) -> Deviation {
    Deviation {
        id: ItemId::from_db(row.get("id")),
        title: row.get("title"),
        url: row.get("url"),
        username: row.get("username"),
        timestamp: row.get("timestamp"),
        description: row.get("description"),
    }
}

pub async fn insert_deviation(
    conn: &mut SqliteConnection,
    deviation: &Deviation,
) -> SyncResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO deviations (id, title, url, username, timestamp, description)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(deviation.id.as_db())
    .bind(&deviation.title)
    .bind(&deviation.url)
    .bind(&deviation.username)
    .bind(deviation.timestamp)
    .bind(&deviation.description)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Record a gallery folder on first sight. Returns true if it was new.
pub async fn ensure_gallery_folder(
    conn: &mut SqliteConnection,
    folder: &GalleryFolder,
) -> SyncResult<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO gallery_folders (id, title, description, url) VALUES (?, ?, ?, ?)",
    )
    .bind(folder.id.key())
    .bind(&folder.title)
    .bind(&folder.description)
    .bind(&folder.url)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub async fn get_deviation(pool: &SqlitePool, id: ItemId) -> SyncResult<Option<Deviation>> {
    let row = sqlx::query(
        "SELECT id, title, url, username, timestamp, description FROM deviations WHERE id = ?",
    )
    .bind(id.as_db())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_deviation))
}

pub async fn get_deviations(pool: &SqlitePool) -> SyncResult<Vec<Deviation>> {
    let rows = sqlx::query(
        "SELECT id, title, url, username, timestamp, description FROM deviations ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(row_to_deviation).collect())
}
