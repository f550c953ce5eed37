//! Database schema initialization.

use sqlx::SqlitePool;

use crate::error::SyncResult;

const SCHEMA_VERSION: i64 = 1;

/// Create all tables and indexes. Idempotent.
///
/// Notes and deviations get isomorphic table triples: items, folders and an
/// item/folder membership table. Folder ids are TEXT so numeric and symbolic
/// ids share one key space. Membership rows reference both sides without
/// cascades, so a dangling row is rejected rather than silently dropped.
pub async fn init_schema(pool: &SqlitePool) -> SyncResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Notes
        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            sender TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            body TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS note_folders (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS note_folder_members (
            item_id INTEGER NOT NULL REFERENCES notes(id),
            folder_id TEXT NOT NULL REFERENCES note_folders(id),
            UNIQUE (item_id, folder_id)
        );

        CREATE INDEX IF NOT EXISTS idx_note_members_folder ON note_folder_members(folder_id, item_id);
        CREATE INDEX IF NOT EXISTS idx_notes_sender ON notes(sender);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        -- Gallery deviations
        CREATE TABLE IF NOT EXISTS deviations (
            id INTEGER PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            username TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            description TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS gallery_folders (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS deviation_folder_members (
            item_id INTEGER NOT NULL REFERENCES deviations(id),
            folder_id TEXT NOT NULL REFERENCES gallery_folders(id),
            UNIQUE (item_id, folder_id)
        );

        CREATE INDEX IF NOT EXISTS idx_deviation_members_folder ON deviation_folder_members(folder_id, item_id);
        CREATE INDEX IF NOT EXISTS idx_deviations_title ON deviations(title);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}
