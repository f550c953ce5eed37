//! JSON-over-HTTP implementation of the remote sources.

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::retry::{RetryConfig, with_retry};
use super::{GallerySource, NoteSource};
use crate::config::RemoteConfig;
use crate::constants::{MAX_RETRY_DELAY_SECS, RETRY_INITIAL_DELAY_MS, TEXT_WRAP_WIDTH};
use crate::error::{SyncError, SyncResult};
use crate::model::{
    Deviation, DeviationSummary, FolderId, GalleryFolder, ItemId, Note, NoteFolder,
};

/// Identifiers arrive either as JSON numbers or as (possibly composite)
/// strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn item_id(&self) -> SyncResult<ItemId> {
        match self {
            RawId::Number(n) => Ok(ItemId::try_from(*n)?),
            RawId::Text(s) => Ok(ItemId::parse(s)?),
        }
    }

    fn folder_id(&self) -> SyncResult<FolderId> {
        match self {
            RawId::Number(n) => Ok(FolderId::Numeric(*n)),
            RawId::Text(s) => Ok(FolderId::parse(s)?),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Number(i64),
    Text(String),
}

impl RawTimestamp {
    fn seconds(&self, context: &str) -> SyncResult<i64> {
        match self {
            RawTimestamp::Number(n) => Ok(*n),
            RawTimestamp::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| SyncError::parse(context, format!("bad timestamp {:?}", s))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireFolder {
    folderid: RawId,
    title: String,
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct WireNote {
    noteid: RawId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    who: String,
    ts: RawTimestamp,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct WireFolderList {
    folders: Vec<WireFolder>,
}

#[derive(Debug, Deserialize)]
struct WireNotePage {
    notes: Vec<WireNote>,
}

#[derive(Debug, Deserialize)]
struct WireGalleryFolder {
    folderid: RawId,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireGalleryEntry {
    deviationid: RawId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    folders: Vec<WireGalleryFolder>,
}

#[derive(Debug, Deserialize)]
struct WireGalleryPage {
    deviations: Vec<WireGalleryEntry>,
}

#[derive(Debug, Deserialize)]
struct WireDeviation {
    deviationid: RawId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    username: String,
    ts: RawTimestamp,
    #[serde(default)]
    description: String,
}

/// Flatten an HTML fragment to plain text. With `collapse`, all whitespace
/// (newlines included) becomes single spaces.
fn extract_text(html: &str, collapse: bool, context: &str) -> SyncResult<String> {
    // No brackets around links, no markers around emphasis
    let text = html2text::config::with_decorator(html2text::render::TrivialDecorator::new())
        .string_from_read(html.as_bytes(), TEXT_WRAP_WIDTH)
        .map_err(|e| SyncError::parse(context, e))?;
    if collapse {
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    } else {
        Ok(text.trim_end().to_string())
    }
}

fn folder_from_wire(wire: WireFolder, context: &str) -> SyncResult<NoteFolder> {
    Ok(NoteFolder {
        id: wire.folderid.folder_id()?,
        title: extract_text(&wire.title, true, context)?,
        remote_count: wire.count,
    })
}

fn note_from_wire(wire: WireNote, context: &str) -> SyncResult<Note> {
    Ok(Note {
        id: wire.noteid.item_id()?,
        title: extract_text(&wire.title, true, context)?,
        sender: extract_text(&wire.who, true, context)?,
        timestamp: wire.ts.seconds(context)?,
        body: extract_text(&wire.body, false, context)?,
    })
}

fn gallery_folder_from_wire(wire: WireGalleryFolder, context: &str) -> SyncResult<GalleryFolder> {
    Ok(GalleryFolder {
        id: wire.folderid.folder_id()?,
        title: extract_text(&wire.title, true, context)?,
        description: extract_text(&wire.description, false, context)?,
        url: wire.url,
    })
}

fn summary_from_wire(wire: WireGalleryEntry, context: &str) -> SyncResult<DeviationSummary> {
    let folders = wire
        .folders
        .into_iter()
        .map(|f| gallery_folder_from_wire(f, context))
        .collect::<SyncResult<Vec<_>>>()?;
    Ok(DeviationSummary {
        id: wire.deviationid.item_id()?,
        title: extract_text(&wire.title, true, context)?,
        url: wire.url,
        folders,
    })
}

fn deviation_from_wire(wire: WireDeviation, context: &str) -> SyncResult<Deviation> {
    Ok(Deviation {
        id: wire.deviationid.item_id()?,
        title: extract_text(&wire.title, true, context)?,
        url: wire.url,
        username: extract_text(&wire.username, true, context)?,
        timestamp: wire.ts.seconds(context)?,
        description: extract_text(&wire.description, false, context)?,
    })
}

/// Remote account reached over HTTPS with basic auth.
pub struct HttpRemote {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    retry: RetryConfig,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig, username: &str, password: String) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SyncError::transport("building HTTP client", e))?;

        let mut base_url = config.base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            username: username.to_string(),
            password,
            retry: RetryConfig::new(
                config.max_retries,
                Duration::from_millis(RETRY_INITIAL_DELAY_MS),
                Duration::from_secs(MAX_RETRY_DELAY_SECS),
            ),
        })
    }

    /// GET `path` below the base URL and decode the JSON body, retrying
    /// transport failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        offset: Option<usize>,
        context: &str,
    ) -> SyncResult<T> {
        with_retry(&self.retry, || self.get_json_once(path, offset, context)).await
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        path: &str,
        offset: Option<usize>,
        context: &str,
    ) -> SyncResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        tracing::debug!("GET {} ({})", url, context);
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transport(context, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::transport(context, format!("HTTP {}", status)));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                SyncError::parse(context, e)
            } else {
                SyncError::transport(context, e)
            }
        })
    }
}

impl NoteSource for HttpRemote {
    async fn list_note_folders(&self) -> SyncResult<Vec<NoteFolder>> {
        let context = "note folder listing";
        let list: WireFolderList = self.get_json("notes/folders", None, context).await?;
        list.folders
            .into_iter()
            .map(|f| folder_from_wire(f, context))
            .collect()
    }

    async fn list_notes_in_folder(
        &self,
        folder: &FolderId,
        offset: usize,
    ) -> SyncResult<Vec<Note>> {
        let context = format!("notes in folder '{}' at offset {}", folder, offset);
        let path = format!("notes/folders/{}", folder.key());
        let page: WireNotePage = self.get_json(&path, Some(offset), &context).await?;
        page.notes
            .into_iter()
            .map(|n| note_from_wire(n, &context))
            .collect()
    }

    async fn fetch_note(&self, folder: &FolderId, note: ItemId) -> SyncResult<Note> {
        let context = format!("note {} in folder '{}'", note, folder);
        let path = format!("notes/folders/{}/{}", folder.key(), note);
        let wire: WireNote = self.get_json(&path, None, &context).await?;
        note_from_wire(wire, &context)
    }
}

impl GallerySource for HttpRemote {
    async fn list_gallery(&self, offset: usize) -> SyncResult<Vec<DeviationSummary>> {
        let context = format!("gallery at offset {}", offset);
        let path = format!("gallery/{}", self.username);
        let page: WireGalleryPage = self.get_json(&path, Some(offset), &context).await?;
        page.deviations
            .into_iter()
            .map(|d| summary_from_wire(d, &context))
            .collect()
    }

    async fn fetch_deviation(&self, summary: &DeviationSummary) -> SyncResult<Deviation> {
        let context = format!("deviation {}", summary.id);
        let path = format!("deviations/{}", summary.id);
        let wire: WireDeviation = self.get_json(&path, None, &context).await?;
        deviation_from_wire(wire, &context)
    }
}
