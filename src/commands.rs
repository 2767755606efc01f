//! Store commands and synchronization events.
//!
//! Every legal (collection, action) pair is a variant of a per-collection
//! enum, so internal dispatch is exhaustively matched. Renderer processes
//! still speak an untyped envelope of (collection, action string, JSON
//! payload); parsing that envelope is where malformed requests surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// The named collections this core synchronizes. Fixed set; this is not a
/// general pub/sub surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Settings,
    History,
    Profiles,
    Playlists,
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Collection::Settings => write!(f, "settings"),
            Collection::History => write!(f, "history"),
            Collection::Profiles => write!(f, "profiles"),
            Collection::Playlists => write!(f, "playlists"),
        }
    }
}

/// Actions on the settings collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingsAction {
    Find,
    Upsert { id: String, value: Value },
}

/// Actions on the watch-history collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoryAction {
    Find,
    Upsert(Value),
    UpdateWatchProgress {
        video_id: String,
        watch_progress: f64,
    },
    Delete(String),
    DeleteAll,
    Persist,
}

/// Actions on the profiles collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProfilesAction {
    /// Create returns the stored document (with generated id) to the
    /// requester and broadcasts it to the other windows.
    Create(Value),
    Find,
    Upsert(Value),
    Delete(String),
    Persist,
}

/// Actions on the playlists collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaylistsAction {
    Create(Value),
    Find,
    UpsertVideo {
        playlist_name: String,
        video: Value,
    },
    UpsertVideoIds {
        playlist_id: String,
        video_ids: Vec<String>,
    },
    Delete(String),
    DeleteVideoId {
        playlist_name: String,
        video_id: String,
    },
    DeleteVideoIds {
        playlist_name: String,
        video_ids: Vec<String>,
    },
    DeleteAllVideos(String),
    DeleteMultiple(Vec<String>),
    DeleteAll,
}

impl PlaylistsAction {
    /// Declared cross-window synchronization policy. Only video upsert
    /// and single-video deletion are broadcast today; the remaining
    /// mutations stay unsynchronized until playlists are fully wired into
    /// the app, and the bus builds sync events only for the actions
    /// listed here.
    pub fn broadcasts(&self) -> bool {
        matches!(
            self,
            PlaylistsAction::UpsertVideo { .. } | PlaylistsAction::DeleteVideoId { .. }
        )
    }
}

/// One mutating or reading operation against exactly one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreCommand {
    Settings(SettingsAction),
    History(HistoryAction),
    Profiles(ProfilesAction),
    Playlists(PlaylistsAction),
}

impl StoreCommand {
    pub fn collection(&self) -> Collection {
        match self {
            StoreCommand::Settings(_) => Collection::Settings,
            StoreCommand::History(_) => Collection::History,
            StoreCommand::Profiles(_) => Collection::Profiles,
            StoreCommand::Playlists(_) => Collection::Playlists,
        }
    }
}

/// What a mutation looked like, for the windows that did not issue it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncEventKind {
    Create,
    Upsert,
    Delete,
    DeleteAll,
    UpdateWatchProgress,
    UpsertVideo,
    DeleteVideo,
}

/// Broadcast to every registered window except the originator after a
/// mutating command has committed. Never emitted for a failed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub collection: Collection,
    pub kind: SyncEventKind,
    pub data: Value,
}

/// Untyped request envelope as sent by a renderer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    pub collection: Collection,
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

impl StoreCommand {
    /// Parse a wire envelope into a typed command. An action string the
    /// collection does not support, or a payload missing a required field,
    /// is a malformed request, not a store failure.
    pub fn from_wire(request: WireRequest) -> Result<StoreCommand, DispatchError> {
        let WireRequest {
            collection,
            action,
            data,
        } = request;

        match collection {
            Collection::Settings => match action.as_str() {
                "find" => Ok(StoreCommand::Settings(SettingsAction::Find)),
                "upsert" => Ok(StoreCommand::Settings(SettingsAction::Upsert {
                    id: require_str(collection, &data, "_id")?,
                    value: field(&data, "value"),
                })),
                other => Err(DispatchError::malformed(collection, other)),
            },
            Collection::History => match action.as_str() {
                "find" => Ok(StoreCommand::History(HistoryAction::Find)),
                "upsert" => Ok(StoreCommand::History(HistoryAction::Upsert(data))),
                "update-watch-progress" => {
                    Ok(StoreCommand::History(HistoryAction::UpdateWatchProgress {
                        video_id: require_str(collection, &data, "videoId")?,
                        watch_progress: require_f64(collection, &data, "watchProgress")?,
                    }))
                }
                "delete" => Ok(StoreCommand::History(HistoryAction::Delete(
                    string_payload(collection, data)?,
                ))),
                "delete-all" => Ok(StoreCommand::History(HistoryAction::DeleteAll)),
                "persist" => Ok(StoreCommand::History(HistoryAction::Persist)),
                other => Err(DispatchError::malformed(collection, other)),
            },
            Collection::Profiles => match action.as_str() {
                "create" => Ok(StoreCommand::Profiles(ProfilesAction::Create(data))),
                "find" => Ok(StoreCommand::Profiles(ProfilesAction::Find)),
                "upsert" => Ok(StoreCommand::Profiles(ProfilesAction::Upsert(data))),
                "delete" => Ok(StoreCommand::Profiles(ProfilesAction::Delete(
                    string_payload(collection, data)?,
                ))),
                "persist" => Ok(StoreCommand::Profiles(ProfilesAction::Persist)),
                other => Err(DispatchError::malformed(collection, other)),
            },
            Collection::Playlists => match action.as_str() {
                "create" => Ok(StoreCommand::Playlists(PlaylistsAction::Create(data))),
                "find" => Ok(StoreCommand::Playlists(PlaylistsAction::Find)),
                "upsert-video" => Ok(StoreCommand::Playlists(PlaylistsAction::UpsertVideo {
                    playlist_name: require_str(collection, &data, "playlistName")?,
                    video: field(&data, "videoData"),
                })),
                "upsert-video-ids" => {
                    Ok(StoreCommand::Playlists(PlaylistsAction::UpsertVideoIds {
                        playlist_id: require_str(collection, &data, "_id")?,
                        video_ids: require_str_vec(collection, &data, "videoIds")?,
                    }))
                }
                "delete" => Ok(StoreCommand::Playlists(PlaylistsAction::Delete(
                    string_payload(collection, data)?,
                ))),
                "delete-video-id" => {
                    Ok(StoreCommand::Playlists(PlaylistsAction::DeleteVideoId {
                        playlist_name: require_str(collection, &data, "playlistName")?,
                        video_id: require_str(collection, &data, "videoId")?,
                    }))
                }
                "delete-video-ids" => {
                    Ok(StoreCommand::Playlists(PlaylistsAction::DeleteVideoIds {
                        playlist_name: require_str(collection, &data, "playlistName")?,
                        video_ids: require_str_vec(collection, &data, "videoIds")?,
                    }))
                }
                "delete-all-videos" => Ok(StoreCommand::Playlists(
                    PlaylistsAction::DeleteAllVideos(string_payload(collection, data)?),
                )),
                "delete-multiple" => Ok(StoreCommand::Playlists(PlaylistsAction::DeleteMultiple(
                    string_vec_payload(collection, data)?,
                ))),
                "delete-all" => Ok(StoreCommand::Playlists(PlaylistsAction::DeleteAll)),
                other => Err(DispatchError::malformed(collection, other)),
            },
        }
    }
}

fn field(data: &Value, name: &str) -> Value {
    data.get(name).cloned().unwrap_or(Value::Null)
}

fn require_str(
    collection: Collection,
    data: &Value,
    name: &str,
) -> Result<String, DispatchError> {
    data.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DispatchError::malformed(collection, format!("missing field {name}")))
}

fn require_f64(collection: Collection, data: &Value, name: &str) -> Result<f64, DispatchError> {
    data.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| DispatchError::malformed(collection, format!("missing field {name}")))
}

fn require_str_vec(
    collection: Collection,
    data: &Value,
    name: &str,
) -> Result<Vec<String>, DispatchError> {
    let items = data
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| DispatchError::malformed(collection, format!("missing field {name}")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| DispatchError::malformed(collection, format!("bad field {name}")))
        })
        .collect()
}

fn string_payload(collection: Collection, data: Value) -> Result<String, DispatchError> {
    match data {
        Value::String(value) => Ok(value),
        _ => Err(DispatchError::malformed(collection, "expected string payload")),
    }
}

fn string_vec_payload(collection: Collection, data: Value) -> Result<Vec<String>, DispatchError> {
    match data {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(value) => Ok(value),
                _ => Err(DispatchError::malformed(collection, "expected string array")),
            })
            .collect(),
        _ => Err(DispatchError::malformed(collection, "expected string array")),
    }
}
