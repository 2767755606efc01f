//! Persistent store boundary.
//!
//! The orchestration core only ever sees `StoreAdapter`: per-collection
//! find/upsert/delete/persist primitives plus the three settings-internal
//! reads it needs before the first window exists. `JsonFileStore` is the
//! default adapter: one JSON file per collection under the platform data
//! directory, write-through with an in-memory cache.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

/// Settings document ids read by the startup configuration resolver.
pub const STARTUP_SETTING_IDS: [&str; 5] = [
    "disableSmoothScrolling",
    "useProxy",
    "proxyProtocol",
    "proxyHostname",
    "proxyPort",
];

/// Settings document id holding the persisted window bounds. Window
/// state, not a user setting, so `settings_find` never returns it.
const BOUNDS_DOC_ID: &str = "bounds";

/// A settings document as seen by renderer processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDoc {
    #[serde(rename = "_id")]
    pub id: String,
    pub value: Value,
}

/// Per-collection persistence primitives. Each method touches exactly one
/// collection; per-document replacement is the only atomicity guarantee
/// (last write wins on concurrent upserts).
pub trait StoreAdapter: Send + Sync {
    // settings
    fn settings_find(&self) -> Result<Vec<SettingsDoc>, StoreError>;
    fn settings_upsert(&self, id: &str, value: Value) -> Result<(), StoreError>;
    /// The fixed documents the startup resolver needs before any window
    /// exists. Missing documents are simply absent from the result.
    fn startup_settings(&self) -> Result<Vec<SettingsDoc>, StoreError>;
    fn window_bounds(&self) -> Result<Option<Value>, StoreError>;
    fn save_window_bounds(&self, value: Value) -> Result<(), StoreError>;

    // history
    fn history_find(&self) -> Result<Vec<Value>, StoreError>;
    fn history_upsert(&self, doc: Value) -> Result<(), StoreError>;
    fn history_update_watch_progress(
        &self,
        video_id: &str,
        watch_progress: f64,
    ) -> Result<(), StoreError>;
    fn history_delete(&self, video_id: &str) -> Result<(), StoreError>;
    fn history_delete_all(&self) -> Result<(), StoreError>;
    fn history_persist(&self) -> Result<(), StoreError>;

    // profiles
    fn profiles_create(&self, profile: Value) -> Result<Value, StoreError>;
    fn profiles_find(&self) -> Result<Vec<Value>, StoreError>;
    fn profiles_upsert(&self, profile: Value) -> Result<(), StoreError>;
    fn profiles_delete(&self, id: &str) -> Result<(), StoreError>;
    fn profiles_persist(&self) -> Result<(), StoreError>;

    // playlists
    fn playlists_create(&self, playlist: Value) -> Result<(), StoreError>;
    fn playlists_find(&self) -> Result<Vec<Value>, StoreError>;
    fn playlists_upsert_video(&self, playlist_name: &str, video: Value)
        -> Result<(), StoreError>;
    fn playlists_upsert_video_ids(
        &self,
        playlist_id: &str,
        video_ids: &[String],
    ) -> Result<(), StoreError>;
    fn playlists_delete(&self, playlist_name: &str) -> Result<(), StoreError>;
    fn playlists_delete_video_id(
        &self,
        playlist_name: &str,
        video_id: &str,
    ) -> Result<(), StoreError>;
    fn playlists_delete_video_ids(
        &self,
        playlist_name: &str,
        video_ids: &[String],
    ) -> Result<(), StoreError>;
    fn playlists_delete_all_videos(&self, playlist_name: &str) -> Result<(), StoreError>;
    fn playlists_delete_multiple(&self, ids: &[String]) -> Result<(), StoreError>;
    fn playlists_delete_all(&self) -> Result<(), StoreError>;
}

/// Get the application's data directory, creating it if needed.
pub fn default_data_directory() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "FreeTube")
        .ok_or_else(|| anyhow!("Failed to determine user data directory"))?;

    let data_dir = project_dirs.data_dir();
    fs::create_dir_all(data_dir)
        .map_err(|e| anyhow!("Failed to create data directory: {}", e))?;

    Ok(data_dir.to_path_buf())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionCache {
    settings: BTreeMap<String, Value>,
    history: Vec<Value>,
    profiles: Vec<Value>,
    playlists: Vec<Value>,
}

/// JSON-file store adapter. Mutations update the in-memory cache and are
/// written through to the collection's file; `persist` re-flushes.
pub struct JsonFileStore {
    data_dir: PathBuf,
    cache: Mutex<CollectionCache>,
}

impl JsonFileStore {
    /// Open the store, loading any collection files already on disk.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let cache = CollectionCache {
            settings: load_collection(&data_dir.join("settings.json"))?.unwrap_or_default(),
            history: load_collection(&data_dir.join("history.json"))?.unwrap_or_default(),
            profiles: load_collection(&data_dir.join("profiles.json"))?.unwrap_or_default(),
            playlists: load_collection(&data_dir.join("playlists.json"))?.unwrap_or_default(),
        };

        Ok(Self {
            data_dir,
            cache: Mutex::new(cache),
        })
    }

    fn flush<T: Serialize>(&self, file_name: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.data_dir.join(file_name), json)?;
        Ok(())
    }
}

fn load_collection<T: for<'de> Deserialize<'de>>(
    path: &Path,
) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

impl StoreAdapter for JsonFileStore {
    fn settings_find(&self) -> Result<Vec<SettingsDoc>, StoreError> {
        let cache = self.cache.lock();
        Ok(cache
            .settings
            .iter()
            .filter(|(id, _)| id.as_str() != BOUNDS_DOC_ID)
            .map(|(id, value)| SettingsDoc {
                id: id.clone(),
                value: value.clone(),
            })
            .collect())
    }

    fn settings_upsert(&self, id: &str, value: Value) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache.settings.insert(id.to_string(), value);
        self.flush("settings.json", &cache.settings)
    }

    fn startup_settings(&self) -> Result<Vec<SettingsDoc>, StoreError> {
        let cache = self.cache.lock();
        Ok(STARTUP_SETTING_IDS
            .iter()
            .filter_map(|id| {
                cache.settings.get(*id).map(|value| SettingsDoc {
                    id: (*id).to_string(),
                    value: value.clone(),
                })
            })
            .collect())
    }

    fn window_bounds(&self) -> Result<Option<Value>, StoreError> {
        Ok(self.cache.lock().settings.get(BOUNDS_DOC_ID).cloned())
    }

    fn save_window_bounds(&self, value: Value) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache.settings.insert(BOUNDS_DOC_ID.to_string(), value);
        self.flush("settings.json", &cache.settings)
    }

    fn history_find(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.cache.lock().history.clone())
    }

    fn history_upsert(&self, doc: Value) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        upsert_by_key(&mut cache.history, "videoId", doc);
        self.flush("history.json", &cache.history)
    }

    fn history_update_watch_progress(
        &self,
        video_id: &str,
        watch_progress: f64,
    ) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        if let Some(doc) = find_by_key_mut(&mut cache.history, "videoId", video_id) {
            if let Some(map) = doc.as_object_mut() {
                map.insert("watchProgress".to_string(), watch_progress.into());
            }
        }
        self.flush("history.json", &cache.history)
    }

    fn history_delete(&self, video_id: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache
            .history
            .retain(|doc| str_field(doc, "videoId") != Some(video_id));
        self.flush("history.json", &cache.history)
    }

    fn history_delete_all(&self) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache.history.clear();
        self.flush("history.json", &cache.history)
    }

    fn history_persist(&self) -> Result<(), StoreError> {
        let cache = self.cache.lock();
        self.flush("history.json", &cache.history)
    }

    fn profiles_create(&self, mut profile: Value) -> Result<Value, StoreError> {
        if let Some(map) = profile.as_object_mut() {
            if !map.contains_key("_id") {
                map.insert("_id".to_string(), Uuid::new_v4().to_string().into());
            }
        }
        let mut cache = self.cache.lock();
        cache.profiles.push(profile.clone());
        self.flush("profiles.json", &cache.profiles)?;
        Ok(profile)
    }

    fn profiles_find(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.cache.lock().profiles.clone())
    }

    fn profiles_upsert(&self, profile: Value) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        upsert_by_key(&mut cache.profiles, "_id", profile);
        self.flush("profiles.json", &cache.profiles)
    }

    fn profiles_delete(&self, id: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache
            .profiles
            .retain(|doc| str_field(doc, "_id") != Some(id));
        self.flush("profiles.json", &cache.profiles)
    }

    fn profiles_persist(&self) -> Result<(), StoreError> {
        let cache = self.cache.lock();
        self.flush("profiles.json", &cache.profiles)
    }

    fn playlists_create(&self, playlist: Value) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache.playlists.push(playlist);
        self.flush("playlists.json", &cache.playlists)
    }

    fn playlists_find(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.cache.lock().playlists.clone())
    }

    fn playlists_upsert_video(
        &self,
        playlist_name: &str,
        video: Value,
    ) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        if let Some(videos) = playlist_videos_mut(&mut cache.playlists, playlist_name) {
            upsert_by_key(videos, "videoId", video);
        }
        self.flush("playlists.json", &cache.playlists)
    }

    fn playlists_upsert_video_ids(
        &self,
        playlist_id: &str,
        video_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        if let Some(doc) = find_by_key_mut(&mut cache.playlists, "_id", playlist_id) {
            if let Some(map) = doc.as_object_mut() {
                let ids = map
                    .entry("videoIds")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Some(ids) = ids.as_array_mut() {
                    for video_id in video_ids {
                        if !ids.iter().any(|id| id.as_str() == Some(video_id)) {
                            ids.push(video_id.clone().into());
                        }
                    }
                }
            }
        }
        self.flush("playlists.json", &cache.playlists)
    }

    fn playlists_delete(&self, playlist_name: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache
            .playlists
            .retain(|doc| str_field(doc, "playlistName") != Some(playlist_name));
        self.flush("playlists.json", &cache.playlists)
    }

    fn playlists_delete_video_id(
        &self,
        playlist_name: &str,
        video_id: &str,
    ) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        if let Some(videos) = playlist_videos_mut(&mut cache.playlists, playlist_name) {
            videos.retain(|video| str_field(video, "videoId") != Some(video_id));
        }
        self.flush("playlists.json", &cache.playlists)
    }

    fn playlists_delete_video_ids(
        &self,
        playlist_name: &str,
        video_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        if let Some(videos) = playlist_videos_mut(&mut cache.playlists, playlist_name) {
            videos.retain(|video| {
                str_field(video, "videoId")
                    .map(|id| !video_ids.iter().any(|candidate| candidate == id))
                    .unwrap_or(true)
            });
        }
        self.flush("playlists.json", &cache.playlists)
    }

    fn playlists_delete_all_videos(&self, playlist_name: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        if let Some(videos) = playlist_videos_mut(&mut cache.playlists, playlist_name) {
            videos.clear();
        }
        self.flush("playlists.json", &cache.playlists)
    }

    fn playlists_delete_multiple(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache.playlists.retain(|doc| {
            str_field(doc, "_id")
                .map(|id| !ids.iter().any(|candidate| candidate == id))
                .unwrap_or(true)
        });
        self.flush("playlists.json", &cache.playlists)
    }

    fn playlists_delete_all(&self) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        cache.playlists.clear();
        self.flush("playlists.json", &cache.playlists)
    }
}

fn str_field<'a>(doc: &'a Value, name: &str) -> Option<&'a str> {
    doc.get(name).and_then(Value::as_str)
}

fn find_by_key_mut<'a>(
    docs: &'a mut [Value],
    key: &str,
    wanted: &str,
) -> Option<&'a mut Value> {
    docs.iter_mut().find(|doc| str_field(doc, key) == Some(wanted))
}

fn upsert_by_key(docs: &mut Vec<Value>, key: &str, doc: Value) {
    let position = str_field(&doc, key).map(str::to_string).and_then(|wanted| {
        docs.iter()
            .position(|existing| str_field(existing, key) == Some(wanted.as_str()))
    });
    match position {
        Some(index) => docs[index] = doc,
        None => docs.push(doc),
    }
}

fn playlist_videos_mut<'a>(
    playlists: &'a mut [Value],
    playlist_name: &str,
) -> Option<&'a mut Vec<Value>> {
    let doc = playlists
        .iter_mut()
        .find(|doc| str_field(doc, "playlistName") == Some(playlist_name))?;
    let map = doc.as_object_mut()?;
    map.entry("videos")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
}

/// Store double whose every primitive rejects, for tests proving that a
/// failed command neither broadcasts nor acknowledges.
#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
macro_rules! failing {
    ($name:ident ( $($arg:ty),* ) -> $ret:ty) => {
        fn $name(&self, $(_: $arg),*) -> Result<$ret, StoreError> {
            Err(StoreError::Backend("backend offline".to_string()))
        }
    };
}

#[cfg(test)]
impl StoreAdapter for FailingStore {
    failing!(settings_find() -> Vec<SettingsDoc>);
    failing!(settings_upsert(&str, Value) -> ());
    failing!(startup_settings() -> Vec<SettingsDoc>);
    failing!(window_bounds() -> Option<Value>);
    failing!(save_window_bounds(Value) -> ());
    failing!(history_find() -> Vec<Value>);
    failing!(history_upsert(Value) -> ());
    failing!(history_update_watch_progress(&str, f64) -> ());
    failing!(history_delete(&str) -> ());
    failing!(history_delete_all() -> ());
    failing!(history_persist() -> ());
    failing!(profiles_create(Value) -> Value);
    failing!(profiles_find() -> Vec<Value>);
    failing!(profiles_upsert(Value) -> ());
    failing!(profiles_delete(&str) -> ());
    failing!(profiles_persist() -> ());
    failing!(playlists_create(Value) -> ());
    failing!(playlists_find() -> Vec<Value>);
    failing!(playlists_upsert_video(&str, Value) -> ());
    failing!(playlists_upsert_video_ids(&str, &[String]) -> ());
    failing!(playlists_delete(&str) -> ());
    failing!(playlists_delete_video_id(&str, &str) -> ());
    failing!(playlists_delete_video_ids(&str, &[String]) -> ());
    failing!(playlists_delete_all_videos(&str) -> ());
    failing!(playlists_delete_multiple(&[String]) -> ());
    failing!(playlists_delete_all() -> ());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_settings_upsert_replaces_by_id() {
        let (_dir, store) = open_store();
        store.settings_upsert("theme", json!("dark")).unwrap();
        store.settings_upsert("theme", json!("light")).unwrap();

        let docs = store.settings_find().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].value, json!("light"));
    }

    #[test]
    fn test_bounds_doc_hidden_from_settings_find() {
        let (_dir, store) = open_store();
        store
            .save_window_bounds(json!({ "x": 10, "y": 10, "width": 800, "height": 600 }))
            .unwrap();
        assert!(store.settings_find().unwrap().is_empty());
        assert!(store.window_bounds().unwrap().is_some());
    }

    #[test]
    fn test_startup_settings_returns_only_present_docs() {
        let (_dir, store) = open_store();
        store.settings_upsert("useProxy", json!(true)).unwrap();
        store.settings_upsert("theme", json!("dark")).unwrap();

        let docs = store.startup_settings().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "useProxy");
    }

    #[test]
    fn test_history_watch_progress_partial_update() {
        let (_dir, store) = open_store();
        store
            .history_upsert(json!({ "videoId": "abc", "title": "A", "watchProgress": 0.0 }))
            .unwrap();
        store.history_update_watch_progress("abc", 42.5).unwrap();

        let docs = store.history_find().unwrap();
        assert_eq!(docs[0]["watchProgress"], json!(42.5));
        assert_eq!(docs[0]["title"], json!("A"));
    }

    #[test]
    fn test_profiles_create_generates_id() {
        let (_dir, store) = open_store();
        let created = store
            .profiles_create(json!({ "name": "Kids" }))
            .unwrap();
        assert!(created["_id"].as_str().is_some());
        assert_eq!(store.profiles_find().unwrap(), vec![created]);
    }

    #[test]
    fn test_playlist_video_upsert_and_delete() {
        let (_dir, store) = open_store();
        store
            .playlists_create(json!({ "playlistName": "Favorites", "videos": [] }))
            .unwrap();
        store
            .playlists_upsert_video("Favorites", json!({ "videoId": "abc" }))
            .unwrap();
        store
            .playlists_upsert_video("Favorites", json!({ "videoId": "abc", "title": "A" }))
            .unwrap();

        let playlists = store.playlists_find().unwrap();
        assert_eq!(playlists[0]["videos"].as_array().unwrap().len(), 1);
        assert_eq!(playlists[0]["videos"][0]["title"], json!("A"));

        store.playlists_delete_video_id("Favorites", "abc").unwrap();
        let playlists = store.playlists_find().unwrap();
        assert!(playlists[0]["videos"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_collections_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store.history_upsert(json!({ "videoId": "abc" })).unwrap();
            store.history_persist().unwrap();
        }
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.history_find().unwrap().len(), 1);
    }
}
