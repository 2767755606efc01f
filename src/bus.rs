//! Data synchronization bus.
//!
//! Applies a store command on behalf of the window that issued it and, for
//! successful mutations, broadcasts one sync event to every other
//! registered window so their in-memory views stay consistent with disk
//! state. Reads and persist flushes never broadcast; failures surface only
//! to the requester.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::commands::{
    Collection, HistoryAction, PlaylistsAction, ProfilesAction, SettingsAction, StoreCommand,
    SyncEvent, SyncEventKind, WireRequest,
};
use crate::error::{DispatchError, StoreError};
use crate::registry::{WindowId, WindowRegistry};
use crate::store::StoreAdapter;

/// What the requesting window gets back from a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResponse {
    /// Result of a find.
    Documents(Vec<Value>),
    /// The created document, id included.
    Document(Value),
    /// Null acknowledgment for a completed mutation or flush.
    Ack,
}

pub struct SyncBus {
    store: Arc<dyn StoreAdapter>,
    registry: Arc<Mutex<WindowRegistry>>,
}

impl SyncBus {
    pub fn new(store: Arc<dyn StoreAdapter>, registry: Arc<Mutex<WindowRegistry>>) -> Self {
        Self { store, registry }
    }

    /// Parse and dispatch an untyped renderer envelope.
    pub fn dispatch_wire(
        &self,
        origin: WindowId,
        request: WireRequest,
    ) -> Result<DispatchResponse, DispatchError> {
        let command = StoreCommand::from_wire(request)?;
        self.dispatch(origin, command)
    }

    /// Apply one store command. Dispatch calls are independent of each
    /// other; the store's per-document replacement is the only ordering
    /// guarantee between concurrent mutations. By the time the broadcast
    /// goes out the mutation is already visible to subsequent finds.
    pub fn dispatch(
        &self,
        origin: WindowId,
        command: StoreCommand,
    ) -> Result<DispatchResponse, DispatchError> {
        let collection = command.collection();
        let (response, event) = match command {
            StoreCommand::Settings(action) => self.apply_settings(action)?,
            StoreCommand::History(action) => self.apply_history(action)?,
            StoreCommand::Profiles(action) => self.apply_profiles(action)?,
            StoreCommand::Playlists(action) => self.apply_playlists(action)?,
        };

        if let Some(event) = event {
            tracing::debug!(%collection, kind = ?event.kind, "broadcasting sync event");
            self.registry.lock().broadcast_except(origin, &event);
        }
        Ok(response)
    }

    fn apply_settings(
        &self,
        action: SettingsAction,
    ) -> Result<(DispatchResponse, Option<SyncEvent>), StoreError> {
        match action {
            SettingsAction::Find => {
                let docs = self
                    .store
                    .settings_find()?
                    .into_iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((DispatchResponse::Documents(docs), None))
            }
            SettingsAction::Upsert { id, value } => {
                self.store.settings_upsert(&id, value.clone())?;
                Ok((
                    DispatchResponse::Ack,
                    Some(SyncEvent {
                        collection: Collection::Settings,
                        kind: SyncEventKind::Upsert,
                        data: json!({ "_id": id, "value": value }),
                    }),
                ))
            }
        }
    }

    fn apply_history(
        &self,
        action: HistoryAction,
    ) -> Result<(DispatchResponse, Option<SyncEvent>), StoreError> {
        let event = |kind, data| {
            Some(SyncEvent {
                collection: Collection::History,
                kind,
                data,
            })
        };
        match action {
            HistoryAction::Find => Ok((
                DispatchResponse::Documents(self.store.history_find()?),
                None,
            )),
            HistoryAction::Upsert(doc) => {
                self.store.history_upsert(doc.clone())?;
                Ok((DispatchResponse::Ack, event(SyncEventKind::Upsert, doc)))
            }
            HistoryAction::UpdateWatchProgress {
                video_id,
                watch_progress,
            } => {
                self.store
                    .history_update_watch_progress(&video_id, watch_progress)?;
                Ok((
                    DispatchResponse::Ack,
                    event(
                        SyncEventKind::UpdateWatchProgress,
                        json!({ "videoId": video_id, "watchProgress": watch_progress }),
                    ),
                ))
            }
            HistoryAction::Delete(video_id) => {
                self.store.history_delete(&video_id)?;
                Ok((
                    DispatchResponse::Ack,
                    event(SyncEventKind::Delete, Value::String(video_id)),
                ))
            }
            HistoryAction::DeleteAll => {
                self.store.history_delete_all()?;
                Ok((
                    DispatchResponse::Ack,
                    event(SyncEventKind::DeleteAll, Value::Null),
                ))
            }
            HistoryAction::Persist => {
                // Flush only: no state delta another window could observe.
                self.store.history_persist()?;
                Ok((DispatchResponse::Ack, None))
            }
        }
    }

    fn apply_profiles(
        &self,
        action: ProfilesAction,
    ) -> Result<(DispatchResponse, Option<SyncEvent>), StoreError> {
        let event = |kind, data| {
            Some(SyncEvent {
                collection: Collection::Profiles,
                kind,
                data,
            })
        };
        match action {
            ProfilesAction::Create(doc) => {
                let created = self.store.profiles_create(doc)?;
                Ok((
                    DispatchResponse::Document(created.clone()),
                    event(SyncEventKind::Create, created),
                ))
            }
            ProfilesAction::Find => Ok((
                DispatchResponse::Documents(self.store.profiles_find()?),
                None,
            )),
            ProfilesAction::Upsert(doc) => {
                self.store.profiles_upsert(doc.clone())?;
                Ok((DispatchResponse::Ack, event(SyncEventKind::Upsert, doc)))
            }
            ProfilesAction::Delete(id) => {
                self.store.profiles_delete(&id)?;
                Ok((
                    DispatchResponse::Ack,
                    event(SyncEventKind::Delete, Value::String(id)),
                ))
            }
            ProfilesAction::Persist => {
                self.store.profiles_persist()?;
                Ok((DispatchResponse::Ack, None))
            }
        }
    }

    fn apply_playlists(
        &self,
        action: PlaylistsAction,
    ) -> Result<(DispatchResponse, Option<SyncEvent>), StoreError> {
        // Sync events are built only for the actions
        // `PlaylistsAction::broadcasts` declares.
        match action {
            PlaylistsAction::Create(doc) => {
                self.store.playlists_create(doc)?;
                Ok((DispatchResponse::Ack, None))
            }
            PlaylistsAction::Find => Ok((
                DispatchResponse::Documents(self.store.playlists_find()?),
                None,
            )),
            PlaylistsAction::UpsertVideo {
                playlist_name,
                video,
            } => {
                self.store
                    .playlists_upsert_video(&playlist_name, video.clone())?;
                Ok((
                    DispatchResponse::Ack,
                    Some(SyncEvent {
                        collection: Collection::Playlists,
                        kind: SyncEventKind::UpsertVideo,
                        data: json!({ "playlistName": playlist_name, "videoData": video }),
                    }),
                ))
            }
            PlaylistsAction::UpsertVideoIds {
                playlist_id,
                video_ids,
            } => {
                self.store
                    .playlists_upsert_video_ids(&playlist_id, &video_ids)?;
                Ok((DispatchResponse::Ack, None))
            }
            PlaylistsAction::Delete(playlist_name) => {
                self.store.playlists_delete(&playlist_name)?;
                Ok((DispatchResponse::Ack, None))
            }
            PlaylistsAction::DeleteVideoId {
                playlist_name,
                video_id,
            } => {
                self.store
                    .playlists_delete_video_id(&playlist_name, &video_id)?;
                Ok((
                    DispatchResponse::Ack,
                    Some(SyncEvent {
                        collection: Collection::Playlists,
                        kind: SyncEventKind::DeleteVideo,
                        data: json!({ "playlistName": playlist_name, "videoId": video_id }),
                    }),
                ))
            }
            PlaylistsAction::DeleteVideoIds {
                playlist_name,
                video_ids,
            } => {
                self.store
                    .playlists_delete_video_ids(&playlist_name, &video_ids)?;
                Ok((DispatchResponse::Ack, None))
            }
            PlaylistsAction::DeleteAllVideos(playlist_name) => {
                self.store.playlists_delete_all_videos(&playlist_name)?;
                Ok((DispatchResponse::Ack, None))
            }
            PlaylistsAction::DeleteMultiple(ids) => {
                self.store.playlists_delete_multiple(&ids)?;
                Ok((DispatchResponse::Ack, None))
            }
            PlaylistsAction::DeleteAll => {
                self.store.playlists_delete_all()?;
                Ok((DispatchResponse::Ack, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{WindowBounds, WindowMessage};
    use crate::store::{FailingStore, JsonFileStore};
    use crossbeam::channel::Receiver;
    use serde_json::json;

    struct Fixture {
        _dir: tempfile::TempDir,
        bus: SyncBus,
        origin: WindowId,
        origin_rx: Receiver<WindowMessage>,
        others: Vec<Receiver<WindowMessage>>,
    }

    fn fixture(window_count: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
        fixture_with_store(dir, store, window_count)
    }

    fn fixture_with_store(
        dir: tempfile::TempDir,
        store: Arc<dyn StoreAdapter>,
        window_count: usize,
    ) -> Fixture {
        let registry = Arc::new(Mutex::new(WindowRegistry::new()));
        let bounds = WindowBounds {
            x: 0,
            y: 0,
            width: 1200,
            height: 800,
        };
        let mut lock = registry.lock();
        let (origin, origin_rx) = lock.register(true, bounds, false);
        let others = (1..window_count)
            .map(|_| lock.register(false, bounds, false).1)
            .collect();
        drop(lock);

        Fixture {
            _dir: dir,
            bus: SyncBus::new(store, registry),
            origin,
            origin_rx,
            others,
        }
    }

    fn sync_events(receiver: &Receiver<WindowMessage>) -> Vec<SyncEvent> {
        receiver
            .try_iter()
            .filter_map(|message| match message {
                WindowMessage::Sync(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_mutation_reaches_every_other_window_exactly_once() {
        let fx = fixture(3);
        fx.bus
            .dispatch(
                fx.origin,
                StoreCommand::Settings(SettingsAction::Upsert {
                    id: "theme".to_string(),
                    value: json!("dark"),
                }),
            )
            .unwrap();

        for other in &fx.others {
            let events = sync_events(other);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind, SyncEventKind::Upsert);
            assert_eq!(events[0].collection, Collection::Settings);
        }
        assert!(sync_events(&fx.origin_rx).is_empty());
    }

    #[test]
    fn test_find_never_broadcasts() {
        let fx = fixture(2);
        let response = fx
            .bus
            .dispatch(fx.origin, StoreCommand::History(HistoryAction::Find))
            .unwrap();
        assert_eq!(response, DispatchResponse::Documents(Vec::new()));
        assert!(sync_events(&fx.others[0]).is_empty());
    }

    #[test]
    fn test_persist_never_broadcasts() {
        let fx = fixture(2);
        let response = fx
            .bus
            .dispatch(fx.origin, StoreCommand::History(HistoryAction::Persist))
            .unwrap();
        assert_eq!(response, DispatchResponse::Ack);
        assert!(sync_events(&fx.others[0]).is_empty());
    }

    #[test]
    fn test_store_failure_surfaces_only_to_requester() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture_with_store(dir, Arc::new(FailingStore), 2);

        let err = fx
            .bus
            .dispatch(
                fx.origin,
                StoreCommand::History(HistoryAction::Upsert(json!({ "videoId": "abc" }))),
            )
            .unwrap_err();

        assert_eq!(err, DispatchError::Store("backend offline".to_string()));
        assert!(sync_events(&fx.others[0]).is_empty());
        assert!(sync_events(&fx.origin_rx).is_empty());
    }

    #[test]
    fn test_malformed_wire_request_does_not_reach_store_or_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let fx = fixture_with_store(dir, Arc::new(FailingStore), 2);

        let err = fx
            .bus
            .dispatch_wire(
                fx.origin,
                WireRequest {
                    collection: Collection::Profiles,
                    action: "truncate".to_string(),
                    data: Value::Null,
                },
            )
            .unwrap_err();

        // A failing store proves the malformed request was rejected before
        // any primitive ran.
        assert!(matches!(err, DispatchError::MalformedRequest { .. }));
        assert!(sync_events(&fx.others[0]).is_empty());
    }

    #[test]
    fn test_profile_create_returns_document_and_broadcasts_it() {
        let fx = fixture(2);
        let response = fx
            .bus
            .dispatch(
                fx.origin,
                StoreCommand::Profiles(ProfilesAction::Create(json!({ "name": "Kids" }))),
            )
            .unwrap();

        let created = match response {
            DispatchResponse::Document(doc) => doc,
            other => panic!("expected created document, got {other:?}"),
        };
        assert!(created["_id"].as_str().is_some());

        let events = sync_events(&fx.others[0]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SyncEventKind::Create);
        assert_eq!(events[0].data, created);
    }

    #[test]
    fn test_playlist_policy_broadcasts_only_wired_actions() {
        let fx = fixture(2);
        fx.bus
            .dispatch(
                fx.origin,
                StoreCommand::Playlists(PlaylistsAction::Create(
                    json!({ "playlistName": "Favorites", "videos": [] }),
                )),
            )
            .unwrap();
        fx.bus
            .dispatch(
                fx.origin,
                StoreCommand::Playlists(PlaylistsAction::DeleteAll),
            )
            .unwrap();
        assert!(sync_events(&fx.others[0]).is_empty());

        fx.bus
            .dispatch(
                fx.origin,
                StoreCommand::Playlists(PlaylistsAction::Create(
                    json!({ "playlistName": "Favorites", "videos": [] }),
                )),
            )
            .unwrap();
        fx.bus
            .dispatch(
                fx.origin,
                StoreCommand::Playlists(PlaylistsAction::UpsertVideo {
                    playlist_name: "Favorites".to_string(),
                    video: json!({ "videoId": "abc" }),
                }),
            )
            .unwrap();
        fx.bus
            .dispatch(
                fx.origin,
                StoreCommand::Playlists(PlaylistsAction::DeleteVideoId {
                    playlist_name: "Favorites".to_string(),
                    video_id: "abc".to_string(),
                }),
            )
            .unwrap();

        let kinds: Vec<SyncEventKind> = sync_events(&fx.others[0])
            .into_iter()
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![SyncEventKind::UpsertVideo, SyncEventKind::DeleteVideo]
        );
    }

    #[test]
    fn test_declared_playlist_policy_matches_wiring() {
        assert!(PlaylistsAction::UpsertVideo {
            playlist_name: "a".to_string(),
            video: Value::Null
        }
        .broadcasts());
        assert!(PlaylistsAction::DeleteVideoId {
            playlist_name: "a".to_string(),
            video_id: "b".to_string()
        }
        .broadcasts());
        assert!(!PlaylistsAction::DeleteAll.broadcasts());
        assert!(!PlaylistsAction::Create(Value::Null).broadcasts());
    }

    #[test]
    fn test_mutation_visible_to_find_before_broadcast_is_read() {
        let fx = fixture(2);
        fx.bus
            .dispatch(
                fx.origin,
                StoreCommand::History(HistoryAction::Upsert(json!({ "videoId": "abc" }))),
            )
            .unwrap();

        let response = fx
            .bus
            .dispatch(fx.origin, StoreCommand::History(HistoryAction::Find))
            .unwrap();
        assert_eq!(
            response,
            DispatchResponse::Documents(vec![json!({ "videoId": "abc" })])
        );
    }
}
