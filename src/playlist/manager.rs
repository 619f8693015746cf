use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::feed::Episode;
use crate::metadata::MetadataMap;

use super::listener::{PlaylistChange, SharedPlaylistListener, same_listener};

#[derive(Default)]
struct State {
    metadata: Option<MetadataMap>,
    /// Number of queued episodes, `None` until first counted
    playlist_size: Option<usize>,
    /// Set when the metadata changed since the last snapshot was taken
    dirty: bool,
}

/// The playlist, kept as positions in the episode metadata.
///
/// Queued episodes carry a playlist position in their metadata record; the
/// positions of all queued episodes always form the range `0..len`. Every
/// operation runs under one lock, so appends and removals from different
/// threads cannot leave gaps or duplicates. Without a metadata map loaded
/// all reads return empty results and all changes are ignored.
#[derive(Default)]
pub struct PlaylistManager {
    state: Mutex<State>,
    listeners: Mutex<Vec<SharedPlaylistListener>>,
}

impl PlaylistManager {
    /// Create a manager with no metadata loaded yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager and load the given metadata right away
    pub fn with_metadata(metadata: MetadataMap) -> Self {
        let manager = Self::new();
        manager.load_metadata(metadata);
        manager
    }

    /// Install a freshly loaded metadata map.
    ///
    /// Replaces any map loaded before. Playlist positions that do not form a
    /// dense range are renumbered in their existing order, which marks the
    /// metadata dirty.
    pub fn load_metadata(&self, mut metadata: MetadataMap) {
        let renumbered = compact_positions(&mut metadata);
        if renumbered {
            warn!("Playlist positions in metadata had gaps or duplicates, renumbered");
        }

        let mut state = self.lock_state();
        state.metadata = Some(metadata);
        state.playlist_size = None;
        state.dirty = renumbered;
    }

    pub fn has_metadata(&self) -> bool {
        self.lock_state().metadata.is_some()
    }

    /// Whether the metadata changed since it was loaded or last taken
    pub fn is_dirty(&self) -> bool {
        self.lock_state().dirty
    }

    /// A copy of the current metadata, if loaded
    pub fn metadata_snapshot(&self) -> Option<MetadataMap> {
        self.lock_state().metadata.clone()
    }

    /// A copy of the metadata if it needs saving; clears the dirty flag
    pub fn take_dirty_snapshot(&self) -> Option<MetadataMap> {
        let mut state = self.lock_state();
        if !state.dirty {
            return None;
        }

        let snapshot = state.metadata.clone()?;
        state.dirty = false;
        Some(snapshot)
    }

    /// The queued episodes in playlist order
    pub fn playlist(&self) -> Vec<Episode> {
        self.lock_state().playlist()
    }

    pub fn playlist_size(&self) -> usize {
        self.lock_state().playlist_size()
    }

    pub fn is_playlist_empty(&self) -> bool {
        self.playlist_size() == 0
    }

    pub fn is_in_playlist(&self, episode: &Episode) -> bool {
        self.playlist_position(episode).is_some()
    }

    /// 0-based playlist position of the episode, `None` if not queued
    pub fn playlist_position(&self, episode: &Episode) -> Option<usize> {
        let url = episode.media_url()?;
        let state = self.lock_state();
        state.metadata.as_ref()?.get(url)?.playlist_position
    }

    /// Add an episode to the end of the playlist.
    ///
    /// Does nothing if the episode has no media URL, no metadata is loaded
    /// or the episode is queued already. Returns whether it was added.
    pub fn append_to_playlist(&self, episode: &Episode) -> bool {
        let change = self.lock_state().append(episode);
        self.finish(change)
    }

    /// Take an episode off the playlist, moving later entries up by one.
    ///
    /// Returns whether the episode was queued.
    pub fn remove_from_playlist(&self, episode: &Episode) -> bool {
        let change = self.lock_state().remove(episode);
        self.finish(change)
    }

    /// Register a listener; registering the same listener twice has no effect
    pub fn add_playlist_listener(&self, listener: SharedPlaylistListener) {
        let mut listeners = self.lock_listeners();
        if !listeners.iter().any(|l| same_listener(l, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove_playlist_listener(&self, listener: &SharedPlaylistListener) {
        self.lock_listeners().retain(|l| !same_listener(l, listener));
    }

    fn finish(&self, change: Option<PlaylistChange>) -> bool {
        let Some(change) = change else {
            return false;
        };

        debug!(?change, "Playlist changed");

        // Listeners run without any lock held so they can call back in
        let listeners = self.lock_listeners().clone();
        for listener in &listeners {
            listener.on_playlist_changed(&change);
        }

        true
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<SharedPlaylistListener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn playlist(&mut self) -> Vec<Episode> {
        let Some(metadata) = &self.metadata else {
            return Vec::new();
        };

        let ordered: BTreeMap<usize, Episode> = metadata
            .iter()
            .filter_map(|(url, meta)| {
                meta.playlist_position
                    .map(|position| (position, meta.marshal_episode(url)))
            })
            .collect();

        self.playlist_size = Some(ordered.len());
        ordered.into_values().collect()
    }

    fn playlist_size(&mut self) -> usize {
        if self.playlist_size.is_none()
            && let Some(metadata) = &self.metadata
        {
            let count = metadata
                .values()
                .filter(|meta| meta.playlist_position.is_some())
                .count();
            self.playlist_size = Some(count);
        }

        self.playlist_size.unwrap_or(0)
    }

    fn append(&mut self, episode: &Episode) -> Option<PlaylistChange> {
        let url = episode.media_url()?.clone();
        if self.metadata.is_none() {
            return None;
        }

        let playlist = self.playlist();
        if playlist.contains(episode) {
            return None;
        }
        let position = playlist.len();

        let record = self.metadata.as_mut()?.entry(url.clone()).or_default();
        record.playlist_position = Some(position);
        record.put_episode_information(episode);

        if let Some(size) = self.playlist_size.as_mut() {
            *size += 1;
        }
        self.dirty = true;

        Some(PlaylistChange::Appended { url, position })
    }

    fn remove(&mut self, episode: &Episode) -> Option<PlaylistChange> {
        let url = episode.media_url()?;
        let metadata = self.metadata.as_mut()?;
        let removed = metadata.get(url)?.playlist_position?;

        for (other_url, other) in metadata.iter_mut() {
            if other_url != url
                && let Some(position) = other.playlist_position.as_mut()
                && *position > removed
            {
                *position -= 1;
            }
        }

        if let Some(record) = metadata.get_mut(url) {
            record.playlist_position = None;
        }

        if let Some(size) = self.playlist_size.as_mut() {
            *size = size.saturating_sub(1);
        }
        self.dirty = true;

        Some(PlaylistChange::Removed {
            url: url.clone(),
            position: removed,
        })
    }
}

/// Renumber queued entries to `0..n` keeping their order, ties broken by
/// URL. Returns whether anything changed.
fn compact_positions(metadata: &mut MetadataMap) -> bool {
    let mut queued: Vec<(usize, url::Url)> = metadata
        .iter()
        .filter_map(|(url, meta)| meta.playlist_position.map(|p| (p, url.clone())))
        .collect();
    queued.sort();

    let mut changed = false;
    for (expected, (position, url)) in queued.into_iter().enumerate() {
        if position != expected
            && let Some(meta) = metadata.get_mut(&url)
        {
            meta.playlist_position = Some(expected);
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use url::Url;

    use crate::feed::PodcastRef;
    use crate::metadata::EpisodeMetadata;
    use crate::playlist::PlaylistListener;

    fn make_episode(name: &str) -> Episode {
        Episode::new(
            PodcastRef::new(
                Some("Test Podcast".to_string()),
                Url::parse("https://example.com/feed.xml").ok(),
            ),
            Some(name.to_string()),
            Url::parse(&format!("https://example.com/{name}.mp3")).ok(),
            None,
            None,
        )
    }

    fn positions(manager: &PlaylistManager) -> Vec<(String, usize)> {
        let metadata = manager.metadata_snapshot().unwrap();
        let mut positions: Vec<_> = metadata
            .iter()
            .filter_map(|(url, meta)| meta.playlist_position.map(|p| (url.to_string(), p)))
            .collect();
        positions.sort_by_key(|(_, p)| *p);
        positions
    }

    #[derive(Default)]
    struct RecordingListener {
        changes: Mutex<Vec<PlaylistChange>>,
    }

    impl PlaylistListener for RecordingListener {
        fn on_playlist_changed(&self, change: &PlaylistChange) {
            self.changes.lock().unwrap().push(change.clone());
        }
    }

    #[test]
    fn append_assigns_consecutive_positions() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let e1 = make_episode("e1");
        let e2 = make_episode("e2");

        assert!(manager.append_to_playlist(&e1));
        assert!(manager.append_to_playlist(&e2));

        assert_eq!(manager.playlist_position(&e1), Some(0));
        assert_eq!(manager.playlist_position(&e2), Some(1));
        assert_eq!(manager.playlist(), vec![e1, e2]);
        assert!(manager.is_dirty());
    }

    #[test]
    fn remove_compacts_positions() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let e1 = make_episode("e1");
        let e2 = make_episode("e2");
        manager.append_to_playlist(&e1);
        manager.append_to_playlist(&e2);

        assert!(manager.remove_from_playlist(&e1));

        assert_eq!(manager.playlist(), vec![e2.clone()]);
        assert_eq!(manager.playlist_position(&e2), Some(0));
        assert!(!manager.is_in_playlist(&e1));
        assert_eq!(manager.playlist_size(), 1);
    }

    #[test]
    fn remove_from_middle_keeps_order() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let episodes: Vec<_> = ["a", "b", "c", "d"].into_iter().map(make_episode).collect();
        for episode in &episodes {
            manager.append_to_playlist(episode);
        }

        manager.remove_from_playlist(&episodes[1]);

        assert_eq!(
            positions(&manager),
            vec![
                ("https://example.com/a.mp3".to_string(), 0),
                ("https://example.com/c.mp3".to_string(), 1),
                ("https://example.com/d.mp3".to_string(), 2),
            ]
        );
    }

    #[test]
    fn append_is_idempotent() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let episode = make_episode("e1");

        assert!(manager.append_to_playlist(&episode));
        assert!(!manager.append_to_playlist(&episode));

        assert_eq!(manager.playlist().len(), 1);
        assert_eq!(manager.playlist_size(), 1);
    }

    #[test]
    fn append_recognizes_episode_by_media_url_only() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let episode = make_episode("e1");
        let renamed = Episode::new(
            PodcastRef::new(None, None),
            Some("Renamed".to_string()),
            episode.media_url().cloned(),
            None,
            None,
        );

        manager.append_to_playlist(&episode);
        assert!(!manager.append_to_playlist(&renamed));
        assert!(manager.is_in_playlist(&renamed));
    }

    #[test]
    fn size_is_counted_from_cold_cache() {
        let mut metadata = MetadataMap::new();
        for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
            metadata.insert(
                Url::parse(&format!("https://example.com/{name}.mp3")).unwrap(),
                EpisodeMetadata {
                    playlist_position: Some(i),
                    ..Default::default()
                },
            );
        }
        metadata.insert(
            Url::parse("https://example.com/downloaded.mp3").unwrap(),
            EpisodeMetadata {
                file_path: Some("downloaded.mp3".into()),
                ..Default::default()
            },
        );

        let manager = PlaylistManager::with_metadata(metadata);

        assert_eq!(manager.playlist_size(), 3);
        assert!(!manager.is_playlist_empty());
        assert!(!manager.is_dirty());
    }

    #[test]
    fn missing_metadata_degrades_to_no_ops() {
        let manager = PlaylistManager::new();
        let episode = make_episode("e1");

        assert!(!manager.has_metadata());
        assert!(manager.playlist().is_empty());
        assert_eq!(manager.playlist_size(), 0);
        assert!(manager.is_playlist_empty());
        assert!(!manager.append_to_playlist(&episode));
        assert!(!manager.remove_from_playlist(&episode));
        assert_eq!(manager.playlist_position(&episode), None);
        assert!(manager.take_dirty_snapshot().is_none());
    }

    #[test]
    fn episode_without_media_url_is_ignored() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let episode = Episode::new(PodcastRef::new(None, None), None, None, None, None);

        assert!(!manager.append_to_playlist(&episode));
        assert!(!manager.is_in_playlist(&episode));
        assert!(manager.is_playlist_empty());
    }

    #[test]
    fn removing_unqueued_episode_changes_nothing() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        manager.append_to_playlist(&make_episode("e1"));
        manager.take_dirty_snapshot();

        assert!(!manager.remove_from_playlist(&make_episode("other")));
        assert!(!manager.is_dirty());
        assert_eq!(manager.playlist_size(), 1);
    }

    #[test]
    fn append_keeps_existing_record_fields() {
        let url = Url::parse("https://example.com/e1.mp3").unwrap();
        let mut metadata = MetadataMap::new();
        metadata.insert(
            url.clone(),
            EpisodeMetadata {
                resume_at: Some(42_000),
                ..Default::default()
            },
        );
        let manager = PlaylistManager::with_metadata(metadata);

        manager.append_to_playlist(&make_episode("e1"));

        let record = manager.metadata_snapshot().unwrap()[&url].clone();
        assert_eq!(record.playlist_position, Some(0));
        assert_eq!(record.resume_at, Some(42_000));
        assert_eq!(record.episode_name.as_deref(), Some("e1"));
    }

    #[test]
    fn load_metadata_renumbers_sparse_positions() {
        let mut metadata = MetadataMap::new();
        for (name, position) in [("a", 4), ("b", 1), ("c", 9)] {
            metadata.insert(
                Url::parse(&format!("https://example.com/{name}.mp3")).unwrap(),
                EpisodeMetadata {
                    playlist_position: Some(position),
                    ..Default::default()
                },
            );
        }

        let manager = PlaylistManager::with_metadata(metadata);

        assert!(manager.is_dirty());
        assert_eq!(
            positions(&manager),
            vec![
                ("https://example.com/b.mp3".to_string(), 0),
                ("https://example.com/a.mp3".to_string(), 1),
                ("https://example.com/c.mp3".to_string(), 2),
            ]
        );
    }

    #[test]
    fn take_dirty_snapshot_clears_flag() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        manager.append_to_playlist(&make_episode("e1"));

        let snapshot = manager.take_dirty_snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(!manager.is_dirty());
        assert!(manager.take_dirty_snapshot().is_none());
    }

    #[test]
    fn listeners_are_notified_of_changes() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let listener = Arc::new(RecordingListener::default());
        manager.add_playlist_listener(listener.clone());
        let episode = make_episode("e1");
        let url = episode.media_url().unwrap().clone();

        manager.append_to_playlist(&episode);
        manager.append_to_playlist(&episode);
        manager.remove_from_playlist(&episode);

        assert_eq!(
            *listener.changes.lock().unwrap(),
            vec![
                PlaylistChange::Appended {
                    url: url.clone(),
                    position: 0
                },
                PlaylistChange::Removed { url, position: 0 },
            ]
        );
    }

    #[test]
    fn listener_registry_has_set_semantics() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let listener = Arc::new(RecordingListener::default());
        let shared: SharedPlaylistListener = listener.clone();

        manager.add_playlist_listener(shared.clone());
        manager.add_playlist_listener(shared.clone());
        manager.append_to_playlist(&make_episode("e1"));
        assert_eq!(listener.changes.lock().unwrap().len(), 1);

        manager.remove_playlist_listener(&shared);
        manager.append_to_playlist(&make_episode("e2"));
        assert_eq!(listener.changes.lock().unwrap().len(), 1);
    }

    #[test]
    fn listeners_may_query_the_manager() {
        struct SizeProbe {
            manager: Arc<PlaylistManager>,
            seen: Mutex<Vec<usize>>,
        }

        impl PlaylistListener for SizeProbe {
            fn on_playlist_changed(&self, _change: &PlaylistChange) {
                self.seen.lock().unwrap().push(self.manager.playlist().len());
            }
        }

        let manager = Arc::new(PlaylistManager::with_metadata(MetadataMap::new()));
        let probe = Arc::new(SizeProbe {
            manager: Arc::clone(&manager),
            seen: Mutex::new(Vec::new()),
        });
        manager.add_playlist_listener(probe.clone());

        manager.append_to_playlist(&make_episode("e1"));
        manager.append_to_playlist(&make_episode("e2"));

        assert_eq!(*probe.seen.lock().unwrap(), vec![1, 2]);
        manager.remove_playlist_listener(&(probe.clone() as SharedPlaylistListener));
    }

    #[test]
    fn concurrent_changes_keep_positions_dense() {
        let manager = PlaylistManager::with_metadata(MetadataMap::new());
        let episodes: Vec<_> = (0..40).map(|i| make_episode(&format!("ep{i}"))).collect();

        std::thread::scope(|scope| {
            for chunk in episodes.chunks(10) {
                let manager = &manager;
                scope.spawn(move || {
                    for episode in chunk {
                        manager.append_to_playlist(episode);
                    }
                    for episode in chunk.iter().step_by(2) {
                        manager.remove_from_playlist(episode);
                    }
                });
            }
        });

        let mut seen: Vec<usize> = positions(&manager).into_iter().map(|(_, p)| p).collect();
        seen.sort();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
        assert_eq!(manager.playlist_size(), 20);
    }
}
