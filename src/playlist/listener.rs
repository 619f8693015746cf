use std::sync::Arc;

use url::Url;

/// What changed in the playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistChange {
    /// An episode was added at the end of the playlist
    Appended { url: Url, position: usize },

    /// An episode was taken off the playlist; later entries moved up by one
    Removed { url: Url, position: usize },
}

/// Observer for playlist changes.
///
/// Called synchronously on the thread that changed the playlist, after the
/// store's lock has been released, so implementations may query the store.
pub trait PlaylistListener: Send + Sync {
    fn on_playlist_changed(&self, change: &PlaylistChange);
}

/// A shared reference to a playlist listener
pub type SharedPlaylistListener = Arc<dyn PlaylistListener>;

/// A listener that ignores all changes
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl PlaylistListener for NoopListener {
    fn on_playlist_changed(&self, _change: &PlaylistChange) {}
}

impl NoopListener {
    /// Create a new NoopListener wrapped in an Arc
    pub fn shared() -> SharedPlaylistListener {
        Arc::new(Self)
    }
}

/// Listeners are the same if they point to the same object
pub(crate) fn same_listener(a: &SharedPlaylistListener, b: &SharedPlaylistListener) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
