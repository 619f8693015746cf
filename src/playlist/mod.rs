mod listener;
mod manager;

pub use listener::{NoopListener, PlaylistChange, PlaylistListener, SharedPlaylistListener};
pub use manager::PlaylistManager;
