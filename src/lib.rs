pub mod error;
pub mod feed;
pub mod http;
pub mod metadata;
pub mod playlist;

// Re-export main types for convenience
pub use error::{FeedError, MetadataError, ParseError};
pub use feed::{
    Episode, FeedReader, Podcast, PodcastRef, fetch_feed, is_url, load_podcast, parse_feed,
    parse_feed_file, parse_item,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use metadata::{EpisodeMetadata, MetadataMap, read_metadata_file, write_metadata_file};
pub use playlist::{
    NoopListener, PlaylistChange, PlaylistListener, PlaylistManager, SharedPlaylistListener,
};
