mod episode;
mod fetch;
mod item;
mod podcast;
mod reader;

pub use episode::{Episode, PodcastRef, compare_by_pub_date, format_duration};
pub use fetch::{fetch_feed, fetch_feed_bytes, is_url, load_podcast, parse_feed_file};
pub use item::{CONTENT_NAMESPACE, parse_duration, parse_item, parse_pub_date};
pub use podcast::{Podcast, parse_feed};
pub use reader::{FeedReader, Tag, TagKind};
