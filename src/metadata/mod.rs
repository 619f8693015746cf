mod file;
mod record;

pub use file::{read_metadata_file, write_metadata_file};
pub use record::{EpisodeMetadata, MetadataMap};
