use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::feed::{Episode, PodcastRef};

/// Per-episode side data, keyed by the episode's media URL
pub type MetadataMap = BTreeMap<Url, EpisodeMetadata>;

/// Everything we remember about an episode independent of its feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    /// 0-based position in the playlist, `None` if not queued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_pub_date: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podcast_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podcast_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    /// Playback position to resume from, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_at: Option<u64>,
}

impl EpisodeMetadata {
    /// Create a record carrying the episode's displayable information
    pub fn from_episode(episode: &Episode) -> Self {
        let mut metadata = Self::default();
        metadata.put_episode_information(episode);
        metadata
    }

    /// Copy what is needed to rebuild the episode without its feed
    pub fn put_episode_information(&mut self, episode: &Episode) {
        self.episode_name = episode.title().map(String::from);
        self.episode_pub_date = episode.pub_date();
        self.episode_description = episode.description().map(String::from);
        self.podcast_name = episode.podcast().name.clone();
        self.podcast_url = episode.podcast().feed_url.clone();
    }

    /// Rebuild the episode stored under `media_url`
    pub fn marshal_episode(&self, media_url: &Url) -> Episode {
        let podcast = PodcastRef::new(self.podcast_name.clone(), self.podcast_url.clone());

        Episode::new(
            podcast,
            self.episode_name.clone(),
            Some(media_url.clone()),
            self.episode_pub_date,
            self.episode_description.clone(),
        )
    }

    pub fn is_downloaded(&self) -> bool {
        self.file_path.is_some()
    }
}
