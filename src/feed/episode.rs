// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use url::Url;

/// Back reference from an episode to the podcast it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastRef {
    pub name: Option<String>,
    /// Unknown for episodes restored from old metadata records
    pub feed_url: Option<Url>,
}

impl PodcastRef {
    pub fn new(name: Option<String>, feed_url: Option<Url>) -> Arc<Self> {
        Arc::new(Self { name, feed_url })
    }
}

/// A single item of a podcast feed.
///
/// Episodes are identified by their media URL alone: two episodes with the
/// same media URL are equal and hash the same, whatever their other fields.
#[derive(Debug, Clone)]
pub struct Episode {
    pub(crate) podcast: Arc<PodcastRef>,
    pub(crate) title: Option<String>,
    pub(crate) media_url: Option<Url>,
    pub(crate) pub_date: Option<DateTime<FixedOffset>>,
    pub(crate) duration: i32,
    pub(crate) description: Option<String>,
    pub(crate) long_description: Option<String>,
}

impl Episode {
    /// Create an episode by hand, e.g. when restoring it from metadata
    pub fn new(
        podcast: Arc<PodcastRef>,
        title: Option<String>,
        media_url: Option<Url>,
        pub_date: Option<DateTime<FixedOffset>>,
        description: Option<String>,
    ) -> Self {
        Self {
            podcast,
            title,
            media_url,
            pub_date,
            duration: -1,
            description,
            long_description: None,
        }
    }

    /// An episode with nothing but its podcast set
    pub(crate) fn empty(podcast: Arc<PodcastRef>) -> Self {
        Self::new(podcast, None, None, None, None)
    }

    pub fn with_duration(mut self, seconds: i32) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_long_description(mut self, content: impl Into<String>) -> Self {
        self.long_description = Some(content.into());
        self
    }

    pub fn podcast(&self) -> &Arc<PodcastRef> {
        &self.podcast
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn media_url(&self) -> Option<&Url> {
        self.media_url.as_ref()
    }

    pub fn pub_date(&self) -> Option<DateTime<FixedOffset>> {
        self.pub_date
    }

    /// Duration in seconds, -1 if the feed did not give a usable one
    pub fn duration(&self) -> i32 {
        self.duration
    }

    /// Duration rendered as `M:SS` or `H:MM:SS`, if known
    pub fn duration_string(&self) -> Option<String> {
        format_duration(self.duration)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Content of the `content:encoded` element, if any
    pub fn long_description(&self) -> Option<&str> {
        self.long_description.as_deref()
    }

    fn identity(&self) -> Option<&str> {
        self.media_url.as_ref().map(Url::as_str)
    }
}

impl PartialEq for Episode {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Episode {}

impl Hash for Episode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for Episode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Newest first. Note that this is not consistent with `Eq`, which only
/// looks at the media URL.
impl Ord for Episode {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_by_pub_date(self, other)
    }
}

/// Order two episodes by publication date, newest first.
///
/// An episode without a date sorts before one that has a date, two undated
/// episodes compare equal.
pub fn compare_by_pub_date(a: &Episode, b: &Episode) -> Ordering {
    match (a.pub_date, b.pub_date) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(&a),
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title().unwrap_or("Untitled Episode"))
    }
}

/// Render a duration in seconds, `None` for unknown or zero durations
pub fn format_duration(seconds: i32) -> Option<String> {
    if seconds <= 0 {
        return None;
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    Some(if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    })
}
