// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::io::BufRead;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::error::FeedError;

use super::episode::{Episode, PodcastRef};
use super::item::{decode_title, parse_item};
use super::reader::{FeedReader, Tag, TagKind};

const ITUNES_NAMESPACE: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

/// Represents a parsed podcast feed
#[derive(Debug, Clone)]
pub struct Podcast {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<Url>,
    pub image_url: Option<Url>,
    pub feed_url: Url,
    pub episodes: Vec<Episode>,
}

impl Podcast {
    /// Episodes in natural order, newest first
    pub fn sorted_episodes(&self) -> Vec<Episode> {
        let mut episodes = self.episodes.clone();
        episodes.sort();
        episodes
    }

    pub fn podcast_ref(&self) -> Arc<PodcastRef> {
        PodcastRef::new(self.title.clone(), Some(self.feed_url.clone()))
    }
}

impl fmt::Display for Podcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title.as_deref().unwrap_or("Unnamed podcast"))
    }
}

/// Parse RSS feed XML bytes into a Podcast struct
pub fn parse_feed(xml_bytes: &[u8], feed_url: Url) -> Result<Podcast, FeedError> {
    let mut reader = FeedReader::from_bytes(xml_bytes);

    if !reader.advance_to_start("channel")? {
        return Err(FeedError::MissingChannel);
    }

    let mut podcast = Podcast {
        title: None,
        description: None,
        link: None,
        image_url: None,
        feed_url: feed_url.clone(),
        episodes: Vec::new(),
    };

    // Items may come before the channel title, so episodes get their final
    // back reference once the whole channel has been read
    let placeholder = PodcastRef::new(None, Some(feed_url));

    loop {
        let tag = reader.next_tag()?.clone();
        if tag.is_end() {
            break;
        }

        if tag.name_is("item") {
            let episode = parse_item(&mut reader, Arc::clone(&placeholder))?;
            if episode.media_url().is_some() {
                podcast.episodes.push(episode);
            } else {
                debug!(title = ?episode.title(), "Skipping episode without media URL");
            }
        } else if tag.name_is("title") && tag.namespace.is_none() {
            podcast.title = Some(decode_title(&reader.next_text()?));
        } else if tag.name_is("description") && tag.namespace.is_none() {
            podcast.description = Some(reader.next_text()?).filter(|s| !s.trim().is_empty());
        } else if tag.name_is("link") && tag.namespace.is_none() {
            podcast.link = Url::parse(reader.next_text()?.trim()).ok();
        } else if tag.name_is("image") {
            let logo = parse_image(&mut reader, &tag)?;
            podcast.image_url = podcast.image_url.take().or(logo);
        } else {
            reader.skip_subtree()?;
        }
    }

    reader.require(TagKind::End, None, "channel")?;

    let podcast_ref = podcast.podcast_ref();
    for episode in &mut podcast.episodes {
        episode.podcast = Arc::clone(&podcast_ref);
    }

    debug!(
        title = ?podcast.title,
        episodes = podcast.episodes.len(),
        "Parsed podcast feed"
    );

    Ok(podcast)
}

/// Logo from either `<image><url>..</url></image>` or `<itunes:image href=".."/>`
fn parse_image<R: BufRead>(reader: &mut FeedReader<R>, tag: &Tag) -> Result<Option<Url>, FeedError> {
    if tag.namespace.as_deref() == Some(ITUNES_NAMESPACE) {
        let logo = tag.attribute("href").and_then(|href| Url::parse(href).ok());
        reader.skip_subtree()?;
        return Ok(logo);
    }

    if tag.namespace.is_some() {
        reader.skip_subtree()?;
        return Ok(None);
    }

    let mut logo = None;
    loop {
        let child = reader.next_tag()?.clone();
        if child.is_end() {
            break;
        }

        if child.name_is("url") {
            logo = Url::parse(reader.next_text()?.trim()).ok();
        } else {
            reader.skip_subtree()?;
        }
    }

    Ok(logo)
}
