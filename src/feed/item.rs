// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::BufRead;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tracing::warn;
use url::Url;

use crate::error::ParseError;

use super::episode::{Episode, PodcastRef};
use super::reader::{FeedReader, TagKind};

/// Namespace of the RSS content module (`content:encoded`)
pub const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";

/// Read one `<item>` element into an [`Episode`].
///
/// The reader must be positioned on the item's start tag and is left on its
/// end tag. Unknown children are skipped with their whole subtree. Bad URLs,
/// dates and durations are logged and leave the field unset; only broken
/// document structure is an error.
pub fn parse_item<R: BufRead>(
    reader: &mut FeedReader<R>,
    podcast: Arc<PodcastRef>,
) -> Result<Episode, ParseError> {
    reader.require(TagKind::Start, None, "item")?;

    let mut episode = Episode::empty(podcast);

    loop {
        let tag = reader.next_tag()?.clone();
        if tag.is_end() {
            break;
        }

        if tag.name_is("title") {
            episode.title = Some(decode_title(&reader.next_text()?));
        } else if tag.name_is("enclosure") {
            if episode.media_url.is_none() {
                episode.media_url = create_media_url(tag.attribute("url"));
            }
            reader.skip_subtree()?;
        } else if (tag.name_is("date") || tag.name_is("pubDate")) && episode.pub_date.is_none() {
            episode.pub_date = parse_pub_date(&reader.next_text()?);
        } else if tag.name_is("duration") {
            episode.duration = parse_duration(&reader.next_text()?);
        } else if tag.name_is("description") {
            episode.description = Some(reader.next_text()?);
        } else if tag.is_qualified(CONTENT_NAMESPACE, "encoded") {
            episode.long_description = Some(reader.next_text()?);
        } else {
            reader.skip_subtree()?;
        }
    }

    reader.require(TagKind::End, None, "item")?;

    Ok(episode)
}

/// Titles may carry HTML entities on top of the XML escaping
pub(crate) fn decode_title(raw: &str) -> String {
    html_escape::decode_html_entities(raw.trim()).trim().to_string()
}

fn create_media_url(value: Option<&str>) -> Option<Url> {
    let Some(value) = value else {
        warn!("Episode enclosure has no url attribute");
        return None;
    };

    Url::parse(value.trim())
        .inspect_err(|e| warn!(url = value, error = %e, "Episode has invalid media URL"))
        .ok()
}

/// Parse an RSS publication date (`Mon, 01 Jan 2024 12:00:00 GMT`).
///
/// Day and month names are always English. A weekday that does not match
/// the date is ignored, and common zone abbreviations such as `CET` or `BST`
/// are understood next to numeric offsets.
pub fn parse_pub_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S %z"))
        .ok()
        .or_else(|| parse_lenient_date(value))
        .or_else(|| {
            warn!(date = value, "Episode has invalid publication date");
            None
        })
}

/// `[EEE,] dd MMM yyyy HH:mm:ss zone` with the weekday skipped unchecked
fn parse_lenient_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let without_weekday = value.split_once(',').map_or(value, |(_, rest)| rest).trim();
    let (timestamp, zone) = without_weekday.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;

    NaiveDateTime::parse_from_str(timestamp.trim(), "%d %b %Y %H:%M:%S")
        .ok()?
        .and_local_timezone(offset)
        .single()
}

fn zone_offset(zone: &str) -> Option<FixedOffset> {
    if let Some(digits) = zone.strip_prefix('+').or_else(|| zone.strip_prefix('-')) {
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hours: i32 = digits[..2].parse().ok()?;
        let minutes: i32 = digits[2..].parse().ok()?;
        let seconds = hours * 3600 + minutes * 60;
        return FixedOffset::east_opt(if zone.starts_with('-') { -seconds } else { seconds });
    }

    const HOUR: i32 = 3600;
    let seconds = match zone.to_ascii_uppercase().as_str() {
        "GMT" | "UT" | "UTC" | "Z" | "WET" => 0,
        "BST" | "WEST" | "CET" | "MET" => HOUR,
        "CEST" | "MEST" | "EET" => 2 * HOUR,
        "EEST" | "MSK" => 3 * HOUR,
        "IST" => 5 * HOUR + 30 * 60,
        "JST" => 9 * HOUR,
        "AEST" => 10 * HOUR,
        "AEDT" => 11 * HOUR,
        "EDT" => -4 * HOUR,
        "EST" | "CDT" => -5 * HOUR,
        "CST" | "MDT" => -6 * HOUR,
        "MST" | "PDT" => -7 * HOUR,
        "PST" | "AKDT" => -8 * HOUR,
        "AKST" => -9 * HOUR,
        "HST" => -10 * HOUR,
        _ => return None,
    };
    FixedOffset::east_opt(seconds)
}

/// Parse an episode duration into seconds.
///
/// Accepts a plain number of seconds, `MM:SS` or `HH:MM:SS`. Anything else
/// yields -1.
pub fn parse_duration(value: &str) -> i32 {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<i32>() {
        return seconds;
    }

    let parts: Result<Vec<i32>, _> = value.split(':').map(str::parse::<i32>).collect();
    let seconds = match parts.as_deref() {
        Ok([minutes, seconds]) => minutes
            .checked_mul(60)
            .and_then(|m| m.checked_add(*seconds)),
        Ok([hours, minutes, seconds]) => hours
            .checked_mul(3600)
            .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
            .and_then(|hm| hm.checked_add(*seconds)),
        _ => None,
    };

    seconds.unwrap_or_else(|| {
        warn!(duration = value, "Episode has invalid duration");
        -1
    })
}
