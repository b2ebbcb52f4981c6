use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{Post, Video};

/// What a feed entry carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum FeedPayload {
  Post(Post),
  Video(Video),
}

/// One entry of the merged feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
  pub payload: FeedPayload,
  /// Publish time in epoch millis; 0 when the upstream date is unparsable
  pub sort_date: i64,
}

impl FeedItem {
  /// Source-qualified identity, unique within one feed.
  pub fn dedupe_key(&self) -> String {
    match &self.payload {
      FeedPayload::Post(post) => format!("post:{}", post.id),
      FeedPayload::Video(video) => format!("video:{}", video.video_id),
    }
  }

  pub fn title(&self) -> &str {
    match &self.payload {
      FeedPayload::Post(post) => &post.title,
      FeedPayload::Video(video) => &video.title,
    }
  }
}

impl From<Post> for FeedItem {
  fn from(post: Post) -> Self {
    let sort_date = parse_timestamp(&post.date).unwrap_or(0);
    Self {
      payload: FeedPayload::Post(post),
      sort_date,
    }
  }
}

impl From<Video> for FeedItem {
  fn from(video: Video) -> Self {
    let sort_date = parse_timestamp(&video.published_at).unwrap_or(0);
    Self {
      payload: FeedPayload::Video(video),
      sort_date,
    }
  }
}

/// Parse an RFC 3339 timestamp, or an offset-less one read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.timestamp_millis());
  }
  NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
    .ok()
    .map(|dt| dt.and_utc().timestamp_millis())
}

/// Sort newest first. Stable: equal dates keep their incoming order.
pub fn sort_newest_first(items: &mut [FeedItem]) {
  items.sort_by(|a, b| b.sort_date.cmp(&a.sort_date));
}
