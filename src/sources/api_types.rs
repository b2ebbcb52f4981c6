//! Serde-deserializable types matching upstream API responses.
//!
//! These types are separate from domain types to allow tolerant
//! deserialization while keeping domain types focused on application needs.

use serde::Deserialize;
use std::collections::HashMap;

use super::entities::decode_html_entities;
use crate::types::{Author, Contact, Post, Roles, Term, Video, PLACEHOLDER_AVATAR};

/// Number of tags kept per post.
const MAX_TAGS: usize = 3;

/// Avatar size used for post authors.
const AVATAR_SIZE: &str = "96";

// ============================================================================
// CMS (WordPress REST) posts
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiRendered {
  #[serde(default)]
  pub rendered: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiTerm {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthor {
  // Absent when the CMS embeds an error object instead of a user
  pub name: Option<String>,
  #[serde(default)]
  pub avatar_urls: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMedia {
  pub source_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiEmbedded {
  #[serde(default)]
  pub author: Vec<ApiAuthor>,
  #[serde(rename = "wp:featuredmedia", default)]
  pub featured_media: Vec<ApiMedia>,
  /// `[categories, tags, ...]`
  #[serde(rename = "wp:term", default)]
  pub terms: Vec<Vec<ApiTerm>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPost {
  pub id: u64,
  pub title: ApiRendered,
  #[serde(default)]
  pub excerpt: ApiRendered,
  pub date: String,
  #[serde(default)]
  pub link: String,
  #[serde(rename = "_embedded", default)]
  pub embedded: ApiEmbedded,
}

impl ApiPost {
  pub fn into_post(self) -> Post {
    let ApiEmbedded {
      author,
      featured_media,
      terms,
    } = self.embedded;

    let mut terms = terms.into_iter();
    let categories = terms.next().unwrap_or_default();
    let tags = terms.next().unwrap_or_default();

    Post {
      id: self.id,
      title: decode_html_entities(&self.title.rendered),
      excerpt: decode_html_entities(&self.excerpt.rendered),
      date: self.date,
      featured_image_url: featured_media
        .into_iter()
        .next()
        .and_then(|m| m.source_url)
        .filter(|url| !url.is_empty()),
      link: self.link,
      categories: categories.into_iter().map(ApiTerm::into_term).collect(),
      tags: tags
        .into_iter()
        .take(MAX_TAGS)
        .map(ApiTerm::into_term)
        .collect(),
      author: author
        .into_iter()
        .next()
        .and_then(ApiAuthor::into_author)
        .unwrap_or_else(Author::unknown),
    }
  }
}

impl ApiTerm {
  fn into_term(self) -> Term {
    Term {
      id: self.id,
      name: decode_html_entities(&self.name),
    }
  }
}

impl ApiAuthor {
  fn into_author(mut self) -> Option<Author> {
    let name = self.name.filter(|n| !n.trim().is_empty())?;
    let avatar_url = self
      .avatar_urls
      .remove(AVATAR_SIZE)
      .unwrap_or_else(|| PLACEHOLDER_AVATAR.to_string());
    Some(Author {
      name: decode_html_entities(&name),
      avatar_url,
    })
  }
}

// ============================================================================
// Video endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiVideo {
  #[serde(alias = "videoId")]
  pub video_id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default, alias = "thumbnailUrl")]
  pub thumbnail: String,
  #[serde(alias = "publishedAt")]
  pub published_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiPagination {
  #[serde(alias = "nextPageToken")]
  pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiVideosResponse {
  #[serde(default)]
  pub videos: Option<Vec<ApiVideo>>,
  #[serde(default)]
  pub pagination: Option<ApiPagination>,
}

impl ApiVideo {
  pub fn into_video(self) -> Video {
    Video {
      video_id: self.video_id,
      title: decode_html_entities(&self.title),
      description: decode_html_entities(&self.description),
      thumbnail_url: self.thumbnail,
      published_at: self.published_at,
    }
  }
}

// ============================================================================
// Contacts endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiContact {
  pub name: String,
  pub email: String,
  // Object when set, but PHP encodes an empty map as `[]`
  #[serde(default)]
  pub roles: serde_json::Value,
  pub phone: Option<String>,
  pub student_id: Option<String>,
  pub batch: Option<String>,
  pub gender: Option<String>,
  pub blood_type: Option<String>,
  pub birthday: Option<String>,
  pub photo: Option<String>,
  pub linkedin: Option<String>,
  pub facebook: Option<String>,
}

impl ApiContact {
  pub fn into_contact(self) -> Contact {
    let roles = match self.roles {
      serde_json::Value::Object(_) => serde_json::from_value(self.roles).unwrap_or_default(),
      _ => Roles::default(),
    };

    Contact {
      name: decode_html_entities(self.name.trim()),
      email: self.email.trim().to_string(),
      roles,
      phone: non_blank(self.phone),
      student_id: non_blank(self.student_id),
      batch: non_blank(self.batch),
      gender: non_blank(self.gender),
      blood_type: non_blank(self.blood_type),
      birthday: non_blank(self.birthday),
      photo: non_blank(self.photo),
      linkedin: non_blank(self.linkedin),
      facebook: non_blank(self.facebook),
    }
  }
}

fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}
