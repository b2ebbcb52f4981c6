use serde::{Deserialize, Serialize};

/// Avatar used when a post has no embedded author.
pub const PLACEHOLDER_AVATAR: &str =
  "https://www.gravatar.com/avatar/00000000000000000000000000000000";

/// Taxonomy term (category or tag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
  pub id: u64,
  pub name: String,
}

/// Post author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub name: String,
  pub avatar_url: String,
}

impl Author {
  /// Sentinel used when the CMS omits the author.
  pub fn unknown() -> Self {
    Self {
      name: "Unknown".to_string(),
      avatar_url: PLACEHOLDER_AVATAR.to_string(),
    }
  }
}

/// Normalized blog post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub id: u64,
  pub title: String,
  pub excerpt: String,
  /// Publish date as sent by the CMS (site-local, no offset)
  pub date: String,
  pub featured_image_url: Option<String>,
  pub link: String,
  pub categories: Vec<Term>,
  pub tags: Vec<Term>,
  pub author: Author,
}

/// Normalized video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
  pub video_id: String,
  pub title: String,
  pub description: String,
  pub thumbnail_url: String,
  /// RFC 3339 publish timestamp
  pub published_at: String,
}

/// Role flags of a directory member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub um_student: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub um_teacher: Option<bool>,
}

/// Directory record. `email` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub roles: Roles,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub student_id: Option<String>,
  #[serde(default)]
  pub batch: Option<String>,
  #[serde(default)]
  pub gender: Option<String>,
  #[serde(default)]
  pub blood_type: Option<String>,
  /// Month/day as `MM/DD`
  #[serde(default)]
  pub birthday: Option<String>,
  #[serde(default)]
  pub photo: Option<String>,
  #[serde(default)]
  pub linkedin: Option<String>,
  #[serde(default)]
  pub facebook: Option<String>,
}
