//! Video platform source. Paginated by opaque continuation token.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::api_types::{ApiVideo, ApiVideosResponse};
use super::http::{endpoint, HttpClient};
use super::{Cursor, Page, PageSource};
use crate::auth::SessionSignal;
use crate::error::{FetchCause, FetchError, Upstream};
use crate::types::Video;

/// Channel videos, newest first.
///
/// The session token is attached when present but is not required.
#[derive(Clone)]
pub struct VideoSource {
  http: HttpClient,
  videos_url: Url,
  session: Arc<dyn SessionSignal>,
}

impl VideoSource {
  pub fn new(http: HttpClient, backend_url: &str, session: Arc<dyn SessionSignal>) -> Result<Self> {
    let base =
      Url::parse(backend_url).map_err(|e| eyre!("Invalid backend URL {}: {}", backend_url, e))?;
    let videos_url = endpoint(&base, &["api", "youtube.php"])?;

    Ok(Self {
      http,
      videos_url,
      session,
    })
  }

  fn page_url(&self, token: Option<&str>) -> Url {
    let mut url = self.videos_url.clone();
    {
      let mut query = url.query_pairs_mut();
      if let Some(token) = token {
        query.append_pair("pageToken", token);
      }
      if let Some(session) = self.session.token() {
        query.append_pair("token", &session);
      }
    }
    // Avoid a dangling `?` when no parameter was added
    if url.query() == Some("") {
      url.set_query(None);
    }
    url
  }
}

#[async_trait]
impl PageSource for VideoSource {
  type Item = Video;

  fn upstream(&self) -> Upstream {
    Upstream::Video
  }

  // The page size is decided by the platform.
  async fn fetch_page(
    &self,
    cursor: Option<&Cursor>,
    _page_size: u32,
  ) -> Result<Page<Video>, FetchError> {
    let token = match cursor {
      None => None,
      Some(Cursor::Token(t)) => Some(t.as_str()),
      Some(other) => {
        return Err(FetchError::new(
          Upstream::Video,
          FetchCause::InvalidCursor(other.to_string()),
        ))
      }
    };

    let response = self.http.get(Upstream::Video, self.page_url(token)).await?;
    let raw: ApiVideosResponse = response.json(Upstream::Video)?;

    let items: Vec<Video> = raw
      .videos
      .unwrap_or_default()
      .into_iter()
      .map(ApiVideo::into_video)
      .collect();
    let next = raw
      .pagination
      .and_then(|p| p.next_page_token)
      .filter(|t| !t.is_empty())
      .map(Cursor::Token);

    debug!(count = items.len(), has_next = next.is_some(), "Fetched video page");

    Ok(Page {
      items,
      next,
      total_available: None,
    })
  }
}
