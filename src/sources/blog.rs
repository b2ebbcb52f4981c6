//! CMS (WordPress REST API) post source. Paginated by page number.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use tracing::debug;
use url::Url;

use super::api_types::ApiPost;
use super::http::{endpoint, HttpClient};
use super::{Cursor, Page, PageSource};
use crate::error::{FetchCause, FetchError, Upstream};
use crate::types::Post;

const TOTAL_HEADER: &str = "X-WP-Total";
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// Blog posts, newest first.
#[derive(Clone)]
pub struct BlogSource {
  http: HttpClient,
  posts_url: Url,
  category: Option<u64>,
}

impl BlogSource {
  /// `base_url` is the site root; the REST prefix is appended.
  pub fn new(http: HttpClient, base_url: &str) -> Result<Self> {
    let base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid blog URL {}: {}", base_url, e))?;
    let posts_url = endpoint(&base, &["wp-json", "wp", "v2", "posts"])?;

    Ok(Self {
      http,
      posts_url,
      category: None,
    })
  }

  /// Restrict the source to one category.
  pub fn with_category(mut self, category: Option<u64>) -> Self {
    self.category = category;
    self
  }

  fn page_number(cursor: Option<&Cursor>) -> Result<u32, FetchError> {
    match cursor {
      None => Ok(1),
      Some(Cursor::Page(n)) if *n >= 1 => Ok(*n),
      Some(other) => Err(FetchError::new(
        Upstream::Blog,
        FetchCause::InvalidCursor(other.to_string()),
      )),
    }
  }

  fn page_url(&self, page: u32, per_page: u32) -> Url {
    let mut url = self.posts_url.clone();
    {
      let mut query = url.query_pairs_mut();
      query
        .append_pair("per_page", &per_page.to_string())
        .append_pair("page", &page.to_string())
        .append_pair("_embed", "1")
        .append_pair("orderby", "date")
        .append_pair("order", "desc");
      if let Some(category) = self.category {
        query.append_pair("categories", &category.to_string());
      }
    }
    url
  }
}

/// Decide the next page from the reported page count.
///
/// Without a page count, an empty page is taken as the end.
fn next_page(page: u32, total_pages: Option<u64>, page_len: usize) -> Option<Cursor> {
  let has_more = match total_pages {
    Some(total) => u64::from(page) < total,
    None => page_len > 0,
  };
  has_more.then(|| Cursor::Page(page + 1))
}

#[async_trait]
impl PageSource for BlogSource {
  type Item = Post;

  fn upstream(&self) -> Upstream {
    Upstream::Blog
  }

  async fn fetch_page(
    &self,
    cursor: Option<&Cursor>,
    page_size: u32,
  ) -> Result<Page<Post>, FetchError> {
    let page = Self::page_number(cursor)?;
    let response = self
      .http
      .get(Upstream::Blog, self.page_url(page, page_size.max(1)))
      .await?;

    let raw: Vec<ApiPost> = response.json(Upstream::Blog)?;
    let items: Vec<Post> = raw.into_iter().map(ApiPost::into_post).collect();
    let next = next_page(page, response.header_u64(TOTAL_PAGES_HEADER), items.len());

    debug!(page, count = items.len(), has_next = next.is_some(), "Fetched blog page");

    Ok(Page {
      items,
      next,
      total_available: response.header_u64(TOTAL_HEADER),
    })
  }
}
