//! Upstream source adapters.
//!
//! Every adapter exposes the same page contract and hands back normalized
//! records. A failed or malformed response is always an error, never a
//! partial page.

mod api_types;
mod blog;
mod contacts;
mod entities;
mod http;
mod video;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::{FetchError, Upstream};

pub use blog::BlogSource;
pub use contacts::ContactsSource;
pub use entities::decode_html_entities;
pub use http::HttpClient;
pub use video::VideoSource;

/// Position of the next page, understood only by the adapter that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cursor {
  /// 1-based page number
  Page(u32),
  /// Opaque continuation token
  Token(String),
}

impl fmt::Display for Cursor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Page(n) => write!(f, "page {}", n),
      Self::Token(t) => write!(f, "token {}", t),
    }
  }
}

/// One page of normalized records.
#[derive(Debug, Clone)]
pub struct Page<T> {
  pub items: Vec<T>,
  /// `None` means the source has no more pages
  pub next: Option<Cursor>,
  /// Total records available upstream, when reported
  pub total_available: Option<u64>,
}

impl<T> Page<T> {
  /// A page that is also the last one.
  pub fn last(items: Vec<T>) -> Self {
    Self {
      items,
      next: None,
      total_available: None,
    }
  }

  /// Convert the records, keeping pagination.
  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      items: self.items.into_iter().map(f).collect(),
      next: self.next,
      total_available: self.total_available,
    }
  }
}

/// Uniform "fetch a page" contract implemented by each upstream adapter.
#[async_trait]
pub trait PageSource: Send + Sync {
  type Item: Send;

  fn upstream(&self) -> Upstream;

  /// Fetch the page at `cursor`; `None` requests the first page.
  async fn fetch_page(
    &self,
    cursor: Option<&Cursor>,
    page_size: u32,
  ) -> Result<Page<Self::Item>, FetchError>;
}

#[async_trait]
impl<S: PageSource + ?Sized> PageSource for Arc<S> {
  type Item = S::Item;

  fn upstream(&self) -> Upstream {
    (**self).upstream()
  }

  async fn fetch_page(
    &self,
    cursor: Option<&Cursor>,
    page_size: u32,
  ) -> Result<Page<Self::Item>, FetchError> {
    (**self).fetch_page(cursor, page_size).await
  }
}
