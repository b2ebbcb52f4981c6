//! Single-collection resource: one source's first page backed by one cache.

use async_trait::async_trait;
use tracing::debug;

use crate::cache::{dedupe_by_key, Cacheable, ResourceCache};
use crate::error::{CacheError, SyncError};
use crate::query::Resource;
use crate::sources::PageSource;

pub struct CollectionResource<S>
where
  S: PageSource,
  S::Item: Cacheable,
{
  source: S,
  cache: ResourceCache<S::Item>,
  page_size: u32,
}

impl<S> CollectionResource<S>
where
  S: PageSource,
  S::Item: Cacheable,
{
  pub fn new(source: S, cache: ResourceCache<S::Item>, page_size: u32) -> Self {
    Self {
      source,
      cache,
      page_size,
    }
  }
}

#[async_trait]
impl<S> Resource for CollectionResource<S>
where
  S: PageSource + 'static,
  S::Item: Cacheable,
{
  type Data = Vec<S::Item>;

  fn name(&self) -> &'static str {
    self.cache.kind().name()
  }

  async fn read_cached(&self) -> Option<Vec<S::Item>> {
    let items = self.cache.read_all().await;
    (!items.is_empty()).then_some(items)
  }

  async fn is_stale(&self) -> bool {
    self.cache.is_stale().await
  }

  async fn fetch_fresh(&self) -> Result<Vec<S::Item>, SyncError> {
    let page = self.source.fetch_page(None, self.page_size).await?;
    debug!(
      upstream = %self.source.upstream(),
      count = page.items.len(),
      total = ?page.total_available,
      "Fetched first page"
    );
    Ok(dedupe_by_key(page.items))
  }

  async fn persist(&self, data: &Vec<S::Item>) -> Result<(), CacheError> {
    self.cache.write_all(data).await
  }
}
