//! Feed screen session: cached first page, revalidation and debounced load-more.

use async_trait::async_trait;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use super::engine::{FeedEngine, RoundReport};
use super::item::{FeedItem, FeedPayload};
use crate::cache::ResourceCache;
use crate::debounce::Debouncer;
use crate::error::{CacheError, SyncError, Upstream};
use crate::query::{Activation, DataSource, Query, QueryState, Resource};
use crate::types::{Post, Video};

/// What the feed screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
  pub items: Vec<FeedItem>,
  pub has_more: bool,
  /// Sources whose page arrived in the round that produced this snapshot
  pub refreshed: Vec<Upstream>,
}

impl FeedSnapshot {
  fn of(engine: &FeedEngine, refreshed: Vec<Upstream>) -> Self {
    Self {
      items: engine.items().to_vec(),
      has_more: engine.has_more(),
      refreshed,
    }
  }
}

/// Merged posts + videos feed, cached per source.
pub struct FeedResource {
  engine: Mutex<FeedEngine>,
  posts: ResourceCache<Post>,
  videos: ResourceCache<Video>,
}

impl FeedResource {
  pub fn new(engine: FeedEngine, posts: ResourceCache<Post>, videos: ResourceCache<Video>) -> Self {
    Self {
      engine: Mutex::new(engine),
      posts,
      videos,
    }
  }

  /// Fetch the next page of every source that still has one.
  pub async fn load_more(&self) -> (FeedSnapshot, RoundReport) {
    let mut engine = self.engine.lock().await;
    let report = engine.load_more().await;
    (FeedSnapshot::of(&engine, report.succeeded()), report)
  }
}

#[async_trait]
impl Resource for FeedResource {
  type Data = FeedSnapshot;

  fn name(&self) -> &'static str {
    "feed"
  }

  async fn read_cached(&self) -> Option<FeedSnapshot> {
    let posts = self.posts.read_all().await;
    let videos = self.videos.read_all().await;
    if posts.is_empty() && videos.is_empty() {
      return None;
    }

    let items: Vec<FeedItem> = posts
      .into_iter()
      .map(FeedItem::from)
      .chain(videos.into_iter().map(FeedItem::from))
      .collect();
    let mut engine = self.engine.lock().await;
    engine.seed(items);
    Some(FeedSnapshot::of(&engine, Vec::new()))
  }

  async fn is_stale(&self) -> bool {
    self.posts.is_stale().await || self.videos.is_stale().await
  }

  async fn fetch_fresh(&self) -> Result<FeedSnapshot, SyncError> {
    let mut engine = self.engine.lock().await;
    let report = engine.load_initial().await;
    if report.all_failed() {
      return Err(SyncError::AllSourcesFailed(report.errors()));
    }
    Ok(FeedSnapshot::of(&engine, report.succeeded()))
  }

  /// Writes only the partitions whose source answered, so a failed source
  /// keeps its older cache.
  async fn persist(&self, snapshot: &FeedSnapshot) -> Result<(), CacheError> {
    let mut posts = Vec::new();
    let mut videos = Vec::new();
    for item in &snapshot.items {
      match &item.payload {
        FeedPayload::Post(post) => posts.push(post.clone()),
        FeedPayload::Video(video) => videos.push(video.clone()),
      }
    }

    let mut result = Ok(());
    if snapshot.refreshed.contains(&Upstream::Blog) {
      result = self.posts.write_all(&posts).await;
    }
    if snapshot.refreshed.contains(&Upstream::Video) {
      let written = self.videos.write_all(&videos).await;
      result = result.and(written);
    }
    result
  }

  /// The engine is left untouched by a failed revalidation, so it already
  /// holds everything on screen, including pages added by load-more.
  async fn read_fallback(&self, shown: FeedSnapshot) -> FeedSnapshot {
    let engine = self.engine.lock().await;
    if engine.items().is_empty() {
      return shown;
    }
    FeedSnapshot::of(&engine, Vec::new())
  }
}

/// Outcome of a load-more request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadMore {
  /// A revalidation or load-more was in flight, or nothing is shown yet
  Ignored,
  /// Every source is out of pages
  Exhausted,
  Loaded { net_new: usize },
  /// Every source failed this round; the feed stays as it was
  Failed(SyncError),
}

/// One feed screen's session.
///
/// Tearing down (or dropping) the session cancels a pending debounced
/// load-more.
pub struct FeedSession {
  query: Arc<Query<FeedResource>>,
  debouncer: Debouncer,
}

impl FeedSession {
  pub fn new(resource: FeedResource, debounce: Duration) -> Self {
    Self {
      query: Arc::new(Query::new(resource)),
      debouncer: Debouncer::new(debounce),
    }
  }

  pub fn state(&self) -> QueryState<FeedSnapshot> {
    self.query.state()
  }

  pub fn subscribe(&self) -> watch::Receiver<QueryState<FeedSnapshot>> {
    self.query.subscribe()
  }

  pub async fn activate(&self) -> Activation {
    self.query.activate().await
  }

  /// Pull-to-refresh. Drops a pending load-more, whose cursors are about to
  /// be rewound.
  pub async fn refresh(&self) -> Activation {
    self.debouncer.cancel();
    self.query.refresh().await
  }

  /// Near-end-of-list trigger. Rapid calls coalesce into one load-more.
  pub fn request_load_more(&self) {
    let query = Arc::downgrade(&self.query);
    self.debouncer.call(move || async move {
      load_more_weak(query).await;
    });
  }

  /// Explicit "Load More": runs immediately.
  pub async fn load_more(&self) -> LoadMore {
    load_more(&self.query).await
  }

  pub fn teardown(&self) {
    self.debouncer.cancel();
  }
}

async fn load_more_weak(query: Weak<Query<FeedResource>>) {
  match query.upgrade() {
    Some(query) => {
      load_more(&query).await;
    }
    None => debug!("Feed session gone, dropping load-more"),
  }
}

async fn load_more(query: &Query<FeedResource>) -> LoadMore {
  let Some(_guard) = query.try_begin() else {
    debug!("Feed busy, ignoring load-more");
    return LoadMore::Ignored;
  };

  // Read at fire time, not when the trigger was scheduled
  let state = query.state();
  let Some(previous) = state.data().cloned() else {
    return LoadMore::Ignored;
  };
  if !previous.has_more {
    return LoadMore::Exhausted;
  }
  // Appending pages does not revalidate what was already on screen
  let source = state.source().unwrap_or(DataSource::Network);
  let stale = match state {
    QueryState::Ready { stale, .. } => stale,
    QueryState::RefreshFailed { .. } => true,
    _ => false,
  };

  query.publish(QueryState::LoadingMore {
    previous: previous.clone(),
  });
  let (snapshot, report) = query.resource().load_more().await;

  if report.all_failed() {
    let error = SyncError::AllSourcesFailed(report.errors());
    query.publish(QueryState::RefreshFailed {
      previous: snapshot,
      error: error.clone(),
    });
    return LoadMore::Failed(error);
  }

  query.publish(QueryState::Ready {
    data: snapshot,
    stale,
    source,
  });
  LoadMore::Loaded {
    net_new: report.net_new,
  }
}
