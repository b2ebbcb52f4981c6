//! Stale-while-revalidate query state machine.
//!
//! A `Query<R>` owns one cached resource and publishes its `QueryState`
//! through a watch channel, so callers render whatever is current and react
//! to changes without polling.
//!
//! # Example
//!
//! ```ignore
//! let query = Query::new(CollectionResource::new(posts_source, posts_cache, 10));
//! let mut states = query.subscribe();
//!
//! // On mount: cached data first, network only when stale or empty
//! query.activate().await;
//!
//! // Pull-to-refresh
//! query.refresh().await;
//!
//! match &*states.borrow_and_update() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Failed { error } => render_error(error),
//!     state => render_data(state.data()),
//! }
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{CacheError, SyncError};

/// A cached resource a query revalidates.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
  type Data: Clone + Send + Sync + 'static;

  fn name(&self) -> &'static str;

  /// Cached data, or `None` when nothing usable is cached.
  async fn read_cached(&self) -> Option<Self::Data>;

  async fn is_stale(&self) -> bool;

  /// Fetch the first page from upstream.
  async fn fetch_fresh(&self) -> Result<Self::Data, SyncError>;

  async fn persist(&self, data: &Self::Data) -> Result<(), CacheError>;

  /// What to keep on screen after a failed revalidation. Must not disturb
  /// any state behind `shown`.
  async fn read_fallback(&self, shown: Self::Data) -> Self::Data {
    self.read_cached().await.unwrap_or(shown)
  }
}

/// Where the displayed data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
  Network,
  Cache,
  /// Cached data kept on screen after a failed revalidation
  CacheFallback,
}

impl DataSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Network => "network",
      Self::Cache => "cache",
      Self::CacheFallback => "cache-fallback",
    }
  }
}

/// The state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Not activated yet
  Idle,
  /// Nothing to show while the cache or network is consulted
  Loading,
  Ready {
    data: T,
    stale: bool,
    source: DataSource,
  },
  /// Revalidating while `previous` stays on screen
  Refreshing { previous: T },
  /// Fetching further pages while `previous` stays on screen
  LoadingMore { previous: T },
  /// Revalidation failed; `previous` stays on screen with a transient error
  RefreshFailed { previous: T, error: SyncError },
  /// Cold start failed with nothing to show
  Failed { error: SyncError },
}

impl<T> QueryState<T> {
  /// The data on screen in this state, if any.
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Ready { data, .. } => Some(data),
      QueryState::Refreshing { previous }
      | QueryState::LoadingMore { previous }
      | QueryState::RefreshFailed { previous, .. } => Some(previous),
      QueryState::Idle | QueryState::Loading | QueryState::Failed { .. } => None,
    }
  }

  pub fn error(&self) -> Option<&SyncError> {
    match self {
      QueryState::RefreshFailed { error, .. } | QueryState::Failed { error } => Some(error),
      _ => None,
    }
  }

  pub fn source(&self) -> Option<DataSource> {
    match self {
      QueryState::Ready { source, .. } => Some(*source),
      QueryState::RefreshFailed { .. } => Some(DataSource::CacheFallback),
      _ => None,
    }
  }
}

/// What one activation ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
  /// Another revalidation was in flight
  Ignored,
  /// Fresh cache shown, no network call made
  CacheHit,
  /// Fetched from upstream; `persisted` is false when the cache write failed
  Fetched { persisted: bool },
  /// Fetch failed while data was on screen
  FellBack(SyncError),
  /// Fetch failed with nothing to show
  Failed(SyncError),
}

/// Clears the in-flight flag when dropped.
pub(crate) struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

/// Stale-while-revalidate query over one resource.
///
/// At most one revalidation runs at a time; a trigger arriving while one is
/// in flight is ignored rather than queued.
pub struct Query<R: Resource> {
  resource: Arc<R>,
  state: watch::Sender<QueryState<R::Data>>,
  in_flight: AtomicBool,
}

impl<R: Resource> Query<R> {
  pub fn new(resource: R) -> Self {
    Self::from_arc(Arc::new(resource))
  }

  pub fn from_arc(resource: Arc<R>) -> Self {
    let (state, _) = watch::channel(QueryState::Idle);
    Self {
      resource,
      state,
      in_flight: AtomicBool::new(false),
    }
  }

  pub fn resource(&self) -> &R {
    &self.resource
  }

  /// Snapshot of the current state.
  pub fn state(&self) -> QueryState<R::Data> {
    self.state.borrow().clone()
  }

  pub fn data(&self) -> Option<R::Data> {
    self.state.borrow().data().cloned()
  }

  /// Receive every state change from now on.
  pub fn subscribe(&self) -> watch::Receiver<QueryState<R::Data>> {
    self.state.subscribe()
  }

  pub fn is_in_flight(&self) -> bool {
    self.in_flight.load(Ordering::Acquire)
  }

  /// Show cached data, revalidating when it is stale or missing.
  pub async fn activate(&self) -> Activation {
    self.run(false).await
  }

  /// Revalidate regardless of cache freshness.
  pub async fn refresh(&self) -> Activation {
    self.run(true).await
  }

  pub(crate) fn try_begin(&self) -> Option<InFlight<'_>> {
    self
      .in_flight
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| InFlight(&self.in_flight))
  }

  pub(crate) fn publish(&self, state: QueryState<R::Data>) {
    self.state.send_replace(state);
  }

  async fn run(&self, force: bool) -> Activation {
    let resource = self.resource.name();
    let Some(_guard) = self.try_begin() else {
      debug!(resource, "Revalidation already in flight, ignoring trigger");
      return Activation::Ignored;
    };

    let mut shown = self.data();
    if !force {
      if shown.is_none() {
        self.publish(QueryState::Loading);
      }
      if let Some(cached) = self.resource.read_cached().await {
        let stale = self.resource.is_stale().await;
        self.publish(QueryState::Ready {
          data: cached.clone(),
          stale,
          source: DataSource::Cache,
        });
        if !stale {
          debug!(resource, "Cache fresh, skipping network");
          return Activation::CacheHit;
        }
        debug!(resource, "Cache stale, revalidating");
        shown = Some(cached);
      } else {
        debug!(resource, "Cache empty");
      }
    }

    self.publish(match &shown {
      Some(previous) => QueryState::Refreshing {
        previous: previous.clone(),
      },
      None => QueryState::Loading,
    });

    match self.resource.fetch_fresh().await {
      Ok(data) => {
        // Persist before publishing so observers of Ready see a written cache
        let persisted = match self.resource.persist(&data).await {
          Ok(()) => true,
          Err(e) => {
            warn!(resource, error = %e, "Failed to persist fresh data");
            false
          }
        };
        self.publish(QueryState::Ready {
          data,
          stale: false,
          source: DataSource::Network,
        });
        info!(resource, persisted, "Revalidated from network");
        Activation::Fetched { persisted }
      }
      Err(error) => match shown {
        Some(previous) => {
          warn!(resource, error = %error, "Revalidation failed, keeping cached data");
          let previous = self.resource.read_fallback(previous).await;
          self.publish(QueryState::RefreshFailed {
            previous,
            error: error.clone(),
          });
          Activation::FellBack(error)
        }
        None => {
          warn!(resource, error = %error, "Fetch failed with nothing cached");
          self.publish(QueryState::Failed {
            error: error.clone(),
          });
          Activation::Failed(error)
        }
      },
    }
  }
}

impl<R: Resource> std::fmt::Debug for Query<R>
where
  R::Data: std::fmt::Debug,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("resource", &self.resource.name())
      .field("state", &*self.state.borrow())
      .field("in_flight", &self.is_in_flight())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::TokenSession;
  use crate::cache::{FreshnessPolicy, ResourceCache};
  use crate::error::{FetchCause, Upstream};
  use crate::resource::CollectionResource;
  use crate::sources::{ContactsSource, HttpClient};
  use crate::store::{KeyValueStore, MemoryStore};
  use crate::testing::{post, ScriptedSource};
  use crate::types::Post;
  use chrono::Utc;
  use std::time::Duration;
  use tokio::sync::Notify;

  type PostQuery = Query<CollectionResource<Arc<ScriptedSource<Post>>>>;

  fn minutes_ago(minutes: i64) -> i64 {
    Utc::now().timestamp_millis() - minutes * 60_000
  }

  fn query(store: &Arc<MemoryStore>, source: &Arc<ScriptedSource<Post>>) -> PostQuery {
    let cache = ResourceCache::new(store.clone() as Arc<dyn KeyValueStore>);
    Query::new(CollectionResource::new(source.clone(), cache, 10))
  }

  async fn seed_cache(store: &Arc<MemoryStore>, posts: &[Post], fetched_at: i64) {
    ResourceCache::<Post>::new(store.clone() as Arc<dyn KeyValueStore>)
      .write_all_at(posts, fetched_at)
      .await
      .unwrap();
  }

  fn ids(posts: Option<Vec<Post>>) -> Vec<u64> {
    posts.unwrap_or_default().iter().map(|p| p.id).collect()
  }

  #[tokio::test]
  async fn test_fresh_cache_skips_network() {
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, &[post(1, "2024-01-01T00:00:00")], minutes_ago(30)).await;
    let source = Arc::new(ScriptedSource::new(Upstream::Blog));

    let query = query(&store, &source);
    assert_eq!(query.activate().await, Activation::CacheHit);

    assert_eq!(source.calls(), 0);
    assert!(matches!(
      query.state(),
      QueryState::Ready {
        stale: false,
        source: DataSource::Cache,
        ..
      }
    ));
    assert_eq!(ids(query.data()), vec![1]);
  }

  #[tokio::test]
  async fn test_stale_cache_shows_cached_then_fresh() {
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, &[post(1, "2024-01-01T00:00:00")], minutes_ago(90)).await;
    let gate = Arc::new(Notify::new());
    let source = Arc::new(
      ScriptedSource::new(Upstream::Blog)
        .page(None, vec![post(2, "2024-01-02T00:00:00")], None)
        .gate(gate.clone()),
    );

    let query = Arc::new(query(&store, &source));
    let mut states = query.subscribe();
    let task = tokio::spawn({
      let query = query.clone();
      async move { query.activate().await }
    });

    // The network is blocked: the cached post must already be visible
    let first = states
      .wait_for(|s| matches!(s, QueryState::Refreshing { .. }))
      .await
      .unwrap()
      .clone();
    assert_eq!(ids(first.data().cloned()), vec![1]);

    gate.notify_one();
    assert_eq!(task.await.unwrap(), Activation::Fetched { persisted: true });

    let state = query.state();
    assert_eq!(state.source(), Some(DataSource::Network));
    assert_eq!(ids(state.data().cloned()), vec![2]);
    // Fresh data replaced the cache
    let cached = ResourceCache::<Post>::new(store.clone() as Arc<dyn KeyValueStore>);
    assert_eq!(cached.read_all().await[0].id, 2);
    assert!(!cached.is_stale().await);
  }

  #[tokio::test]
  async fn test_cold_start_failure_is_blocking() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::new(Upstream::Blog).error(None));

    let query = query(&store, &source);
    let activation = query.activate().await;

    assert!(matches!(activation, Activation::Failed(_)));
    assert!(matches!(query.state(), QueryState::Failed { .. }));
    assert_eq!(query.data(), None);
  }

  #[tokio::test]
  async fn test_failure_with_cache_keeps_data() {
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, &[post(1, "2024-01-01T00:00:00")], minutes_ago(120)).await;
    let source = Arc::new(ScriptedSource::new(Upstream::Blog).error(None));

    let query = query(&store, &source);
    let activation = query.activate().await;

    assert!(matches!(activation, Activation::FellBack(_)));
    let state = query.state();
    assert!(matches!(state, QueryState::RefreshFailed { .. }));
    assert_eq!(state.source(), Some(DataSource::CacheFallback));
    assert_eq!(ids(state.data().cloned()), vec![1]);
  }

  #[tokio::test]
  async fn test_forced_refresh_ignores_fresh_cache() {
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, &[post(1, "2024-01-01T00:00:00")], minutes_ago(1)).await;
    let source = Arc::new(ScriptedSource::new(Upstream::Blog).page(
      None,
      vec![post(2, "2024-01-02T00:00:00")],
      None,
    ));

    let query = query(&store, &source);
    assert_eq!(query.activate().await, Activation::CacheHit);
    assert_eq!(query.refresh().await, Activation::Fetched { persisted: true });
    assert_eq!(source.calls(), 1);
    assert_eq!(ids(query.data()), vec![2]);
  }

  #[tokio::test]
  async fn test_second_trigger_while_in_flight_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(
      ScriptedSource::new(Upstream::Blog)
        .page(None, vec![post(1, "2024-01-01T00:00:00")], None)
        .delay(Duration::from_millis(50)),
    );

    let query = query(&store, &source);
    let (first, second) = tokio::join!(query.refresh(), query.refresh());

    assert_eq!(first, Activation::Fetched { persisted: true });
    assert_eq!(second, Activation::Ignored);
    assert_eq!(source.calls(), 1);
    assert!(!query.is_in_flight());
  }

  #[tokio::test]
  async fn test_write_failure_still_shows_fresh_data() {
    let store = Arc::new(MemoryStore::new());
    store.set_fail_writes(true);
    let source = Arc::new(ScriptedSource::new(Upstream::Blog).page(
      None,
      vec![post(1, "2024-01-01T00:00:00")],
      None,
    ));

    let query = query(&store, &source);
    assert_eq!(query.activate().await, Activation::Fetched { persisted: false });
    assert_eq!(ids(query.data()), vec![1]);
    assert_eq!(query.state().source(), Some(DataSource::Network));
  }

  #[tokio::test]
  async fn test_policy_override_changes_staleness() {
    let store = Arc::new(MemoryStore::new());
    seed_cache(&store, &[post(1, "2024-01-01T00:00:00")], minutes_ago(30)).await;
    let source = Arc::new(ScriptedSource::<Post>::new(Upstream::Blog).page(None, vec![], None));

    let cache = ResourceCache::new(store.clone() as Arc<dyn KeyValueStore>)
      .with_policy(FreshnessPolicy::from_minutes(10).unwrap());
    let query = Query::new(CollectionResource::new(source.clone(), cache, 10));

    assert_eq!(query.activate().await, Activation::Fetched { persisted: true });
    assert_eq!(source.calls(), 1);
  }

  #[tokio::test]
  async fn test_contacts_without_session_require_auth() {
    let store = Arc::new(MemoryStore::new());
    let contacts = ContactsSource::new(
      HttpClient::new().unwrap(),
      "http://127.0.0.1:9",
      Arc::new(TokenSession::anonymous()),
    )
    .unwrap();
    let cache = ResourceCache::new(store.clone() as Arc<dyn KeyValueStore>);
    let query = Query::new(CollectionResource::new(contacts, cache, 0));

    let Activation::Failed(error) = query.activate().await else {
      panic!("expected a blocking failure");
    };
    assert!(error.is_auth_required());
    assert!(matches!(
      error,
      SyncError::Fetch(ref e) if e.cause == FetchCause::AuthRequired
    ));
  }
}
