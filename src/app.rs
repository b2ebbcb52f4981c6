//! Service container: one store, one session and one query per resource class.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{SessionSignal, TokenSession, TOKEN_KEY};
use crate::cache::{ResourceCache, ResourceKind};
use crate::config::Config;
use crate::feed::{FeedAdapter, FeedEngine, FeedResource, FeedSession, FeedSource};
use crate::query::Query;
use crate::resource::CollectionResource;
use crate::sources::{BlogSource, ContactsSource, HttpClient, VideoSource};
use crate::store::{KeyValueStore, SqliteStore};

pub type ContactsQuery = Query<CollectionResource<ContactsSource>>;
pub type PostsQuery = Query<CollectionResource<BlogSource>>;
pub type VideosQuery = Query<CollectionResource<VideoSource>>;

/// Everything a front end needs, built once at start-up.
pub struct App {
  store: Arc<dyn KeyValueStore>,
  session: Arc<dyn SessionSignal>,
  pub contacts: ContactsQuery,
  pub posts: PostsQuery,
  pub videos: VideosQuery,
  pub feed: FeedSession,
}

impl App {
  /// Build against the SQLite store at its default location.
  pub async fn new(config: &Config) -> Result<Self> {
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open()?);
    Self::with_store(config, store).await
  }

  pub async fn with_store(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
    let token = match Config::get_token() {
      Some(token) => Some(token),
      None => load_token(store.as_ref()).await,
    };
    let session: Arc<dyn SessionSignal> = Arc::new(TokenSession::new(token));
    if !session.is_session_valid() {
      info!("No valid session token, contacts will require sign-in");
    }

    let http = HttpClient::new()?;
    let blog = BlogSource::new(http.clone(), &config.blog.url)?.with_category(config.blog.category);
    let videos = VideoSource::new(http.clone(), &config.backend.url, session.clone())?;
    let contacts = ContactsSource::new(http, &config.backend.url, session.clone())?;

    let policies = &config.cache;
    let contacts_cache = ResourceCache::new(store.clone())
      .with_policy(policies.policy(ResourceKind::Contacts));
    let posts_cache =
      ResourceCache::new(store.clone()).with_policy(policies.policy(ResourceKind::Posts));
    let videos_cache =
      ResourceCache::new(store.clone()).with_policy(policies.policy(ResourceKind::Videos));

    let per_page = config.blog.per_page;
    let engine = FeedEngine::new(
      vec![
        Arc::new(FeedAdapter(blog.clone())) as FeedSource,
        Arc::new(FeedAdapter(videos.clone())) as FeedSource,
      ],
      per_page,
    );
    let feed = FeedSession::new(
      FeedResource::new(engine, posts_cache.clone(), videos_cache.clone()),
      config.feed.debounce(),
    );

    Ok(Self {
      store,
      session,
      contacts: Query::new(CollectionResource::new(contacts, contacts_cache, per_page)),
      posts: Query::new(CollectionResource::new(blog, posts_cache, per_page)),
      videos: Query::new(CollectionResource::new(videos, videos_cache, per_page)),
      feed,
    })
  }

  pub fn is_signed_in(&self) -> bool {
    self.session.is_session_valid()
  }

  pub fn store(&self) -> &Arc<dyn KeyValueStore> {
    &self.store
  }
}

/// Persist the session token for later runs.
pub async fn save_token(store: &dyn KeyValueStore, token: &str) -> Result<()> {
  let token = token.trim();
  if token.is_empty() {
    return Err(eyre!("Token must not be empty"));
  }
  store
    .set(TOKEN_KEY, token)
    .await
    .map_err(|e| eyre!("Failed to store token: {}", e))
}

async fn load_token(store: &dyn KeyValueStore) -> Option<String> {
  match store.get(TOKEN_KEY).await {
    Ok(token) => token,
    Err(e) => {
      warn!(error = %e, "Failed to read stored token, continuing signed out");
      None
    }
  }
}
