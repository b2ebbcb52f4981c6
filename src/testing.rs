//! Fakes shared by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::{FetchError, Upstream};
use crate::sources::{Cursor, Page, PageSource};
use crate::types::{Author, Contact, Post, Roles, Video};

type Scripted<T> = Result<Page<T>, FetchError>;

/// Page source answering from a script keyed by cursor.
pub struct ScriptedSource<T> {
  upstream: Upstream,
  pages: Mutex<HashMap<Option<Cursor>, Scripted<T>>>,
  calls: AtomicUsize,
  delay: Option<Duration>,
  gate: Option<Arc<Notify>>,
}

impl<T: Clone + Send + Sync + 'static> ScriptedSource<T> {
  pub fn new(upstream: Upstream) -> Self {
    Self {
      upstream,
      pages: Mutex::new(HashMap::new()),
      calls: AtomicUsize::new(0),
      delay: None,
      gate: None,
    }
  }

  pub fn page(self, cursor: Option<Cursor>, items: Vec<T>, next: Option<Cursor>) -> Self {
    self.set_page(cursor, items, next);
    self
  }

  pub fn error(self, cursor: Option<Cursor>) -> Self {
    self.set_error(cursor);
    self
  }

  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Block every fetch until the gate is notified.
  pub fn gate(mut self, gate: Arc<Notify>) -> Self {
    self.gate = Some(gate);
    self
  }

  pub fn set_page(&self, cursor: Option<Cursor>, items: Vec<T>, next: Option<Cursor>) {
    let page = Page {
      items,
      next,
      total_available: None,
    };
    self.pages.lock().unwrap().insert(cursor, Ok(page));
  }

  pub fn set_error(&self, cursor: Option<Cursor>) {
    let err = FetchError::transport(self.upstream, "scripted failure");
    self.pages.lock().unwrap().insert(cursor, Err(err));
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> PageSource for ScriptedSource<T> {
  type Item = T;

  fn upstream(&self) -> Upstream {
    self.upstream
  }

  async fn fetch_page(
    &self,
    cursor: Option<&Cursor>,
    _page_size: u32,
  ) -> Result<Page<T>, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = &self.gate {
      gate.notified().await;
    }
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self
      .pages
      .lock()
      .unwrap()
      .get(&cursor.cloned())
      .cloned()
      .unwrap_or_else(|| Err(FetchError::transport(self.upstream, "no page scripted")))
  }
}

pub fn post(id: u64, date: &str) -> Post {
  Post {
    id,
    title: format!("Post {}", id),
    excerpt: String::new(),
    date: date.to_string(),
    featured_image_url: None,
    link: format!("https://blog.test/?p={}", id),
    categories: Vec::new(),
    tags: Vec::new(),
    author: Author::unknown(),
  }
}

pub fn video(id: &str, published_at: &str) -> Video {
  Video {
    video_id: id.to_string(),
    title: format!("Video {}", id),
    description: String::new(),
    thumbnail_url: String::new(),
    published_at: published_at.to_string(),
  }
}

pub fn contact(name: &str, email: &str) -> Contact {
  Contact {
    name: name.to_string(),
    email: email.to_string(),
    roles: Roles::default(),
    phone: None,
    student_id: None,
    batch: None,
    gender: None,
    blood_type: None,
    birthday: None,
    photo: None,
    linkedin: None,
    facebook: None,
  }
}
