//! Merges independently paginated sources into one newest-first feed.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::item::{sort_newest_first, FeedItem};
use crate::error::{FetchError, Upstream};
use crate::sources::{Cursor, Page, PageSource};

/// A source of feed entries.
pub type FeedSource = Arc<dyn PageSource<Item = FeedItem>>;

/// Adapts a post or video source into a feed source.
pub struct FeedAdapter<S>(pub S);

#[async_trait]
impl<S> PageSource for FeedAdapter<S>
where
  S: PageSource,
  S::Item: Into<FeedItem>,
{
  type Item = FeedItem;

  fn upstream(&self) -> Upstream {
    self.0.upstream()
  }

  async fn fetch_page(
    &self,
    cursor: Option<&Cursor>,
    page_size: u32,
  ) -> Result<Page<FeedItem>, FetchError> {
    let page = self.0.fetch_page(cursor, page_size).await?;
    Ok(page.map(Into::into))
  }
}

/// Pagination position of one source within a feed session.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LaneCursor {
  /// Nothing fetched yet (or the first page failed)
  Start,
  Next(Cursor),
  Exhausted,
}

impl LaneCursor {
  fn as_request(&self) -> Option<&Cursor> {
    match self {
      Self::Next(cursor) => Some(cursor),
      Self::Start | Self::Exhausted => None,
    }
  }
}

struct Lane {
  source: FeedSource,
  cursor: LaneCursor,
}

type LaneResult = (usize, Result<Page<FeedItem>, FetchError>);

/// Outcome of one source in one round.
#[derive(Debug, Clone)]
pub struct LaneReport {
  pub upstream: Upstream,
  /// Number of items received, or why the page failed
  pub outcome: Result<usize, FetchError>,
}

/// Outcome of an initial load or load-more round.
#[derive(Debug, Clone, Default)]
pub struct RoundReport {
  pub lanes: Vec<LaneReport>,
  /// Items added to the feed after de-duplication
  pub net_new: usize,
}

impl RoundReport {
  pub fn errors(&self) -> Vec<FetchError> {
    self
      .lanes
      .iter()
      .filter_map(|l| l.outcome.as_ref().err().cloned())
      .collect()
  }

  /// True when at least one source was asked and none answered.
  pub fn all_failed(&self) -> bool {
    !self.lanes.is_empty() && self.lanes.iter().all(|l| l.outcome.is_err())
  }

  pub fn succeeded(&self) -> Vec<Upstream> {
    self
      .lanes
      .iter()
      .filter(|l| l.outcome.is_ok())
      .map(|l| l.upstream)
      .collect()
  }
}

/// Feed merge engine for one feed session.
///
/// Holds the merged sequence, the dedupe keys already present and one
/// cursor per source. A failing source keeps its cursor and never aborts
/// the others.
pub struct FeedEngine {
  lanes: Vec<Lane>,
  items: Vec<FeedItem>,
  seen: HashSet<String>,
  page_size: u32,
  has_more: bool,
}

impl FeedEngine {
  /// Sources are listed in tie-break order.
  pub fn new(sources: Vec<FeedSource>, page_size: u32) -> Self {
    Self {
      lanes: sources
        .into_iter()
        .map(|source| Lane {
          source,
          cursor: LaneCursor::Start,
        })
        .collect(),
      items: Vec::new(),
      seen: HashSet::new(),
      page_size,
      has_more: true,
    }
  }

  pub fn items(&self) -> &[FeedItem] {
    &self.items
  }

  pub fn has_more(&self) -> bool {
    self.has_more
  }

  /// Start a new session: forget items and rewind every cursor.
  pub fn reset(&mut self) {
    self.items.clear();
    self.seen.clear();
    for lane in &mut self.lanes {
      lane.cursor = LaneCursor::Start;
    }
    self.has_more = !self.lanes.is_empty();
  }

  /// Start a session from previously cached entries.
  ///
  /// Cursors rewind, so the next load-more fetches first pages and the
  /// dedupe set drops what is already shown.
  pub fn seed(&mut self, items: Vec<FeedItem>) {
    self.reset();
    self.merge(items);
  }

  /// Merge entries into the feed, skipping known dedupe keys. Returns the
  /// number of entries added.
  pub fn merge(&mut self, items: Vec<FeedItem>) -> usize {
    let before = self.items.len();
    for item in items {
      if self.seen.insert(item.dedupe_key()) {
        self.items.push(item);
      }
    }
    sort_newest_first(&mut self.items);
    self.items.len() - before
  }

  /// Fetch the first page of every source and start the feed over from
  /// them. When every source fails the feed, its cursors and `has_more`
  /// stay as they were.
  pub async fn load_initial(&mut self) -> RoundReport {
    let all: Vec<usize> = (0..self.lanes.len()).collect();
    let results = self.fetch(&all, true).await;
    if results.iter().any(|(_, result)| result.is_ok()) {
      self.reset();
    }
    let report = self.apply(results);
    if report.all_failed() {
      debug!(items = self.items.len(), "Initial feed failed, keeping current items");
      return report;
    }
    self.has_more = self
      .lanes
      .iter()
      .any(|lane| lane.cursor != LaneCursor::Exhausted);

    debug!(
      items = self.items.len(),
      has_more = self.has_more,
      "Initial feed loaded"
    );
    report
  }

  /// Fetch the next page of every source that still has pages.
  pub async fn load_more(&mut self) -> RoundReport {
    let active: Vec<usize> = self
      .lanes
      .iter()
      .enumerate()
      .filter(|(_, lane)| lane.cursor != LaneCursor::Exhausted)
      .map(|(i, _)| i)
      .collect();
    let results = self.fetch(&active, false).await;
    let report = self.apply(results);
    let exhausted = self
      .lanes
      .iter()
      .all(|lane| lane.cursor == LaneCursor::Exhausted);
    // Exhausted cursors alone do not end the feed: the round that exhausted
    // them may still have added items.
    self.has_more = !(exhausted && report.net_new == 0);

    debug!(
      net_new = report.net_new,
      items = self.items.len(),
      has_more = self.has_more,
      "Loaded more feed items"
    );
    report
  }

  /// Ask the given lanes for a page concurrently. Nothing is changed until
  /// the results are applied.
  async fn fetch(&self, lanes: &[usize], from_start: bool) -> Vec<LaneResult> {
    let page_size = self.page_size;
    let requests = lanes.iter().map(|&i| {
      let lane = &self.lanes[i];
      let cursor = if from_start {
        None
      } else {
        lane.cursor.as_request()
      };
      lane.source.fetch_page(cursor, page_size)
    });
    lanes.iter().copied().zip(join_all(requests).await).collect()
  }

  fn apply(&mut self, results: Vec<LaneResult>) -> RoundReport {
    let mut fresh = Vec::new();
    let mut lanes = Vec::with_capacity(results.len());
    for (i, result) in results {
      let lane = &mut self.lanes[i];
      let upstream = lane.source.upstream();
      match result {
        Ok(page) => {
          lane.cursor = match page.next {
            Some(next) => LaneCursor::Next(next),
            None => LaneCursor::Exhausted,
          };
          lanes.push(LaneReport {
            upstream,
            outcome: Ok(page.items.len()),
          });
          fresh.extend(page.items);
        }
        Err(e) => {
          warn!(%upstream, kind = e.kind(), error = %e, "Feed source failed, keeping its cursor");
          lanes.push(LaneReport {
            upstream,
            outcome: Err(e),
          });
        }
      }
    }

    let net_new = self.merge(fresh);
    RoundReport { lanes, net_new }
  }
}
