//! Error taxonomy for the cache and sync layers.
//!
//! Fetch failures carry the upstream they came from so that multi-source
//! merges can report per-source outcomes without aborting each other.

use std::fmt;
use thiserror::Error;

/// The upstream service a record or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
  Blog,
  Video,
  Contacts,
}

impl Upstream {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Blog => "blog",
      Self::Video => "video",
      Self::Contacts => "contacts",
    }
  }
}

impl fmt::Display for Upstream {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Why a page fetch failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchCause {
  /// Network unreachable, connection reset, timeout from the transport.
  #[error("transport error: {0}")]
  Transport(String),
  /// Upstream answered with a non-2xx status.
  #[error("upstream returned HTTP {0}")]
  Status(u16),
  /// 2xx response whose body could not be normalized.
  #[error("malformed response: {0}")]
  Malformed(String),
  /// No valid session for a resource that needs one.
  #[error("a valid session is required")]
  AuthRequired,
  /// Cursor issued by a different source.
  #[error("cursor not understood: {0}")]
  InvalidCursor(String),
}

/// A failed page fetch from a single upstream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{upstream} fetch failed: {cause}")]
pub struct FetchError {
  pub upstream: Upstream,
  pub cause: FetchCause,
}

impl FetchError {
  pub fn new(upstream: Upstream, cause: FetchCause) -> Self {
    Self { upstream, cause }
  }

  pub fn transport(upstream: Upstream, message: impl Into<String>) -> Self {
    Self::new(upstream, FetchCause::Transport(message.into()))
  }

  pub fn malformed(upstream: Upstream, message: impl Into<String>) -> Self {
    Self::new(upstream, FetchCause::Malformed(message.into()))
  }

  pub fn auth_required(upstream: Upstream) -> Self {
    Self::new(upstream, FetchCause::AuthRequired)
  }

  pub fn is_auth_required(&self) -> bool {
    matches!(self.cause, FetchCause::AuthRequired)
  }

  pub fn is_malformed(&self) -> bool {
    matches!(self.cause, FetchCause::Malformed(_))
  }

  /// Short label for structured logging.
  pub fn kind(&self) -> &'static str {
    match self.cause {
      FetchCause::Transport(_) | FetchCause::Status(_) => "transport",
      FetchCause::Malformed(_) => "malformed",
      FetchCause::AuthRequired => "auth_required",
      FetchCause::InvalidCursor(_) => "invalid_cursor",
    }
  }
}

/// Failure of the persistent key-value store backend.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("store lock poisoned")]
  Poisoned,
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// Write-path failure of the cache record manager.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to serialize `{key}`: {reason}")]
  Serialize { key: &'static str, reason: String },
  #[error("failed to write `{key}`: {source}")]
  Write {
    key: &'static str,
    #[source]
    source: StoreError,
  },
  #[error("failed to clear cache: {0}")]
  Clear(#[source] StoreError),
}

/// Failure surfaced by a revalidation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
  #[error(transparent)]
  Fetch(#[from] FetchError),
  #[error("every source failed: {}", join_errors(.0))]
  AllSourcesFailed(Vec<FetchError>),
}

impl SyncError {
  /// Whether the UI should redirect to re-authentication instead of offering a retry.
  pub fn is_auth_required(&self) -> bool {
    match self {
      Self::Fetch(e) => e.is_auth_required(),
      Self::AllSourcesFailed(errors) => {
        !errors.is_empty() && errors.iter().all(FetchError::is_auth_required)
      }
    }
  }
}

fn join_errors(errors: &[FetchError]) -> String {
  errors
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}
