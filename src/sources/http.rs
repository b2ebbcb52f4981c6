//! Shared HTTP plumbing for the upstream adapters.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{FetchCause, FetchError, Upstream};

/// Thin wrapper over `reqwest::Client` that maps failures to `FetchError`.
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
}

/// A successful (2xx) response with its body fully read.
pub struct HttpResponse {
  pub headers: HeaderMap,
  pub body: Vec<u8>,
}

impl HttpClient {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("cdir/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }

  /// GET `url`, failing on transport errors and non-2xx statuses.
  pub async fn get(&self, upstream: Upstream, url: Url) -> Result<HttpResponse, FetchError> {
    debug!(%upstream, url = %redact(&url), "GET");

    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| FetchError::transport(upstream, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::new(upstream, FetchCause::Status(status.as_u16())));
    }

    let headers = response.headers().clone();
    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::transport(upstream, e.to_string()))?
      .to_vec();

    Ok(HttpResponse { headers, body })
  }
}

impl HttpResponse {
  /// Deserialize the body, mapping parse failures to a malformed-response error.
  pub fn json<T: DeserializeOwned>(&self, upstream: Upstream) -> Result<T, FetchError> {
    serde_json::from_slice(&self.body).map_err(|e| FetchError::malformed(upstream, e.to_string()))
  }

  /// Read a numeric header such as `X-WP-Total`.
  pub fn header_u64(&self, name: &str) -> Option<u64> {
    self
      .headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.trim().parse().ok())
  }
}

/// Drop the session token from a URL before it reaches the logs.
fn redact(url: &Url) -> String {
  let mut url = url.clone();
  let pairs: Vec<(String, String)> = url
    .query_pairs()
    .map(|(k, v)| {
      let v = if k == "token" { "***".to_string() } else { v.into_owned() };
      (k.into_owned(), v)
    })
    .collect();
  if pairs.is_empty() {
    return url.to_string();
  }
  url.query_pairs_mut().clear().extend_pairs(pairs);
  url.to_string()
}

/// Append `segments` to the path of `base`.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
  let mut url = base.clone();
  url
    .path_segments_mut()
    .map_err(|_| eyre!("URL cannot be a base: {}", base))?
    .pop_if_empty()
    .extend(segments);
  Ok(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_endpoint_appends_segments() {
    let base = Url::parse("https://blog.test/").unwrap();
    let url = endpoint(&base, &["wp-json", "wp", "v2", "posts"]).unwrap();
    assert_eq!(url.as_str(), "https://blog.test/wp-json/wp/v2/posts");

    let base = Url::parse("https://x.test/sub").unwrap();
    let url = endpoint(&base, &["api", "contacts"]).unwrap();
    assert_eq!(url.as_str(), "https://x.test/sub/api/contacts");
  }

  #[test]
  fn test_redact_hides_token() {
    let url = Url::parse("https://x.test/api/contacts?token=secret&a=1").unwrap();
    let shown = redact(&url);
    assert!(!shown.contains("secret"));
    assert!(shown.contains("a=1"));
  }
}
