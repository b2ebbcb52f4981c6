//! Session signal consumed by sources that require authentication.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;

/// Store key holding the session token.
pub const TOKEN_KEY: &str = "token";

/// Opaque "do we have a usable session" signal.
pub trait SessionSignal: Send + Sync {
  /// The current session token, if one is present and valid.
  fn token(&self) -> Option<String>;

  fn is_session_valid(&self) -> bool {
    self.token().is_some()
  }
}

/// Session backed by a bearer JWT.
///
/// The token counts as valid only while its `exp` claim lies in the future.
#[derive(Debug, Clone, Default)]
pub struct TokenSession {
  token: Option<String>,
}

impl TokenSession {
  pub fn new(token: Option<String>) -> Self {
    Self {
      token: token.filter(|t| !t.trim().is_empty()),
    }
  }

  /// A session with no token.
  pub fn anonymous() -> Self {
    Self::default()
  }
}

impl SessionSignal for TokenSession {
  fn token(&self) -> Option<String> {
    let token = self.token.as_ref()?;
    if is_token_expired(token, Utc::now().timestamp()) {
      return None;
    }
    Some(token.clone())
  }
}

#[derive(Deserialize)]
struct Claims {
  exp: Option<i64>,
}

/// Whether `token` is expired at `now_secs`.
///
/// Anything that is not a three-part JWT with a numeric `exp` is expired.
pub fn is_token_expired(token: &str, now_secs: i64) -> bool {
  let mut parts = token.split('.');
  let (Some(header), Some(payload), Some(signature), None) =
    (parts.next(), parts.next(), parts.next(), parts.next())
  else {
    return true;
  };
  if header.is_empty() || payload.is_empty() || signature.is_empty() {
    return true;
  }

  let payload = payload.trim_end_matches('=');
  let Ok(bytes) = URL_SAFE_NO_PAD
    .decode(payload)
    .or_else(|_| STANDARD_NO_PAD.decode(payload))
  else {
    return true;
  };

  match serde_json::from_slice::<Claims>(&bytes) {
    Ok(Claims { exp: Some(exp) }) => now_secs >= exp,
    _ => true,
  }
}
