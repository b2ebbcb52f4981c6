//! Contacts directory source. Requires a session; returns everything at once.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::api_types::ApiContact;
use super::http::{endpoint, HttpClient};
use super::{Cursor, Page, PageSource};
use crate::auth::SessionSignal;
use crate::cache::dedupe_by_key;
use crate::error::{FetchError, Upstream};
use crate::types::Contact;

#[derive(Clone)]
pub struct ContactsSource {
  http: HttpClient,
  contacts_url: Url,
  session: Arc<dyn SessionSignal>,
}

impl ContactsSource {
  pub fn new(http: HttpClient, backend_url: &str, session: Arc<dyn SessionSignal>) -> Result<Self> {
    let base =
      Url::parse(backend_url).map_err(|e| eyre!("Invalid backend URL {}: {}", backend_url, e))?;
    let contacts_url = endpoint(&base, &["api", "contacts"])?;

    Ok(Self {
      http,
      contacts_url,
      session,
    })
  }
}

#[async_trait]
impl PageSource for ContactsSource {
  type Item = Contact;

  fn upstream(&self) -> Upstream {
    Upstream::Contacts
  }

  // Single-shot endpoint: cursor and page size are ignored.
  async fn fetch_page(
    &self,
    _cursor: Option<&Cursor>,
    _page_size: u32,
  ) -> Result<Page<Contact>, FetchError> {
    let Some(token) = self.session.token() else {
      warn!("No valid session, skipping contacts fetch");
      return Err(FetchError::auth_required(Upstream::Contacts));
    };

    let mut url = self.contacts_url.clone();
    url.query_pairs_mut().append_pair("token", &token);

    let response = self.http.get(Upstream::Contacts, url).await?;
    let raw: Vec<ApiContact> = response.json(Upstream::Contacts)?;
    let received = raw.len();
    let contacts = dedupe_by_key(raw.into_iter().map(ApiContact::into_contact).collect());

    debug!(received, kept = contacts.len(), "Fetched contacts");
    Ok(Page::last(contacts))
  }
}
