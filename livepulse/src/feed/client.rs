//! HTTP client for the listing feed.

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::feed::models::{ApiEnvelope, FeedPage};
use crate::{Error, Result};

/// Fetches pages of the live listing feed.
///
/// Object-safe so the walker and orchestrator can run against scripted
/// fakes in tests.
#[async_trait]
pub trait ListingClient: Send + Sync {
    /// Fetch one page. `None` fetches the first page.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage>;
}

/// reqwest-backed listing client with static header credentials.
pub struct HttpListingClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    page_size: u32,
}

impl HttpListingClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            page_size: config.page_size,
        })
    }
}

#[async_trait]
impl ListingClient for HttpListingClient {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage> {
        let url = format!("{}/open/v1/lives", self.base_url);
        let mut request = self
            .http
            .get(&url)
            .header("Client-Id", &self.client_id)
            .header("Client-Secret", &self.client_secret)
            .query(&[("size", self.page_size.to_string())]);

        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            request = request.query(&[("next", cursor)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::feed(format!(
                "listing request failed with status {status}"
            )));
        }

        let envelope: ApiEnvelope = response.json().await?;
        let content = envelope.content.ok_or_else(|| {
            Error::feed(format!(
                "listing response missing content (code {})",
                envelope.code
            ))
        })?;

        Ok(FeedPage {
            items: content.data,
            next: content
                .page
                .and_then(|page| page.next)
                .filter(|next| !next.is_empty()),
        })
    }
}
