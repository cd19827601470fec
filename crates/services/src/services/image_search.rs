//! Gift image lookup: Google Custom Search, then Unsplash, then a placeholder.

use std::time::Duration;

use moka::future::Cache;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};
use utils::config::GoogleSearchConfig;

const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    link: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    regular: String,
}

pub fn placeholder_url(category: &str) -> String {
    let label = if category.trim().is_empty() { "Gift" } else { category.trim() };
    format!("https://placehold.co/600x400?text={}", urlencoding::encode(label))
}

#[derive(Clone)]
pub struct ImageSearchService {
    http: Client,
    google: Option<GoogleSearchConfig>,
    unsplash_key: Option<SecretString>,
    cache: Cache<String, String>,
}

impl ImageSearchService {
    pub fn new(google: Option<GoogleSearchConfig>, unsplash_key: Option<SecretString>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(8))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self {
            http,
            google,
            unsplash_key,
            cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(24 * 60 * 60))
                .build(),
        }
    }

    /// Always returns a usable image URL.
    pub async fn find_image(&self, query: &str, category: &str) -> String {
        let key = query.trim().to_lowercase();
        if let Some(hit) = self.cache.get(&key).await {
            return hit;
        }

        let found = match self.search_google(&key).await {
            Some(url) => Some(url),
            None => self.search_unsplash(&key).await,
        };
        match found {
            Some(url) => {
                self.cache.insert(key, url.clone()).await;
                url
            }
            None => placeholder_url(category),
        }
    }

    async fn search_google(&self, query: &str) -> Option<String> {
        let google = self.google.as_ref()?;
        let res = self
            .http
            .get(GOOGLE_SEARCH_URL)
            .query(&[
                ("key", google.api_key.expose_secret()),
                ("cx", google.engine_id.as_str()),
                ("q", query),
                ("searchType", "image"),
                ("num", "1"),
                ("safe", "active"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match res {
            Ok(res) => match res.json::<GoogleResponse>().await {
                Ok(body) => body.items.into_iter().next().map(|item| item.link),
                Err(e) => {
                    debug!(error = %e, "Unreadable Google image search response");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Google image search failed");
                None
            }
        }
    }

    async fn search_unsplash(&self, query: &str) -> Option<String> {
        let key = self.unsplash_key.as_ref()?;
        let res = self
            .http
            .get(UNSPLASH_SEARCH_URL)
            .header("authorization", format!("Client-ID {}", key.expose_secret()))
            .header("accept-version", "v1")
            .query(&[("query", query), ("per_page", "1"), ("orientation", "landscape")])
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match res {
            Ok(res) => match res.json::<UnsplashResponse>().await {
                Ok(body) => body.results.into_iter().next().map(|p| p.urls.regular),
                Err(e) => {
                    debug!(error = %e, "Unreadable Unsplash response");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Unsplash search failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_encodes_category() {
        assert_eq!(
            placeholder_url("Coffee & Tea"),
            "https://placehold.co/600x400?text=Coffee%20%26%20Tea"
        );
        assert_eq!(placeholder_url(" "), "https://placehold.co/600x400?text=Gift");
    }

    #[tokio::test]
    async fn unconfigured_search_uses_placeholder() {
        let service = ImageSearchService::new(None, None);
        assert_eq!(
            service.find_image("Headlamp", "Outdoors").await,
            "https://placehold.co/600x400?text=Outdoors"
        );
    }

    #[tokio::test]
    async fn cached_results_are_reused() {
        let service = ImageSearchService::new(None, None);
        service
            .cache
            .insert("headlamp".into(), "https://img.example.com/headlamp.jpg".into())
            .await;
        assert_eq!(
            service.find_image(" Headlamp ", "Outdoors").await,
            "https://img.example.com/headlamp.jpg"
        );
    }
}
