//! Open Graph / Twitter card / JSON-LD scraping for product pages.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    time::Duration,
};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, redirect};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use ts_rs::TS;
use url::{Host, Url};

use super::amazon;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Bytes of a product page read before extraction stops.
const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum ProductMetadataError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid ASIN: {0}")]
    InvalidAsin(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct ProductMetadata {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub site_name: Option<String>,
    pub asin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ProductMetadataQuery {
    pub url: String,
}

static META_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("meta regex"));
static LINK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("link regex"));
static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("img regex"));
static ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("attribute regex")
});
static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"));
static JSON_LD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("json-ld regex")
});
static OLD_HIRES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-old-hires\s*=\s*"([^"]+)""#).expect("hires regex"));
static HI_RES_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""hiRes"\s*:\s*"(https?://[^"]+)""#).expect("hiRes regex"));

fn attributes(tag: &str) -> HashMap<String, String> {
    ATTR.captures_iter(tag)
        .filter_map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3))?;
            Some((caps[1].to_ascii_lowercase(), value.as_str().to_string()))
        })
        .collect()
}

pub fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn clean(value: &str) -> Option<String> {
    let value = decode_entities(value.trim());
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!value.is_empty()).then_some(value)
}

/// `<meta>` contents keyed by lower-cased `property`, `name` or `itemprop`.
/// The first occurrence of a key wins.
fn meta_tags(html: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for tag in META_TAG.find_iter(html) {
        let attrs = attributes(tag.as_str());
        let Some(content) = attrs.get("content") else {
            continue;
        };
        for key in ["property", "name", "itemprop"] {
            if let Some(name) = attrs.get(key) {
                tags.entry(name.to_ascii_lowercase())
                    .or_insert_with(|| content.clone());
            }
        }
    }
    tags
}

/// Top-level JSON-LD nodes, with `@graph` members flattened in.
fn json_ld_nodes(html: &str) -> Vec<Value> {
    let mut nodes = Vec::new();
    for caps in JSON_LD.captures_iter(html) {
        let Ok(value) = serde_json::from_str::<Value>(caps[1].trim()) else {
            continue;
        };
        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        for item in items {
            if let Some(Value::Array(graph)) = item.get("@graph") {
                nodes.extend(graph.iter().cloned());
            }
            nodes.push(item);
        }
    }
    nodes
}

fn is_product(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("product"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|t| t.eq_ignore_ascii_case("product"))),
        _ => false,
    }
}

fn json_ld_image(value: &Value) -> Option<String> {
    match value {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items.iter().find_map(json_ld_image),
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("contentUrl"))
            .and_then(json_ld_image),
        _ => None,
    }
}

fn json_ld_price(offers: &Value) -> Option<(String, Option<String>)> {
    match offers {
        Value::Array(items) => items.iter().find_map(json_ld_price),
        Value::Object(map) => {
            let price = match map.get("price").or_else(|| map.get("lowPrice"))? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let currency = map
                .get("priceCurrency")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some((price, currency))
        }
        _ => None,
    }
}

fn is_content_image(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    !lower.starts_with("data:")
        && !lower.contains(".svg")
        && !["sprite", "pixel", "logo", "icon"]
            .iter()
            .any(|junk| lower.contains(junk))
}

fn amazon_image(html: &str) -> Option<String> {
    if let Some(caps) = OLD_HIRES.captures(html) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = HI_RES_JSON.captures(html) {
        return Some(caps[1].to_string());
    }
    IMG_TAG.find_iter(html).find_map(|tag| {
        let attrs = attributes(tag.as_str());
        (attrs.get("id").map(String::as_str) == Some("landingImage"))
            .then(|| attrs.get("src").cloned())
            .flatten()
    })
}

fn first_content_image(html: &str) -> Option<String> {
    IMG_TAG.find_iter(html).find_map(|tag| {
        let attrs = attributes(tag.as_str());
        attrs
            .get("src")
            .or_else(|| attrs.get("data-src"))
            .filter(|src| !src.trim().is_empty() && is_content_image(src))
            .cloned()
    })
}

fn resolve(base: &Url, candidate: &str) -> Option<String> {
    let candidate = decode_entities(candidate.trim());
    base.join(&candidate)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(String::from)
}

/// Extracts metadata from an already fetched page.
pub fn extract(html: &str, page_url: &Url) -> ProductMetadata {
    let meta = meta_tags(html);
    let nodes = json_ld_nodes(html);
    let product = nodes.iter().find(|n| is_product(n));
    let meta_value = |keys: &[&str]| keys.iter().find_map(|k| meta.get(*k).and_then(|v| clean(v)));

    let image_candidates = [
        meta_value(&["og:image:secure_url"]),
        meta_value(&["og:image"]),
        meta_value(&["twitter:image"]),
        meta_value(&["twitter:image:src"]),
        product
            .into_iter()
            .chain(nodes.iter())
            .find_map(|n| n.get("image").and_then(json_ld_image)),
        LINK_TAG.find_iter(html).find_map(|tag| {
            let attrs = attributes(tag.as_str());
            attrs
                .get("rel")
                .is_some_and(|rel| rel.eq_ignore_ascii_case("image_src"))
                .then(|| attrs.get("href").cloned())
                .flatten()
        }),
        amazon_image(html),
        first_content_image(html),
    ];
    let image_url = image_candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| resolve(page_url, &candidate));

    let title = meta_value(&["og:title", "twitter:title"])
        .or_else(|| product.and_then(|p| p.get("name")?.as_str().and_then(clean)))
        .or_else(|| TITLE.captures(html).and_then(|caps| clean(&caps[1])));

    let offer = product.and_then(|p| p.get("offers")).and_then(json_ld_price);
    let price = meta_value(&["product:price:amount", "og:price:amount"])
        .or_else(|| offer.as_ref().map(|(price, _)| price.clone()));
    let currency = meta_value(&["product:price:currency", "og:price:currency"])
        .or_else(|| offer.and_then(|(_, currency)| currency));

    ProductMetadata {
        url: page_url.to_string(),
        title,
        description: meta_value(&["og:description", "description", "twitter:description"]),
        image_url,
        price,
        currency,
        site_name: meta_value(&["og:site_name"])
            .or_else(|| page_url.host_str().map(|h| h.trim_start_matches("www.").to_string())),
        asin: amazon::extract_asin(page_url),
    }
}

fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        // 100.64.0.0/10 carrier-grade NAT
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64))
}

fn is_public_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_ipv4(v4);
    }
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local())
}

/// Only hosts reachable on the public internet may be fetched. Names are
/// not resolved here; IP literals and `localhost` are checked directly.
pub fn is_public_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain != "localhost" && !domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_public_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_public_ipv6(ip),
        None => false,
    }
}

pub fn parse_http_url(raw: &str) -> Result<Url, ProductMetadataError> {
    let url = Url::parse(raw.trim()).map_err(|_| ProductMetadataError::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || !is_public_host(&url) {
        return Err(ProductMetadataError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Appends `chunk` without letting `buf` grow past `MAX_PAGE_BYTES`.
/// Returns false once the cap is reached.
fn push_capped(buf: &mut Vec<u8>, chunk: &[u8]) -> bool {
    let room = MAX_PAGE_BYTES.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    chunk.len() < room
}

#[derive(Clone)]
pub struct ProductMetadataService {
    http: Client,
}

impl Default for ProductMetadataService {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductMetadataService {
    const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Self::FETCH_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .redirect(redirect::Policy::custom(|attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if is_public_host(attempt.url()) {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { http }
    }

    async fn fetch_html(&self, url: &Url) -> Result<String, ProductMetadataError> {
        let mut res = self
            .http
            .get(url.clone())
            .header("accept", "text/html,application/xhtml+xml")
            .header("accept-language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| ProductMetadataError::Fetch(e.to_string()))?;
        if !res.status().is_success() {
            return Err(ProductMetadataError::Fetch(format!("http {}", res.status())));
        }
        if let Some(len) = res.content_length() {
            if len > MAX_PAGE_BYTES as u64 {
                return Err(ProductMetadataError::Fetch(format!("page too large ({len} bytes)")));
            }
        }
        let mut body = Vec::new();
        while let Some(chunk) = res
            .chunk()
            .await
            .map_err(|e| ProductMetadataError::Fetch(e.to_string()))?
        {
            if !push_capped(&mut body, &chunk) {
                debug!(url = %url, "Product page truncated at size cap");
                break;
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetches and extracts. A failed fetch still yields what the URL alone
    /// gives away (the ASIN image for Amazon links).
    pub async fn fetch(&self, raw_url: &str) -> Result<ProductMetadata, ProductMetadataError> {
        let url = parse_http_url(raw_url)?;
        let mut metadata = match self.fetch_html(&url).await {
            Ok(html) => extract(&html, &url),
            Err(e) => {
                warn!(url = %url, error = %e, "Product page fetch failed");
                ProductMetadata {
                    url: url.to_string(),
                    asin: amazon::extract_asin(&url),
                    site_name: url.host_str().map(|h| h.trim_start_matches("www.").to_string()),
                    ..Default::default()
                }
            }
        };
        if metadata.image_url.is_none() {
            metadata.image_url = metadata.asin.as_deref().map(amazon::asin_image_url);
        }
        debug!(url = %url, has_image = metadata.image_url.is_some(), "Extracted product metadata");
        Ok(metadata)
    }
}
