//! Amazon product helpers: ASIN parsing, affiliate links and page lookup.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::product_metadata::{ProductMetadata, ProductMetadataError, ProductMetadataService};

const AMAZON_BASE: &str = "https://www.amazon.com";

static ASIN_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:/dp/|/gp/product/|/gp/aw/d/|/product/|/exec/obidos/ASIN/)([A-Z0-9]{10})(?:[/?#]|$)")
        .expect("valid ASIN path regex")
});

static ASIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{10}$").expect("valid ASIN regex"));

pub fn is_valid_asin(value: &str) -> bool {
    ASIN.is_match(value)
}

pub fn is_amazon_url(url: &Url) -> bool {
    url.host_str().is_some_and(|host| {
        let host = host.trim_start_matches("www.");
        host.starts_with("amazon.") || host.contains(".amazon.") || host == "amzn.to" || host.starts_with("amzn.")
    })
}

/// ASIN from an Amazon product URL, looking at known path shapes first and
/// the `asin` query parameter second.
pub fn extract_asin(url: &Url) -> Option<String> {
    if !is_amazon_url(url) {
        return None;
    }
    if let Some(caps) = ASIN_PATH.captures(url.path()) {
        return Some(caps[1].to_string());
    }
    url.query_pairs()
        .find(|(key, _)| key.eq_ignore_ascii_case("asin"))
        .map(|(_, value)| value.to_uppercase())
        .filter(|asin| is_valid_asin(asin))
}

/// Direct product image derived from the ASIN alone.
pub fn asin_image_url(asin: &str) -> String {
    format!("https://images-na.ssl-images-amazon.com/images/P/{asin}.01.LZZZZZZZ.jpg")
}

#[derive(Clone)]
pub struct AmazonService {
    associate_tag: Option<String>,
    metadata: ProductMetadataService,
}

impl AmazonService {
    pub fn new(associate_tag: Option<String>, metadata: ProductMetadataService) -> Self {
        Self {
            associate_tag,
            metadata,
        }
    }

    fn with_tag(&self, mut url: String) -> String {
        if let Some(tag) = &self.associate_tag {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("tag=");
            url.push_str(&urlencoding::encode(tag));
        }
        url
    }

    pub fn product_url(&self, asin: &str) -> String {
        self.with_tag(format!("{AMAZON_BASE}/dp/{asin}"))
    }

    pub fn search_url(&self, query: &str) -> String {
        self.with_tag(format!("{AMAZON_BASE}/s?k={}", urlencoding::encode(query.trim())))
    }

    /// Scrapes the product page. Invalid ASINs are rejected before any request.
    pub async fn lookup(&self, asin: &str) -> Result<ProductMetadata, ProductMetadataError> {
        let asin = asin.trim().to_uppercase();
        if !is_valid_asin(&asin) {
            return Err(ProductMetadataError::InvalidAsin(asin));
        }
        let mut metadata = self
            .metadata
            .fetch(&format!("{AMAZON_BASE}/dp/{asin}"))
            .await?;
        metadata.url = self.product_url(&asin);
        Ok(metadata)
    }
}
