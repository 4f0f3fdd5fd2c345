//! In-memory catalog used by crawler unit tests

use crate::crawler::fetcher::{FetchError, FetchFailure, PageSource};
use std::collections::HashMap;

/// Serves fixed pages by URL and records every request
///
/// Unknown URLs fail like a 404 that survived all retries.
#[derive(Debug, Default)]
pub(crate) struct StaticSite {
    pages: HashMap<String, String>,
    requests: Vec<String>,
}

impl StaticSite {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, url: &str, body: impl Into<String>) {
        self.pages.insert(url.to_string(), body.into());
    }

    pub(crate) fn remove(&mut self, url: &str) {
        self.pages.remove(url);
    }

    pub(crate) fn request_count(&self, url: &str) -> usize {
        self.requests.iter().filter(|r| r.as_str() == url).count()
    }

    pub(crate) fn requests(&self) -> &[String] {
        &self.requests
    }
}

impl PageSource for StaticSite {
    async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        self.requests.push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| FetchError {
            url: url.to_string(),
            attempts: 1,
            cause: FetchFailure::Status(404),
        })
    }
}

pub(crate) fn category_index_html(categories: &[(&str, &str)]) -> String {
    let entries: String = categories
        .iter()
        .map(|(name, href)| format!(r#"<li><a href="{href}">{name}</a></li>"#))
        .collect();
    format!(
        r#"<html><body><div class="side_categories"><ul><li><a href="books/index.html">Books</a><ul>{entries}</ul></li></ul></div></body></html>"#
    )
}

pub(crate) fn listing_html(items: &[&str], next: Option<&str>) -> String {
    let articles: String = items
        .iter()
        .map(|href| {
            format!(r#"<li><article class="product_pod"><h3><a href="{href}">x</a></h3></article></li>"#)
        })
        .collect();
    let pager = next
        .map(|href| format!(r#"<ul class="pager"><li class="next"><a href="{href}">next</a></li></ul>"#))
        .unwrap_or_default();
    format!(r#"<html><body><ol class="row">{articles}</ol>{pager}</body></html>"#)
}

pub(crate) fn detail_html(title: &str, price: &str, rating: &str, availability: &str) -> String {
    format!(
        r#"<html><body>
<div id="product_gallery"><img src="cover.jpg" /></div>
<div class="product_main">
  <h1>{title}</h1>
  <p class="price_color">{price}</p>
  <p class="instock availability">{availability}</p>
  <p class="star-rating {rating}"></p>
</div>
</body></html>"#
    )
}
