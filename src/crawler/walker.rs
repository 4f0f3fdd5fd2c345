//! Category walker
//!
//! Enumerates the category index and follows each category's paginated
//! listings, yielding detail URLs in (category, page, in-page) order. This
//! order is what makes id assignment reproducible across runs.
//!
//! The walker knows nothing about checkpoints; restarting it always starts
//! from the first category.

use crate::crawler::fetcher::{FetchError, PageSource};
use crate::crawler::parser::{parse_category_index, parse_listing_page, Category};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A detail URL together with the category it was listed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLink {
    pub category: String,
    pub detail_url: String,
}

/// Counters kept while walking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Categories entered so far
    pub categories_started: usize,

    /// Listing pages fetched successfully
    pub listing_pages: usize,

    /// Categories cut short by a failed listing fetch or a pagination loop
    pub categories_cut_short: usize,
}

/// Progress through one category
#[derive(Debug)]
struct CategoryCursor {
    category: Category,
    pending: VecDeque<String>,
    next_page: Option<Url>,
    visited: HashSet<Url>,
}

impl CategoryCursor {
    fn new(category: Category) -> Self {
        Self {
            next_page: Some(category.url.clone()),
            category,
            pending: VecDeque::new(),
            visited: HashSet::new(),
        }
    }
}

/// Lazy, pull-based walk over every category's listings
///
/// Listing pages are fetched only when the detail URLs from the previous
/// page have all been handed out, so stopping early never fetches pages
/// that are not needed.
#[derive(Debug)]
pub struct CategoryWalker {
    categories: Vec<Category>,
    position: usize,
    current: Option<CategoryCursor>,
    stats: WalkStats,
}

impl CategoryWalker {
    /// Fetches the category index from `index_url` and prepares the walk
    ///
    /// # Returns
    ///
    /// * `Ok(CategoryWalker)` - Walker positioned before the first category
    /// * `Err(FetchError)` - The index page could not be fetched
    pub async fn start<S: PageSource>(source: &mut S, index_url: &Url) -> Result<Self, FetchError> {
        let body = source.fetch(index_url.as_str()).await?;
        let categories = parse_category_index(&body, index_url);
        tracing::info!("Found {} categories", categories.len());
        Ok(Self::from_categories(categories))
    }

    /// Prepares a walk over an already known category list
    pub fn from_categories(categories: Vec<Category>) -> Self {
        Self {
            categories,
            position: 0,
            current: None,
            stats: WalkStats::default(),
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    /// Returns the next detail URL, fetching listing pages as needed
    ///
    /// Returns `None` once every category is exhausted. A listing page that
    /// cannot be fetched, or a "next" link pointing back to a page already
    /// visited in the same category, ends that category with a warning and
    /// the walk moves on.
    pub async fn next<S: PageSource>(&mut self, source: &mut S) -> Option<DetailLink> {
        loop {
            let Some(cursor) = self.current.as_mut() else {
                let category = self.categories.get(self.position)?.clone();
                self.position += 1;
                self.stats.categories_started += 1;
                tracing::info!(
                    "Category {}/{}: {} -> {}",
                    self.position,
                    self.categories.len(),
                    category.name,
                    category.url
                );
                self.current = Some(CategoryCursor::new(category));
                continue;
            };

            if let Some(detail_url) = cursor.pending.pop_front() {
                return Some(DetailLink {
                    category: cursor.category.name.clone(),
                    detail_url,
                });
            }

            let Some(page_url) = cursor.next_page.take() else {
                self.current = None;
                continue;
            };

            if !cursor.visited.insert(page_url.clone()) {
                tracing::warn!(
                    "Pagination loop in category {}: {} was already visited, skipping rest of category",
                    cursor.category.name,
                    page_url
                );
                self.stats.categories_cut_short += 1;
                self.current = None;
                continue;
            }

            match source.fetch(page_url.as_str()).await {
                Ok(body) => {
                    let listing = parse_listing_page(&body, &page_url);
                    tracing::debug!(
                        "Listing page {}: {} items, next: {:?}",
                        page_url,
                        listing.items.len(),
                        listing.next_page.as_ref().map(Url::as_str)
                    );
                    self.stats.listing_pages += 1;
                    cursor.pending.extend(listing.items);
                    cursor.next_page = listing.next_page;
                }
                Err(e) => {
                    tracing::warn!(
                        "Category {} failed and will be skipped: {}",
                        cursor.category.name,
                        e
                    );
                    self.stats.categories_cut_short += 1;
                    self.current = None;
                }
            }
        }
    }
}
