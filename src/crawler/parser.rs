//! HTML parser for catalog pages
//!
//! Pure functions over page content. Three page shapes are understood:
//! - The home page, whose sidebar lists every category
//! - A category listing page: item links plus an optional "next" link
//! - An item detail page: title, price, rating, stock, and cover image
//!
//! Relative links are resolved against the URL the page was fetched from.

use crate::storage::{ItemDetails, Price};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

const CATEGORY_LINKS: &str = ".side_categories ul li ul li a";
const LISTING_ITEMS: &str = "article.product_pod h3 a";
const NEXT_PAGE: &str = "li.next a";
const DETAIL_TITLE: &str = ".product_main h1";
const DETAIL_PRICE: &str = ".product_main .price_color";
const DETAIL_RATING: &str = ".product_main p.star-rating";
const DETAIL_AVAILABILITY: &str = ".product_main .availability";
const DETAIL_IMAGE: &str = "#product_gallery img";

/// A detail page did not have the structure a required field needs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("malformed value for `{field}`: {value:?}")]
    Malformed { field: &'static str, value: String },
}

impl ParseError {
    /// Name of the field that failed
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::Malformed { field, .. } => field,
        }
    }
}

/// One entry of the category index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub url: Url,
}

/// Extracted contents of a category listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Absolute detail URLs in page order
    pub items: Vec<String>,

    /// Absolute URL of the following listing page, if any
    pub next_page: Option<Url>,
}

/// Extracts the category index from the catalog home page
///
/// Categories come back in page order. A category URL that appears more
/// than once keeps its first occurrence.
///
/// # Example
///
/// ```
/// use catalog_harvester::crawler::parse_category_index;
/// use url::Url;
///
/// let html = r#"<div class="side_categories"><ul><li><a href="books_1/index.html">Books</a>
///   <ul><li><a href="travel_2/index.html"> Travel </a></li></ul></li></ul></div>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let categories = parse_category_index(html, &base);
/// assert_eq!(categories.len(), 1);
/// assert_eq!(categories[0].name, "Travel");
/// ```
pub fn parse_category_index(html: &str, base_url: &Url) -> Vec<Category> {
    let document = Html::parse_document(html);
    let mut categories: Vec<Category> = Vec::new();

    for element in select_all(&document, CATEGORY_LINKS) {
        let name = element_text(&element);
        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if name.is_empty() {
            continue;
        }

        if categories.iter().any(|c| c.url == url) {
            tracing::debug!("Duplicate category link {} ignored", url);
            continue;
        }

        categories.push(Category { name, url });
    }

    categories
}

/// Extracts item links and the next-page link from a listing page
///
/// A page with no items yields an empty listing with no next page, which
/// also ends pagination for that category.
pub fn parse_listing_page(html: &str, page_url: &Url) -> ListingPage {
    let document = Html::parse_document(html);

    let items: Vec<String> = select_all(&document, LISTING_ITEMS)
        .into_iter()
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, page_url))
        .map(String::from)
        .collect();

    if items.is_empty() {
        return ListingPage::default();
    }

    let next_page = select_first(&document, NEXT_PAGE)
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| resolve_link(href, page_url));

    ListingPage { items, next_page }
}

/// Extracts one item's attributes from its detail page
///
/// Title, price, and rating are required. Availability is best-effort:
/// text without a number reads as 0 (out of stock). A missing cover image
/// leaves `image_url` empty.
///
/// # Arguments
///
/// * `html` - The detail page content
/// * `page_url` - The detail URL; becomes the record's `detail_url`
/// * `category` - Name of the category the item was listed under
pub fn parse_item_detail(
    html: &str,
    page_url: &Url,
    category: &str,
) -> Result<ItemDetails, ParseError> {
    let document = Html::parse_document(html);

    let title = select_first(&document, DETAIL_TITLE)
        .map(|element| element_text(&element))
        .filter(|title| !title.is_empty())
        .ok_or(ParseError::MissingField { field: "title" })?;

    let price_text = select_first(&document, DETAIL_PRICE)
        .map(|element| element_text(&element))
        .ok_or(ParseError::MissingField { field: "price" })?;
    let price = parse_price(&price_text)?;

    let rating_element = select_first(&document, DETAIL_RATING)
        .ok_or(ParseError::MissingField { field: "rating" })?;
    let rating = parse_rating(&rating_element)?;

    let availability = select_first(&document, DETAIL_AVAILABILITY)
        .map(|element| parse_availability(&element_text(&element)))
        .unwrap_or(0);

    let image_url = select_first(&document, DETAIL_IMAGE)
        .and_then(|element| element.value().attr("src"))
        .and_then(|src| resolve_link(src, page_url))
        .map(String::from)
        .unwrap_or_default();

    Ok(ItemDetails {
        title,
        price,
        rating,
        availability,
        category: category.to_string(),
        image_url,
        detail_url: page_url.to_string(),
    })
}

/// Reads the amount out of a formatted price such as `£51.77`
fn parse_price(text: &str) -> Result<Price, ParseError> {
    let malformed = || ParseError::Malformed {
        field: "price",
        value: text.to_string(),
    };

    let start = text.find(|c: char| c.is_ascii_digit()).ok_or_else(malformed)?;
    let amount: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    amount.parse().map_err(|_| malformed())
}

/// Decodes the word class on the star-rating element (`One` .. `Five`)
fn parse_rating(element: &ElementRef) -> Result<u8, ParseError> {
    element
        .value()
        .classes()
        .find_map(|class| match class {
            "Zero" => Some(0),
            "One" => Some(1),
            "Two" => Some(2),
            "Three" => Some(3),
            "Four" => Some(4),
            "Five" => Some(5),
            _ => None,
        })
        .ok_or_else(|| ParseError::Malformed {
            field: "rating",
            value: element.value().attr("class").unwrap_or_default().to_string(),
        })
}

/// First integer embedded in free text, or 0 when there is none
fn parse_availability(text: &str) -> u32 {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .and_then(|run| run.parse().ok())
        .unwrap_or(0)
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

/// Collapses an element's text nodes into single-spaced, trimmed text
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves an href to an absolute http(s) URL
///
/// Returns None for empty hrefs, fragment-only links, and
/// javascript:/mailto:/tel:/data: schemes.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url)
}
