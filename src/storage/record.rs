//! Item record types written to the output dataset

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Currency amount held as integer cents
///
/// Always rendered with exactly two fraction digits ("51.77", "10.00").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price {
    cents: u64,
}

/// Error returned when a price string is not a plain decimal amount
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid price amount: {0:?}")]
pub struct InvalidPrice(pub String);

impl Price {
    pub fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    pub fn cents(&self) -> u64 {
        self.cents
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl FromStr for Price {
    type Err = InvalidPrice;

    /// Parses `123`, `123.4`, `123.45`, or the same with `,` as the decimal
    /// separator. Signs, grouping, and more than two fraction digits are
    /// rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPrice(s.to_string());
        let text = s.trim();

        let (whole, fraction) = match text.find(|c: char| c == '.' || c == ',') {
            Some(pos) => (&text[..pos], &text[pos + 1..]),
            None => (text, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) || fraction.len() > 2
        {
            return Err(invalid());
        }
        if text.len() > whole.len() && fraction.is_empty() {
            // trailing separator, e.g. "12."
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let fraction: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .map(Price::from_cents)
            .ok_or_else(invalid)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Attributes of one item as extracted from its detail page
///
/// Everything an `ItemRecord` carries except the synthetic `id`, which only
/// the checkpoint store assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDetails {
    pub title: String,
    pub price: Price,
    pub rating: u8,
    pub availability: u32,
    pub category: String,
    pub image_url: String,
    pub detail_url: String,
}

/// One row of the output dataset
///
/// Field order here is the column order of the CSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: u64,
    pub title: String,
    pub price: Price,
    pub rating: u8,
    pub availability: u32,
    pub category: String,
    pub image_url: String,
    pub detail_url: String,
}

impl ItemRecord {
    pub fn from_details(id: u64, details: ItemDetails) -> Self {
        Self {
            id,
            title: details.title,
            price: details.price,
            rating: details.rating,
            availability: details.availability,
            category: details.category,
            image_url: details.image_url,
            detail_url: details.detail_url,
        }
    }
}
