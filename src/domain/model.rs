use crate::utils::error::{QuoteError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_stay};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_DISCOUNT_RATE: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Cache only, never touches the network.
    #[default]
    Static,
    /// Cache first for fast paint, then the live backend.
    Hybrid,
}

impl FromStr for ResolutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(ResolutionMode::Static),
            "hybrid" => Ok(ResolutionMode::Hybrid),
            other => Err(format!(
                "unknown mode '{}', expected 'static' or 'hybrid'",
                other
            )),
        }
    }
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMode::Static => f.write_str("static"),
            ResolutionMode::Hybrid => f.write_str("hybrid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub destination: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    #[serde(default = "default_guests")]
    pub guests: u32,
    #[serde(default = "default_rooms")]
    pub rooms: u32,
}

fn default_guests() -> u32 {
    2
}

fn default_rooms() -> u32 {
    1
}

impl PriceQuery {
    pub fn new(
        destination: impl Into<String>,
        checkin: NaiveDate,
        checkout: NaiveDate,
        guests: u32,
        rooms: u32,
    ) -> Result<Self> {
        let query = Self {
            destination: destination.into(),
            checkin,
            checkout,
            guests,
            rooms,
        };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<()> {
        validate_non_empty_string("destination", &self.destination)
            .map_err(|_| QuoteError::validation("destination cannot be empty"))?;
        validate_stay(self.checkin, self.checkout)?;
        if self.guests == 0 || self.rooms == 0 {
            return Err(QuoteError::validation("guests and rooms must be at least 1"));
        }
        Ok(())
    }

    pub fn nights(&self) -> u32 {
        nights_between(self.checkin, self.checkout)
    }
}

/// Whole-day count between two dates, never below one.
pub fn nights_between(checkin: NaiveDate, checkout: NaiveDate) -> u32 {
    let days = (checkout - checkin).num_days();
    days.max(1) as u32
}

/// Canonical pricing sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKey {
    Booking,
    Expedia,
    Hotels,
    Despegar,
}

impl SourceKey {
    pub const ALL: [SourceKey; 4] = [
        SourceKey::Booking,
        SourceKey::Expedia,
        SourceKey::Hotels,
        SourceKey::Despegar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKey::Booking => "booking",
            SourceKey::Expedia => "expedia",
            SourceKey::Hotels => "hotels",
            SourceKey::Despegar => "despegar",
        }
    }

    /// Case-insensitive substring match, e.g. "Booking.com" -> booking.
    pub fn from_label(label: &str) -> Option<Self> {
        let lowered = label.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|key| lowered.contains(key.as_str()))
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuote {
    pub source_name: String,
    pub hotel_name: String,
    pub price_per_night: f64,
    pub total_price: f64,
    pub currency: String,
    pub url: String,
    pub observed_at: String,
}

/// Aggregate figures an upstream already computed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportedMetrics {
    pub lowest_price: Option<f64>,
    pub average_price: Option<f64>,
}

/// Canonical per-query price view handed to the presentation layer.
///
/// Derived figures are recomputed every time a source price changes. Upstream
/// reported metrics win over the computed ones until the map is touched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedEntry {
    pub destination: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub nights: u32,
    pub observed_at: String,
    per_source_price: BTreeMap<SourceKey, f64>,
    lowest_price: Option<f64>,
    average_price: Option<f64>,
    club_price: Option<f64>,
    savings: Option<f64>,
    #[serde(skip)]
    reported: ReportedMetrics,
    #[serde(skip)]
    discount_rate: f64,
}

impl AggregatedEntry {
    pub fn new(
        destination: impl Into<String>,
        checkin: NaiveDate,
        checkout: NaiveDate,
        nights: u32,
        observed_at: impl Into<String>,
        discount_rate: f64,
    ) -> Self {
        let mut entry = Self {
            destination: destination.into(),
            checkin,
            checkout,
            nights,
            observed_at: observed_at.into(),
            per_source_price: BTreeMap::new(),
            lowest_price: None,
            average_price: None,
            club_price: None,
            savings: None,
            reported: ReportedMetrics::default(),
            discount_rate,
        };
        entry.recompute();
        entry
    }

    pub fn with_prices(mut self, prices: BTreeMap<SourceKey, f64>) -> Self {
        self.per_source_price = prices;
        self.recompute();
        self
    }

    pub fn with_reported(mut self, reported: ReportedMetrics) -> Self {
        self.reported = reported;
        self.recompute();
        self
    }

    /// Sets one source price; drops upstream-reported metrics.
    pub fn set_source_price(&mut self, source: SourceKey, price: f64) {
        self.per_source_price.insert(source, price);
        self.reported = ReportedMetrics::default();
        self.recompute();
    }

    pub fn remove_source(&mut self, source: SourceKey) -> Option<f64> {
        let removed = self.per_source_price.remove(&source);
        if removed.is_some() {
            self.reported = ReportedMetrics::default();
            self.recompute();
        }
        removed
    }

    pub fn per_source_price(&self) -> &BTreeMap<SourceKey, f64> {
        &self.per_source_price
    }

    pub fn lowest_price(&self) -> Option<f64> {
        self.lowest_price
    }

    pub fn average_price(&self) -> Option<f64> {
        self.average_price
    }

    pub fn club_price(&self) -> Option<f64> {
        self.club_price
    }

    pub fn savings(&self) -> Option<f64> {
        self.savings
    }

    fn recompute(&mut self) {
        let prices: Vec<f64> = self.per_source_price.values().copied().collect();

        let computed_lowest = prices.iter().copied().reduce(f64::min);
        let computed_average = if prices.is_empty() {
            None
        } else {
            Some(prices.iter().sum::<f64>() / prices.len() as f64)
        };

        self.lowest_price = self.reported.lowest_price.or(computed_lowest);
        self.average_price = self.reported.average_price.or(computed_average);
        self.club_price = self.average_price.map(|avg| club_price(avg, self.discount_rate));
        self.savings = match (self.lowest_price, self.club_price) {
            (Some(lowest), Some(club)) if lowest > 0.0 => Some(lowest - club),
            _ => None,
        };
    }
}

/// Member price derived from the average public price.
pub fn club_price(average_price: f64, discount_rate: f64) -> f64 {
    average_price * (1.0 - discount_rate)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePrice {
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkin: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nights: Option<u32>,
    #[serde(default)]
    pub sources: BTreeMap<String, SourcePrice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ReportedMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub generated_at: String,
    #[serde(default)]
    pub entries: Vec<CacheEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    CacheOnly,
    LiveAuthoritative,
    CacheFallbackAfterError,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub outcome: Outcome,
    pub entry: Option<AggregatedEntry>,
    /// Quotes from sources outside the canonical set, display only.
    pub extra_sources: Vec<SourceQuote>,
    pub status: String,
    pub error: Option<String>,
}

/// One item of the ordered (at most two) delivery sequence of a resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Delivery {
    Fast(AggregatedEntry),
    Final(Resolution),
}
