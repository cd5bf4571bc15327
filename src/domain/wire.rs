// Wire shapes of the live backend contract.

use crate::domain::model::{PriceQuery, DEFAULT_CURRENCY};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub destination: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub guests: u32,
    pub rooms: u32,
}

impl From<&PriceQuery> for QuoteRequest {
    fn from(query: &PriceQuery) -> Self {
        Self {
            destination: query.destination.trim().to_string(),
            checkin: query.checkin,
            checkout: query.checkout,
            guests: query.guests,
            rooms: query.rooms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResult {
    pub source: String,
    #[serde(default)]
    pub hotel_name: String,
    pub price_per_night: f64,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub last_updated: String,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteComparison {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub checkin: Option<NaiveDate>,
    #[serde(default)]
    pub checkout: Option<NaiveDate>,
    #[serde(default)]
    pub nights: Option<u32>,
    #[serde(default)]
    pub results: Vec<RemoteResult>,
    #[serde(default)]
    pub lowest_price: Option<f64>,
    #[serde(default)]
    pub average_price: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online")
    }
}
