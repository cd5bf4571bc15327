use crate::domain::model::{ResolutionMode, SourceKey, DEFAULT_CURRENCY, DEFAULT_DISCOUNT_RATE};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_CACHE_LOCATION: &str = "prices-cache.json";
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Process-wide configuration. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: ResolutionMode,
    /// Local path or http(s) URL of the cache snapshot.
    pub cache_location: String,
    pub primary_endpoint: Option<String>,
    pub fallback_endpoint: Option<String>,
    pub health_endpoint: Option<String>,
    pub probe_health: bool,
    pub timeout: Duration,
    pub discount_rate: f64,
    pub refresh_secret: Option<String>,
    pub generator: GeneratorSettings,
    pub bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: ResolutionMode::Static,
            cache_location: DEFAULT_CACHE_LOCATION.to_string(),
            primary_endpoint: None,
            fallback_endpoint: None,
            health_endpoint: None,
            probe_health: false,
            timeout: DEFAULT_TIMEOUT,
            discount_rate: DEFAULT_DISCOUNT_RATE,
            refresh_secret: None,
            generator: GeneratorSettings::default(),
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl Settings {
    /// Explicit health endpoint, else the root of the primary endpoint's origin.
    pub fn health_url(&self) -> Option<String> {
        if let Some(explicit) = &self.health_endpoint {
            return Some(explicit.clone());
        }
        let primary = Url::parse(self.primary_endpoint.as_deref()?).ok()?;
        primary.join("/").ok().map(|url| url.to_string())
    }

    pub fn live_enabled(&self) -> bool {
        self.mode == ResolutionMode::Hybrid && self.primary_endpoint.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceBand {
    pub low: f64,
    pub high: f64,
}

impl VarianceBand {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub destination: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub currency: String,
    pub default_base_price: f64,
    /// Keyed by lower-cased destination.
    pub base_prices: BTreeMap<String, f64>,
    pub variance: BTreeMap<SourceKey, VarianceBand>,
    pub presets: Vec<Preset>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        let base_prices = [("cancun", 180.0), ("cabo san lucas", 210.0), ("punta cana", 160.0)]
            .into_iter()
            .map(|(name, price)| (name.to_string(), price))
            .collect();

        let variance = [
            (SourceKey::Booking, VarianceBand::new(0.97, 1.05)),
            (SourceKey::Expedia, VarianceBand::new(0.95, 1.03)),
            (SourceKey::Hotels, VarianceBand::new(0.98, 1.06)),
            (SourceKey::Despegar, VarianceBand::new(0.96, 1.04)),
        ]
        .into_iter()
        .collect();

        let presets = [
            ("Cancun", (2025, 6, 1), (2025, 6, 5)),
            ("Cabo San Lucas", (2025, 6, 10), (2025, 6, 14)),
            ("Punta Cana", (2025, 7, 1), (2025, 7, 6)),
        ]
        .into_iter()
        .filter_map(|(destination, (y1, m1, d1), (y2, m2, d2))| {
            Some(Preset {
                destination: destination.to_string(),
                checkin: NaiveDate::from_ymd_opt(y1, m1, d1)?,
                checkout: NaiveDate::from_ymd_opt(y2, m2, d2)?,
            })
        })
        .collect();

        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            default_base_price: 190.0,
            base_prices,
            variance,
            presets,
        }
    }
}
