use crate::core::{
    nights_between, AggregatedEntry, CacheEntry, PriceQuery, ReportedMetrics, SourceKey,
    SourceQuote,
};
use crate::domain::wire::RemoteComparison;
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;

/// Normalized live result: canonical entry plus display-only extras.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuote {
    pub entry: AggregatedEntry,
    pub extra_sources: Vec<SourceQuote>,
}

pub struct QuoteAggregator {
    discount_rate: f64,
}

impl QuoteAggregator {
    pub fn new(discount_rate: f64) -> Self {
        Self { discount_rate }
    }

    /// Maps backend results onto the canonical sources.
    pub fn normalize(&self, raw: RemoteComparison, query: &PriceQuery) -> NormalizedQuote {
        let mut prices: BTreeMap<SourceKey, f64> = BTreeMap::new();
        let mut extra_sources = Vec::new();

        for result in raw.results {
            if !(result.price_per_night.is_finite() && result.price_per_night > 0.0) {
                tracing::warn!(
                    "Dropping {} quote with non-positive price {}",
                    result.source,
                    result.price_per_night
                );
                continue;
            }

            let key = SourceKey::from_label(&result.source);
            let quote = SourceQuote {
                source_name: result.source,
                hotel_name: result.hotel_name,
                price_per_night: result.price_per_night,
                total_price: result.total_price,
                currency: result.currency,
                url: result.url,
                observed_at: result.last_updated,
            };

            match key {
                Some(key) => {
                    // 同一來源多筆結果時保留最低價
                    prices
                        .entry(key)
                        .and_modify(|price| *price = price.min(quote.price_per_night))
                        .or_insert(quote.price_per_night);
                }
                None => {
                    tracing::debug!("Source '{}' is not canonical, kept for display", quote.source_name);
                    extra_sources.push(quote);
                }
            }
        }

        let checkin = raw.checkin.unwrap_or(query.checkin);
        let checkout = raw.checkout.unwrap_or(query.checkout);
        let nights = raw
            .nights
            .filter(|n| *n > 0)
            .unwrap_or_else(|| nights_between(checkin, checkout));
        let destination = if raw.destination.trim().is_empty() {
            query.destination.clone()
        } else {
            raw.destination
        };
        let observed_at = raw.timestamp.unwrap_or_else(now_rfc3339);

        let entry = AggregatedEntry::new(
            destination,
            checkin,
            checkout,
            nights,
            observed_at,
            self.discount_rate,
        )
        .with_prices(prices)
        .with_reported(ReportedMetrics {
            lowest_price: raw.lowest_price,
            average_price: raw.average_price,
        });

        NormalizedQuote {
            entry,
            extra_sources,
        }
    }

    /// Converts a cache record into the canonical view.
    pub fn from_cache(
        &self,
        cached: &CacheEntry,
        generated_at: &str,
        query: &PriceQuery,
    ) -> AggregatedEntry {
        let prices: BTreeMap<SourceKey, f64> = cached
            .sources
            .iter()
            .filter_map(|(name, source)| match SourceKey::from_label(name) {
                Some(key) if source.price.is_finite() && source.price > 0.0 => {
                    Some((key, source.price))
                }
                _ => {
                    tracing::debug!("Skipping cached source '{}'", name);
                    None
                }
            })
            .collect();

        let checkin = cached.checkin.unwrap_or(query.checkin);
        let checkout = cached.checkout.unwrap_or(query.checkout);
        let nights = cached
            .nights
            .filter(|n| *n > 0)
            .unwrap_or_else(|| nights_between(checkin, checkout));

        AggregatedEntry::new(
            cached.destination.clone(),
            checkin,
            checkout,
            nights,
            generated_at,
            self.discount_rate,
        )
        .with_prices(prices)
        .with_reported(cached.metrics.unwrap_or_default())
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{SourcePrice, DEFAULT_DISCOUNT_RATE};
    use crate::domain::wire::RemoteResult;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn query() -> PriceQuery {
        PriceQuery::new("Cancun", date("2025-06-01"), date("2025-06-05"), 2, 1).unwrap()
    }

    fn result(source: &str, price: f64) -> RemoteResult {
        RemoteResult {
            source: source.to_string(),
            hotel_name: format!("Resort via {}", source),
            price_per_night: price,
            total_price: price * 4.0,
            currency: "USD".to_string(),
            url: "https://example.com".to_string(),
            last_updated: "2025-05-01T10:00:00".to_string(),
        }
    }

    fn comparison(results: Vec<RemoteResult>) -> RemoteComparison {
        RemoteComparison {
            destination: "Cancun".to_string(),
            checkin: Some(date("2025-06-01")),
            checkout: Some(date("2025-06-05")),
            nights: Some(4),
            results,
            lowest_price: None,
            average_price: None,
            timestamp: Some("2025-05-01T10:00:00".to_string()),
        }
    }

    #[test]
    fn test_normalize_maps_labels_and_keeps_unmatched_for_display() {
        let aggregator = QuoteAggregator::new(DEFAULT_DISCOUNT_RATE);
        let raw = comparison(vec![
            result("Booking.com", 165.0),
            result("Hotels.com", 172.5),
            result("Expedia", 142.5),
            result("Trivago", 120.0),
        ]);

        let normalized = aggregator.normalize(raw, &query());
        let entry = &normalized.entry;

        assert_eq!(entry.per_source_price().len(), 3);
        assert_eq!(entry.per_source_price().get(&SourceKey::Hotels), Some(&172.5));
        assert_eq!(entry.lowest_price(), Some(142.5));
        assert_eq!(entry.average_price(), Some(160.0));
        assert_eq!(entry.club_price(), Some(160.0 * 0.65));
        assert_eq!(normalized.extra_sources.len(), 1);
        assert_eq!(normalized.extra_sources[0].source_name, "Trivago");
        assert_eq!(entry.observed_at, "2025-05-01T10:00:00");
    }

    #[test]
    fn test_normalize_prefers_upstream_aggregates() {
        let aggregator = QuoteAggregator::new(DEFAULT_DISCOUNT_RATE);
        let mut raw = comparison(vec![result("Booking.com", 165.0), result("Expedia", 142.5)]);
        raw.lowest_price = Some(150.0);
        raw.average_price = Some(152.0);

        let entry = aggregator.normalize(raw, &query()).entry;

        assert_eq!(entry.lowest_price(), Some(150.0));
        assert_eq!(entry.average_price(), Some(152.0));
        assert!((entry.savings().unwrap() - (150.0 - 152.0 * 0.65)).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_keeps_lowest_per_source_and_drops_invalid_prices() {
        let aggregator = QuoteAggregator::new(DEFAULT_DISCOUNT_RATE);
        let mut raw = comparison(vec![
            result("Booking.com", 180.0),
            result("booking", 170.0),
            result("Expedia", 0.0),
            result("Despegar", -5.0),
        ]);
        raw.nights = None;
        raw.checkin = None;
        raw.checkout = None;

        let normalized = aggregator.normalize(raw, &query());
        let entry = normalized.entry;

        assert_eq!(entry.per_source_price().len(), 1);
        assert_eq!(entry.per_source_price().get(&SourceKey::Booking), Some(&170.0));
        assert_eq!(entry.nights, 4);
        assert!(normalized.extra_sources.is_empty());
    }

    #[test]
    fn test_normalize_empty_results_reports_nothing() {
        let aggregator = QuoteAggregator::new(DEFAULT_DISCOUNT_RATE);
        let entry = aggregator.normalize(comparison(vec![]), &query()).entry;

        assert_eq!(entry.lowest_price(), None);
        assert_eq!(entry.club_price(), None);
        assert_eq!(entry.savings(), None);
    }

    #[test]
    fn test_from_cache_uses_metrics_and_query_dates() {
        let aggregator = QuoteAggregator::new(DEFAULT_DISCOUNT_RATE);
        let mut sources = BTreeMap::new();
        sources.insert(
            "booking".to_string(),
            SourcePrice {
                price: 200.0,
                currency: Some("USD".to_string()),
            },
        );
        sources.insert(
            "expedia".to_string(),
            SourcePrice {
                price: 190.0,
                currency: None,
            },
        );
        let cached = CacheEntry {
            destination: "Cancun".to_string(),
            checkin: None,
            checkout: None,
            nights: None,
            sources,
            metrics: Some(ReportedMetrics {
                lowest_price: Some(190.0),
                average_price: Some(195.0),
            }),
        };

        let entry = aggregator.from_cache(&cached, "2025-05-01T00:00:00Z", &query());

        assert_eq!(entry.checkin, date("2025-06-01"));
        assert_eq!(entry.nights, 4);
        assert_eq!(entry.observed_at, "2025-05-01T00:00:00Z");
        assert!((entry.club_price().unwrap() - 126.75).abs() < 1e-9);
        assert!((entry.savings().unwrap() - 63.25).abs() < 1e-9);
    }
}
