use crate::config::{GeneratorSettings, Preset};
use crate::core::{nights_between, round2, CacheEntry, ReportedMetrics, SourcePrice};
use chrono::NaiveDate;
use rand::Rng;
use std::collections::BTreeMap;

/// Synthesizes per-source nightly prices around a destination base price.
#[derive(Debug, Clone)]
pub struct SourceGenerator {
    settings: GeneratorSettings,
}

impl SourceGenerator {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self { settings }
    }

    pub fn presets(&self) -> &[Preset] {
        &self.settings.presets
    }

    pub fn base_price(&self, destination: &str) -> f64 {
        self.settings
            .base_prices
            .get(&destination.trim().to_lowercase())
            .copied()
            .unwrap_or(self.settings.default_base_price)
    }

    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        destination: &str,
        checkin: NaiveDate,
        checkout: NaiveDate,
    ) -> CacheEntry {
        let base = self.base_price(destination);
        let mut sources = BTreeMap::new();
        let mut collected = Vec::with_capacity(self.settings.variance.len());

        for (source, band) in &self.settings.variance {
            let factor = if band.high > band.low {
                rng.gen_range(band.low..=band.high)
            } else {
                band.low
            };
            let price = (base * factor).round();

            sources.insert(
                source.as_str().to_string(),
                SourcePrice {
                    price,
                    currency: Some(self.settings.currency.clone()),
                },
            );
            collected.push(price);
        }

        let lowest = collected.iter().copied().reduce(f64::min);
        let average = if collected.is_empty() {
            None
        } else {
            Some(round2(collected.iter().sum::<f64>() / collected.len() as f64))
        };

        tracing::debug!(
            "Generated {} mock prices for {} (base {})",
            collected.len(),
            destination,
            base
        );

        CacheEntry {
            destination: destination.to_string(),
            checkin: Some(checkin),
            checkout: Some(checkout),
            nights: Some(nights_between(checkin, checkout)),
            sources,
            metrics: Some(ReportedMetrics {
                lowest_price: lowest,
                average_price: average,
            }),
        }
    }

    /// One entry per configured preset, in preset order.
    pub fn generate_presets<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<CacheEntry> {
        self.settings
            .presets
            .iter()
            .map(|preset| self.generate(rng, &preset.destination, preset.checkin, preset.checkout))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VarianceBand;
    use crate::domain::model::SourceKey;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_base_price_lookup_is_case_insensitive() {
        let generator = SourceGenerator::new(GeneratorSettings::default());

        assert_eq!(generator.base_price("CANCUN"), 180.0);
        assert_eq!(generator.base_price("Cabo San Lucas"), 210.0);
        assert_eq!(generator.base_price("Cozumel"), 190.0);
    }

    #[test]
    fn test_generated_prices_stay_within_bands() {
        let settings = GeneratorSettings::default();
        let generator = SourceGenerator::new(settings.clone());

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let entry = generator.generate(&mut rng, "Cancun", date("2025-06-01"), date("2025-06-05"));

            assert_eq!(entry.nights, Some(4));
            assert_eq!(entry.sources.len(), 4);

            for (source, band) in &settings.variance {
                let price = entry.sources[source.as_str()].price;
                assert!(price >= (180.0 * band.low).round(), "{} below band", source);
                assert!(price <= (180.0 * band.high).round(), "{} above band", source);
                assert_eq!(price, price.round());
            }

            let prices: Vec<f64> = entry.sources.values().map(|s| s.price).collect();
            let metrics = entry.metrics.unwrap();
            let lowest = prices.iter().copied().fold(f64::INFINITY, f64::min);
            assert_eq!(metrics.lowest_price, Some(lowest));
            assert_eq!(
                metrics.average_price,
                Some(round2(prices.iter().sum::<f64>() / prices.len() as f64))
            );
        }
    }

    #[test]
    fn test_degenerate_band_is_deterministic() {
        let mut variance = BTreeMap::new();
        variance.insert(SourceKey::Booking, VarianceBand::new(1.0, 1.0));
        let generator = SourceGenerator::new(GeneratorSettings {
            variance,
            ..GeneratorSettings::default()
        });

        let mut rng = StdRng::seed_from_u64(7);
        let entry = generator.generate(&mut rng, "Punta Cana", date("2025-07-01"), date("2025-07-06"));

        assert_eq!(entry.sources["booking"].price, 160.0);
        assert_eq!(entry.nights, Some(5));
        assert_eq!(entry.sources["booking"].currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_generate_presets_in_order() {
        let generator = SourceGenerator::new(GeneratorSettings::default());
        let mut rng = StdRng::seed_from_u64(42);

        let entries = generator.generate_presets(&mut rng);
        let names: Vec<&str> = entries.iter().map(|e| e.destination.as_str()).collect();

        assert_eq!(names, vec!["Cancun", "Cabo San Lucas", "Punta Cana"]);
    }
}
