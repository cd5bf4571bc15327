use crate::config::Settings;
use crate::core::aggregator::{NormalizedQuote, QuoteAggregator};
use crate::core::cache_store::{find_entry, StaticCacheStore};
use crate::core::{
    AggregatedEntry, Delivery, NoopObserver, Outcome, PriceQuery, QuoteError, QuoteSource,
    Resolution, ResolutionMode, ResolutionObserver, Result, Storage,
};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    CacheLookup,
    StaticDone,
    RemoteAttempt,
    RemoteDone,
    FallbackToCache,
}

/// Cache first, then the live backend when the mode allows it.
///
/// Each call loads its own snapshot and owns its values; nothing is shared
/// between concurrent resolutions except the read-only settings.
pub struct ResolutionPipeline<S: Storage, Q: QuoteSource> {
    cache: StaticCacheStore<S>,
    remote: Q,
    aggregator: QuoteAggregator,
    settings: Arc<Settings>,
}

impl<S: Storage, Q: QuoteSource> ResolutionPipeline<S, Q> {
    pub fn new(cache: StaticCacheStore<S>, remote: Q, settings: Arc<Settings>) -> Self {
        Self {
            cache,
            remote,
            aggregator: QuoteAggregator::new(settings.discount_rate),
            settings,
        }
    }

    pub async fn resolve(&self, query: &PriceQuery) -> Resolution {
        self.resolve_observed(query, &NoopObserver).await
    }

    /// Delivers the fast cache result (if any) and then the final resolution.
    pub async fn resolve_observed(
        &self,
        query: &PriceQuery,
        observer: &dyn ResolutionObserver,
    ) -> Resolution {
        let resolution = self.run(query, observer).await;
        tracing::info!(
            "✅ {} resolved as {:?}: {}",
            query.destination,
            resolution.outcome,
            resolution.status
        );
        observer.deliver(Delivery::Final(resolution.clone()));
        resolution
    }

    async fn run(&self, query: &PriceQuery, observer: &dyn ResolutionObserver) -> Resolution {
        trace_stage(Stage::Init, query);
        if let Err(e) = query.validate() {
            return Resolution {
                outcome: Outcome::Unavailable,
                entry: None,
                extra_sources: Vec::new(),
                status: "Invalid search".to_string(),
                error: Some(e.to_string()),
            };
        }
        let mode = self.settings.mode;

        trace_stage(Stage::CacheLookup, query);
        let cached = self.lookup_cache(query).await;
        if let Some(entry) = &cached {
            observer.deliver(Delivery::Fast(entry.clone()));
        }

        if mode == ResolutionMode::Static {
            trace_stage(Stage::StaticDone, query);
            return match cached {
                Some(entry) => Resolution {
                    status: format!("Cached prices from {}", entry.observed_at),
                    outcome: Outcome::CacheOnly,
                    entry: Some(entry),
                    extra_sources: Vec::new(),
                    error: None,
                },
                None => Resolution {
                    outcome: Outcome::Unavailable,
                    entry: None,
                    extra_sources: Vec::new(),
                    status: format!("No cached prices for {}", query.destination.trim()),
                    error: None,
                },
            };
        }

        trace_stage(Stage::RemoteAttempt, query);
        match self.attempt_remote(query).await {
            Ok(normalized) => {
                trace_stage(Stage::RemoteDone, query);
                Resolution {
                    outcome: Outcome::LiveAuthoritative,
                    status: format!("Live prices as of {}", normalized.entry.observed_at),
                    entry: Some(normalized.entry),
                    extra_sources: normalized.extra_sources,
                    error: None,
                }
            }
            Err(e) => {
                trace_stage(Stage::FallbackToCache, query);
                tracing::warn!("⚠️ Live resolution failed for {}: {}", query.destination, e);
                // 遠端失敗只回退到快取，不產生模擬資料
                match cached {
                    Some(entry) => Resolution {
                        outcome: Outcome::CacheFallbackAfterError,
                        status: format!(
                            "Live prices unavailable, showing cached prices from {}",
                            entry.observed_at
                        ),
                        entry: Some(entry),
                        extra_sources: Vec::new(),
                        error: Some(e.user_friendly_message()),
                    },
                    None => Resolution {
                        outcome: Outcome::Unavailable,
                        entry: None,
                        extra_sources: Vec::new(),
                        status: format!("No prices available for {}", query.destination.trim()),
                        error: Some(e.user_friendly_message()),
                    },
                }
            }
        }
    }

    async fn lookup_cache(&self, query: &PriceQuery) -> Option<AggregatedEntry> {
        let snapshot = self.cache.load().await?;
        let cached = find_entry(&snapshot, &query.destination, query.checkin, query.checkout)?;
        tracing::debug!("Cache hit for {} in {}", cached.destination, self.cache.location());
        Some(
            self.aggregator
                .from_cache(cached, &snapshot.generated_at, query),
        )
    }

    async fn attempt_remote(&self, query: &PriceQuery) -> Result<NormalizedQuote> {
        if self.settings.probe_health {
            let health = self.remote.health().await?;
            if !health.is_online() {
                return Err(QuoteError::ModeUnavailable {
                    reason: format!("backend reports status '{}'", health.status),
                });
            }
        }

        let raw = self.remote.fetch_quotes(query).await?;
        Ok(self.aggregator.normalize(raw, query))
    }
}

impl<S, Q> ResolutionPipeline<S, Q>
where
    S: Storage + 'static,
    Q: QuoteSource + 'static,
{
    /// Runs the resolution on a task; the receiver yields at most two items,
    /// the fast cache result strictly before the final one.
    pub fn resolve_stream(self: Arc<Self>, query: PriceQuery) -> mpsc::Receiver<Delivery> {
        let (tx, rx) = mpsc::channel(2);
        tokio::spawn(async move {
            self.resolve_observed(&query, &tx).await;
        });
        rx
    }
}

fn trace_stage(stage: Stage, query: &PriceQuery) {
    tracing::debug!("Resolution stage {:?} for {}", stage, query.destination);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::wire::{HealthStatus, RemoteComparison, RemoteResult};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MemoryStorage {
        files: HashMap<String, Vec<u8>>,
    }

    impl Storage for MemoryStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files.get(path).cloned().ok_or_else(|| {
                QuoteError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }
    }

    enum Reply {
        Live(f64),
        Upstream,
        Timeout,
    }

    struct CountingSource {
        calls: AtomicUsize,
        health_calls: AtomicUsize,
        reply: Reply,
        online: bool,
    }

    impl CountingSource {
        fn new(reply: Reply) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                health_calls: AtomicUsize::new(0),
                reply,
                online: true,
            }
        }
    }

    #[async_trait::async_trait]
    impl QuoteSource for CountingSource {
        async fn fetch_quotes(&self, query: &PriceQuery) -> Result<RemoteComparison> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Live(price) => Ok(RemoteComparison {
                    destination: query.destination.clone(),
                    checkin: Some(query.checkin),
                    checkout: Some(query.checkout),
                    nights: Some(query.nights()),
                    results: vec![
                        RemoteResult {
                            source: "Booking.com".to_string(),
                            hotel_name: "Dreams Resort".to_string(),
                            price_per_night: price,
                            total_price: price * 4.0,
                            currency: "USD".to_string(),
                            url: "https://booking.com".to_string(),
                            last_updated: "2025-05-02T00:00:00".to_string(),
                        },
                        RemoteResult {
                            source: "Agoda".to_string(),
                            hotel_name: "Secrets Resort".to_string(),
                            price_per_night: price + 10.0,
                            total_price: (price + 10.0) * 4.0,
                            currency: "USD".to_string(),
                            url: "https://agoda.com".to_string(),
                            last_updated: "2025-05-02T00:00:00".to_string(),
                        },
                    ],
                    lowest_price: Some(price),
                    average_price: Some(price),
                    timestamp: Some("2025-05-02T00:00:00".to_string()),
                }),
                Reply::Upstream => Err(QuoteError::UpstreamFailure {
                    endpoint: "http://fallback".to_string(),
                    status: 500,
                    detail: "boom".to_string(),
                }),
                Reply::Timeout => Err(QuoteError::TransportFailure {
                    endpoint: "http://primary".to_string(),
                    message: "operation timed out".to_string(),
                    timed_out: true,
                }),
            }
        }

        async fn health(&self) -> Result<HealthStatus> {
            self.health_calls.fetch_add(1, Ordering::SeqCst);
            Ok(HealthStatus {
                status: if self.online { "online" } else { "maintenance" }.to_string(),
                service: None,
                version: None,
                timestamp: None,
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        deliveries: Mutex<Vec<Delivery>>,
    }

    impl ResolutionObserver for RecordingObserver {
        fn deliver(&self, delivery: Delivery) {
            self.deliveries.lock().unwrap().push(delivery);
        }
    }

    const CANCUN_CACHE: &str = r#"{
        "generated_at": "2025-05-01T00:00:00Z",
        "entries": [{
            "destination": "Cancun",
            "sources": {"booking": {"price": 200}, "expedia": {"price": 190}},
            "metrics": {"lowest_price": 190, "average_price": 195}
        }]
    }"#;

    fn pipeline(
        cache: Option<&str>,
        mode: ResolutionMode,
        source: CountingSource,
        probe_health: bool,
    ) -> ResolutionPipeline<MemoryStorage, CountingSource> {
        let mut files = HashMap::new();
        if let Some(content) = cache {
            files.insert("prices-cache.json".to_string(), content.as_bytes().to_vec());
        }
        let settings = Arc::new(Settings {
            mode,
            probe_health,
            primary_endpoint: Some("http://primary/api/check-prices".to_string()),
            ..Settings::default()
        });
        ResolutionPipeline::new(
            StaticCacheStore::new(MemoryStorage { files }, "prices-cache.json"),
            source,
            settings,
        )
    }

    fn query(destination: &str) -> PriceQuery {
        PriceQuery::new(
            destination,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(),
            2,
            1,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_static_mode_serves_cache_without_remote() {
        let pipeline = pipeline(
            Some(CANCUN_CACHE),
            ResolutionMode::Static,
            CountingSource::new(Reply::Live(150.0)),
            true,
        );

        let resolution = pipeline.resolve(&query("Cancun")).await;

        assert_eq!(resolution.outcome, Outcome::CacheOnly);
        let entry = resolution.entry.unwrap();
        assert!((entry.club_price().unwrap() - 126.75).abs() < 1e-9);
        assert!((entry.savings().unwrap() - 63.25).abs() < 1e-9);
        assert_eq!(pipeline.remote.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.remote.health_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_static_mode_without_match_is_unavailable() {
        let pipeline = pipeline(
            Some(CANCUN_CACHE),
            ResolutionMode::Static,
            CountingSource::new(Reply::Live(150.0)),
            false,
        );

        let resolution = pipeline.resolve(&query("Cozumel")).await;

        assert_eq!(resolution.outcome, Outcome::Unavailable);
        assert!(resolution.entry.is_none());
        assert_eq!(pipeline.remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hybrid_live_result_overrides_fast_cache() {
        let pipeline = pipeline(
            Some(CANCUN_CACHE),
            ResolutionMode::Hybrid,
            CountingSource::new(Reply::Live(150.0)),
            false,
        );
        let observer = RecordingObserver::default();

        let resolution = pipeline.resolve_observed(&query("cancun"), &observer).await;

        assert_eq!(resolution.outcome, Outcome::LiveAuthoritative);
        assert_eq!(resolution.entry.as_ref().unwrap().lowest_price(), Some(150.0));
        assert_eq!(resolution.extra_sources.len(), 1);
        assert_eq!(pipeline.remote.calls.load(Ordering::SeqCst), 1);

        let deliveries = observer.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 2);
        match (&deliveries[0], &deliveries[1]) {
            (Delivery::Fast(fast), Delivery::Final(last)) => {
                assert_eq!(fast.lowest_price(), Some(190.0));
                assert_eq!(last.outcome, Outcome::LiveAuthoritative);
            }
            other => panic!("unexpected delivery order: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_unmodified_cache() {
        let pipeline = pipeline(
            Some(CANCUN_CACHE),
            ResolutionMode::Hybrid,
            CountingSource::new(Reply::Upstream),
            false,
        );
        let observer = RecordingObserver::default();

        let resolution = pipeline.resolve_observed(&query("Cancun"), &observer).await;

        assert_eq!(resolution.outcome, Outcome::CacheFallbackAfterError);
        assert!(resolution.error.unwrap().contains("boom"));

        let deliveries = observer.deliveries.lock().unwrap();
        let fast = match &deliveries[0] {
            Delivery::Fast(entry) => entry.clone(),
            other => panic!("expected fast delivery, got {:?}", other),
        };
        assert_eq!(resolution.entry, Some(fast));
    }

    #[tokio::test]
    async fn test_remote_failure_without_cache_is_unavailable_not_mock() {
        let pipeline = pipeline(
            None,
            ResolutionMode::Hybrid,
            CountingSource::new(Reply::Timeout),
            false,
        );
        let observer = RecordingObserver::default();

        let resolution = pipeline.resolve_observed(&query("Cancun"), &observer).await;

        assert_eq!(resolution.outcome, Outcome::Unavailable);
        assert!(resolution.entry.is_none());
        assert!(resolution.error.is_some());
        assert_eq!(observer.deliveries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_health_probe_skips_fetch() {
        let mut source = CountingSource::new(Reply::Live(150.0));
        source.online = false;
        let pipeline = pipeline(Some(CANCUN_CACHE), ResolutionMode::Hybrid, source, true);

        let resolution = pipeline.resolve(&query("Cancun")).await;

        assert_eq!(resolution.outcome, Outcome::CacheFallbackAfterError);
        assert_eq!(pipeline.remote.health_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_query_is_unavailable() {
        let pipeline = pipeline(
            Some(CANCUN_CACHE),
            ResolutionMode::Hybrid,
            CountingSource::new(Reply::Live(150.0)),
            false,
        );
        let mut bad = query("Cancun");
        bad.checkout = bad.checkin;

        let resolution = pipeline.resolve(&bad).await;

        assert_eq!(resolution.outcome, Outcome::Unavailable);
        assert!(resolution.error.is_some());
        assert_eq!(pipeline.remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stream_orders_fast_before_final() {
        let pipeline = Arc::new(pipeline(
            Some(CANCUN_CACHE),
            ResolutionMode::Hybrid,
            CountingSource::new(Reply::Live(150.0)),
            false,
        ));

        let mut rx = pipeline.resolve_stream(query("Cancun"));
        let mut received = Vec::new();
        while let Some(delivery) = rx.recv().await {
            received.push(delivery);
        }

        assert_eq!(received.len(), 2);
        assert!(matches!(received[0], Delivery::Fast(_)));
        assert!(matches!(
            &received[1],
            Delivery::Final(resolution) if resolution.outcome == Outcome::LiveAuthoritative
        ));
    }
}
