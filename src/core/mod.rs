// Core layer: resolution logic built on the domain ports.

pub mod aggregator;
pub mod cache_store;
pub mod refresh;
pub mod resolution;
pub mod savings;
pub mod source_generator;

pub use crate::domain::model::{
    nights_between, round2, AggregatedEntry, CacheEntry, CacheSnapshot, Delivery, Outcome,
    PriceQuery, ReportedMetrics, Resolution, ResolutionMode, SourceKey, SourcePrice, SourceQuote,
};
pub use crate::domain::ports::{NoopObserver, QuoteSource, ResolutionObserver, Storage};
pub use crate::utils::error::{QuoteError, Result};

pub use aggregator::{NormalizedQuote, QuoteAggregator};
pub use cache_store::StaticCacheStore;
pub use refresh::{RefreshAuthority, RefreshRequest, RefreshResponse};
pub use resolution::ResolutionPipeline;
pub use savings::{SavingsProjection, SavingsScenario};
pub use source_generator::SourceGenerator;
