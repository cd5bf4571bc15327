pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub use config::Cli;

pub use adapters::{CacheStorage, RemoteQuoteClient};
pub use config::{Settings, TomlConfig};
pub use crate::core::{
    PriceQuery, RefreshAuthority, Resolution, ResolutionPipeline, SavingsScenario,
    StaticCacheStore,
};
pub use utils::error::{QuoteError, Result};

/// Pipeline wired to the production cache storage and live client.
pub type DefaultPipeline = ResolutionPipeline<CacheStorage, RemoteQuoteClient>;

/// Builds the production pipeline from resolved settings.
pub fn build_pipeline(settings: std::sync::Arc<Settings>) -> DefaultPipeline {
    let storage = CacheStorage::for_location(&settings.cache_location, settings.timeout);
    let cache = StaticCacheStore::new(storage, settings.cache_location.clone());
    let remote = RemoteQuoteClient::new(settings.clone());
    ResolutionPipeline::new(cache, remote, settings)
}
