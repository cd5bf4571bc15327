// Adapters layer: concrete implementations for external systems (storage, http).

pub mod http_client;
pub mod storage;

pub use http_client::RemoteQuoteClient;
pub use storage::{CacheStorage, HttpStorage, LocalStorage};
