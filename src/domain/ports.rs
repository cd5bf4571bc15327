use crate::domain::model::{Delivery, PriceQuery};
use crate::domain::wire::{HealthStatus, RemoteComparison};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Read-only access to the cache artifact.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// Live price backend.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quotes(&self, query: &PriceQuery) -> Result<RemoteComparison>;
    async fn health(&self) -> Result<HealthStatus>;
}

/// Receives the fast cache result and the final resolution, in that order.
pub trait ResolutionObserver: Send + Sync {
    fn deliver(&self, delivery: Delivery);
}

/// Observer that drops everything; used when only the final value matters.
pub struct NoopObserver;

impl ResolutionObserver for NoopObserver {
    fn deliver(&self, _delivery: Delivery) {}
}

impl ResolutionObserver for mpsc::Sender<Delivery> {
    fn deliver(&self, delivery: Delivery) {
        // 通道容量為 2，每次解析最多送出兩筆
        if let Err(e) = self.try_send(delivery) {
            tracing::warn!("Dropped resolution delivery: {}", e);
        }
    }
}
