use crate::domain::ports::Storage;
use crate::utils::error::{QuoteError, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = Path::new(&self.base_path).join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }
}

/// Reads the snapshot from a published URL, the way the static site serves it.
#[derive(Debug, Clone)]
pub struct HttpStorage {
    client: Client,
    timeout: Duration,
}

impl HttpStorage {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

impl Storage for HttpStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        tracing::debug!("Fetching cache snapshot from: {}", path);

        let response = self
            .client
            .get(path)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| QuoteError::transport(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuoteError::UpstreamFailure {
                endpoint: path.to_string(),
                status: status.as_u16(),
                detail: "cache snapshot could not be fetched".to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| QuoteError::transport(path, e))?;
        Ok(body.to_vec())
    }
}

/// Picks local or HTTP storage from the configured cache location.
#[derive(Debug, Clone)]
pub enum CacheStorage {
    Local(LocalStorage),
    Http(HttpStorage),
}

impl CacheStorage {
    pub fn for_location(location: &str, timeout: Duration) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            CacheStorage::Http(HttpStorage::new(timeout))
        } else {
            CacheStorage::Local(LocalStorage::new(".".to_string()))
        }
    }
}

impl Storage for CacheStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            CacheStorage::Local(storage) => storage.read_file(path).await,
            CacheStorage::Http(storage) => storage.read_file(path).await,
        }
    }
}
