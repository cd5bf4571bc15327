use crate::config::Settings;
use crate::domain::model::{PriceQuery, ResolutionMode};
use crate::domain::ports::QuoteSource;
use crate::domain::wire::{ErrorBody, HealthStatus, QuoteRequest, RemoteComparison};
use crate::utils::error::{QuoteError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// Result of a single POST that reached the backend.
enum Attempt {
    Accepted(RemoteComparison),
    Rejected { status: u16, detail: Option<String> },
}

/// Client for the live aggregation backend with primary→fallback chaining.
pub struct RemoteQuoteClient {
    client: Client,
    settings: Arc<Settings>,
}

impl RemoteQuoteClient {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    async fn post_once(&self, endpoint: &str, payload: &QuoteRequest) -> Result<Attempt> {
        tracing::debug!("POST {} for {}", endpoint, payload.destination);

        let response = self
            .client
            .post(endpoint)
            .json(payload)
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| QuoteError::transport(endpoint, e))?;

        let status = response.status();
        tracing::debug!("Backend response status: {}", status);

        let body = response
            .bytes()
            .await
            .map_err(|e| QuoteError::transport(endpoint, e))?;

        if status.is_success() {
            let comparison = serde_json::from_slice::<RemoteComparison>(&body).map_err(|e| {
                QuoteError::ParseFailure {
                    context: format!("quote response from {}", endpoint),
                    message: e.to_string(),
                }
            })?;
            return Ok(Attempt::Accepted(comparison));
        }

        // 錯誤回應格式為 {"detail": "..."}，解析失敗時不帶細節
        let detail = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail);

        Ok(Attempt::Rejected {
            status: status.as_u16(),
            detail,
        })
    }

    fn upstream_failure(endpoint: &str, status: u16, detail: Option<String>) -> QuoteError {
        QuoteError::UpstreamFailure {
            endpoint: endpoint.to_string(),
            status,
            detail: detail.unwrap_or_else(|| format!("backend responded with status {}", status)),
        }
    }
}

#[async_trait]
impl QuoteSource for RemoteQuoteClient {
    async fn fetch_quotes(&self, query: &PriceQuery) -> Result<RemoteComparison> {
        let primary = match self.settings.primary_endpoint.as_deref() {
            Some(primary) if self.settings.live_enabled() => primary,
            _ if self.settings.mode != ResolutionMode::Hybrid => {
                return Err(QuoteError::ModeUnavailable {
                    reason: format!("resolution mode is {}", self.settings.mode),
                })
            }
            _ => {
                return Err(QuoteError::ModeUnavailable {
                    reason: "no backend endpoint configured".to_string(),
                })
            }
        };

        let payload = QuoteRequest::from(query);

        let (status, detail) = match self.post_once(primary, &payload).await? {
            Attempt::Accepted(comparison) => return Ok(comparison),
            Attempt::Rejected { status, detail } => (status, detail),
        };

        let Some(fallback) = self.settings.fallback_endpoint.as_deref() else {
            return Err(Self::upstream_failure(primary, status, detail));
        };

        tracing::warn!(
            "⚠️ Primary backend returned {}, retrying once against fallback",
            status
        );

        match self.post_once(fallback, &payload).await? {
            Attempt::Accepted(comparison) => {
                tracing::info!("✅ Fallback backend answered for {}", payload.destination);
                Ok(comparison)
            }
            Attempt::Rejected { status, detail } => {
                Err(Self::upstream_failure(fallback, status, detail))
            }
        }
    }

    async fn health(&self) -> Result<HealthStatus> {
        let url = self
            .settings
            .health_url()
            .ok_or_else(|| QuoteError::ModeUnavailable {
                reason: "no backend endpoint configured".to_string(),
            })?;

        let response = self
            .client
            .get(&url)
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| QuoteError::transport(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::upstream_failure(&url, status.as_u16(), None));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| QuoteError::transport(&url, e))?;
        serde_json::from_slice::<HealthStatus>(&body).map_err(|e| QuoteError::ParseFailure {
            context: format!("health response from {}", url),
            message: e.to_string(),
        })
    }
}
