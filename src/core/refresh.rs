use crate::config::Settings;
use crate::core::aggregator::now_rfc3339;
use crate::core::source_generator::SourceGenerator;
use crate::core::{CacheEntry, QuoteError, Result};
use crate::utils::validation::{parse_date, validate_stay};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const REFRESH_SOURCE: &str = "mock-generator";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub all: bool,
    pub destination: Option<String>,
    pub checkin: Option<String>,
    pub checkout: Option<String>,
}

impl RefreshRequest {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub generated_at: String,
    pub entries: Vec<CacheEntry>,
    pub source: String,
    pub count: usize,
}

/// The only path allowed to mint cache-shaped data. Writes nothing back.
pub struct RefreshAuthority {
    secret: Option<String>,
    generator: SourceGenerator,
}

impl RefreshAuthority {
    pub fn new(settings: &Settings) -> Self {
        Self {
            secret: settings.refresh_secret.clone(),
            generator: SourceGenerator::new(settings.generator.clone()),
        }
    }

    pub fn generator(&self) -> &SourceGenerator {
        &self.generator
    }

    /// Checks an `Authorization` header value against the configured secret.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<()> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| QuoteError::RefreshConfigError {
                message: "refresh secret is not configured".to_string(),
            })?;

        let token = authorization
            .and_then(bearer_token)
            .ok_or(QuoteError::Unauthorized)?;

        if !constant_time_eq(token.as_bytes(), secret.as_bytes()) {
            tracing::warn!("🚫 Refresh rejected: token mismatch");
            return Err(QuoteError::Forbidden);
        }
        Ok(())
    }

    pub fn refresh<R: Rng + ?Sized>(
        &self,
        authorization: Option<&str>,
        request: &RefreshRequest,
        rng: &mut R,
    ) -> Result<RefreshResponse> {
        self.authorize(authorization)?;

        let entries = if request.all {
            tracing::info!(
                "🔄 Regenerating all {} presets",
                self.generator.presets().len()
            );
            self.generator.generate_presets(rng)
        } else {
            let (destination, checkin, checkout) = match (
                request.destination.as_deref().map(str::trim),
                request.checkin.as_deref(),
                request.checkout.as_deref(),
            ) {
                (Some(destination), Some(checkin), Some(checkout)) if !destination.is_empty() => {
                    (destination, checkin, checkout)
                }
                _ => {
                    return Err(QuoteError::validation(
                        "provide destination, checkin and checkout, or set all=true",
                    ))
                }
            };
            let checkin = parse_date("checkin", checkin)?;
            let checkout = parse_date("checkout", checkout)?;
            validate_stay(checkin, checkout)?;

            tracing::info!("🔄 Regenerating {} {}→{}", destination, checkin, checkout);
            vec![self.generator.generate(rng, destination, checkin, checkout)]
        };

        Ok(RefreshResponse {
            generated_at: now_rfc3339(),
            count: entries.len(),
            entries,
            source: REFRESH_SOURCE.to_string(),
        })
    }
}

/// Token from `Bearer <token>`; the scheme is matched case-insensitively.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
