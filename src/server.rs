use crate::core::{PriceQuery, RefreshAuthority, RefreshRequest};
use crate::utils::error::QuoteError;
use crate::utils::validation::parse_date;
use crate::{build_pipeline, DefaultPipeline, Settings};
use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "stay-quotes";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pipeline: Arc<DefaultPipeline>,
    pub authority: Arc<RefreshAuthority>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        Self {
            pipeline: Arc::new(build_pipeline(settings.clone())),
            authority: Arc::new(RefreshAuthority::new(&settings)),
            settings,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct ResolveBody {
    destination: String,
    checkin: String,
    checkout: String,
    #[serde(default = "default_guests")]
    guests: u32,
    #[serde(default = "default_rooms")]
    rooms: u32,
}

fn default_guests() -> u32 {
    2
}

fn default_rooms() -> u32 {
    1
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for QuoteError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", self);
        } else {
            tracing::warn!("⚠️ Request rejected: {}", self);
        }
        let body = ErrorResponse {
            detail: self.user_friendly_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/resolve", post(resolve))
        .route("/api/refresh-prices", post(refresh_prices))
        .route("/api/destinations", get(destinations))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - liveness in the same shape the live backend reports
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "online",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// POST /api/resolve
async fn resolve(State(state): State<AppState>, body: Bytes) -> Result<Response, QuoteError> {
    let body: ResolveBody = decode_body("resolve", &body)?;
    let query = PriceQuery::new(
        body.destination,
        parse_date("checkin", &body.checkin)?,
        parse_date("checkout", &body.checkout)?,
        body.guests,
        body.rooms,
    )?;

    let resolution = state.pipeline.resolve(&query).await;
    Ok((StatusCode::OK, Json(resolution)).into_response())
}

/// POST /api/refresh-prices - empty body regenerates every preset
async fn refresh_prices(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, QuoteError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    // 先驗證權杖，再解析內容
    state.authority.authorize(authorization)?;

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshRequest::all()
    } else {
        decode_body("refresh", &body)?
    };

    let response =
        state
            .authority
            .refresh(authorization, &request, &mut StdRng::from_entropy())?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

fn decode_body<T: serde::de::DeserializeOwned>(what: &str, body: &[u8]) -> Result<T, QuoteError> {
    serde_json::from_slice(body)
        .map_err(|e| QuoteError::validation(format!("invalid {} body: {}", what, e)))
}

/// GET /api/destinations - configured presets
async fn destinations(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.authority.generator().presets().to_vec())
}
