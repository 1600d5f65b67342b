// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::aggregate::AggregatorStatus;
use crate::ai::{ProviderSet, ProviderStatsSnapshot};
use crate::cache::{FeedGateway, FeedRequest, GatewayResponse};
use crate::error::FeedError;
use crate::history::RunSummary;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<FeedGateway>,
    pub providers: ProviderSet,
}

pub fn create_router(state: AppState) -> Router {
    router(state, None)
}

/// Full router; `/metrics` is mounted when a recorder handle is supplied.
pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let mut r = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/feeds", get(feeds));
    if let Some(m) = metrics {
        r = r.merge(m.router());
    }
    r.layer(CorsLayer::very_permissive()).with_state(state)
}

/// Error body: `{"error": "..."}` with a status derived from the error kind.
pub struct ApiError(FeedError);

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FeedError::ProfileNotFound { .. } | FeedError::SourceNotFound { .. } => StatusCode::NOT_FOUND,
            FeedError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            FeedError::InvalidConfig(_) | FeedError::UnknownSourceKind(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(target: "api", error = %self.0, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FeedsQuery {
    #[serde(default)]
    profile: Option<String>,
    #[serde(default = "default_true", alias = "includeItems")]
    include_items: bool,
    #[serde(default)]
    ai: bool,
    #[serde(default)]
    force: bool,
}

async fn feeds(
    State(state): State<AppState>,
    Query(q): Query<FeedsQuery>,
) -> Result<Json<GatewayResponse>, ApiError> {
    let profile = q
        .profile
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty() && p != "all");
    let resp = state
        .gateway
        .get_feeds(FeedRequest {
            profile,
            include_items: q.include_items,
            ai: q.ai,
            force: q.force,
        })
        .await?;
    Ok(Json(resp))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheOut {
    ttl_secs: u64,
    daily_max: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOut {
    aggregator: AggregatorStatus,
    active_provider: &'static str,
    providers: Vec<ProviderStatsSnapshot>,
    cache: CacheOut,
    recent_runs: Vec<RunSummary>,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    let aggregator = state.gateway.aggregator();
    let policy = state.gateway.cache().policy();
    Json(StatusOut {
        aggregator: aggregator.status(),
        active_provider: state.providers.active_name(),
        providers: state.providers.stats(),
        cache: CacheOut {
            ttl_secs: policy.cache_duration.as_secs(),
            daily_max: policy.daily_max,
        },
        recent_runs: aggregator.history().snapshot_last_n(10),
    })
}
