//! HTTP API for the Pricing Engine.
//!
//! This module exposes the engine to the estimate-preview and
//! job-creation flows using the [`axum`](https://crates.io/crates/axum)
//! framework.  Requests and responses are JSON; monetary values are
//! serialised as decimal strings.

use crate::engine::PricingEngine;
use crate::error::PricingError;
use crate::models::{Money, PriceAdjustment, PriceBreakdown, QuoteRequest, WorkerTier};
use crate::provider::ConfigProvider;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Application state shared across requests.
pub struct AppState {
    pub engine: PricingEngine<Arc<dyn ConfigProvider>>,
}

/// Build the API router around the given configuration provider.
pub fn build_router(provider: Arc<dyn ConfigProvider>) -> Router {
    let state = Arc::new(AppState {
        engine: PricingEngine::new(provider),
    });
    Router::new()
        .route("/api/quote", post(quote_handler))
        .route("/api/quotes", post(batch_handler))
        .route("/api/cancellation-fee", post(cancellation_fee_handler))
        .route("/api/extra-time", post(extra_time_handler))
        .route("/api/tier", get(tier_handler))
        .route("/api/config", get(config_handler))
        .route("/api/config/refresh", post(refresh_handler))
        .with_state(state)
}

/// Maps engine errors onto HTTP status codes.
struct ApiError(PricingError);

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PricingError::InvalidJobAttributes(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PricingError::ConfigUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "pricing request failed");
        }
        let body = Json(serde_json::json!({"error": self.0.to_string()}));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

async fn quote_handler(State(state): State<Arc<AppState>>, Json(req): Json<QuoteRequest>) -> ApiResult<PriceBreakdown> {
    let breakdown = state.engine.calculate_service_price(&req.job, req.worker_tier)?;
    Ok(Json(breakdown))
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    requests: Vec<QuoteRequest>,
}

async fn batch_handler(State(state): State<Arc<AppState>>, Json(req): Json<BatchRequest>) -> impl IntoResponse {
    // Rayon work must not run on the async executor threads.
    let result = tokio::task::spawn_blocking(move || state.engine.quote_batch(req.requests)).await;
    match result {
        Ok(outcomes) => (StatusCode::OK, Json(outcomes)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "batch quote task failed");
            let body = Json(serde_json::json!({"error": "batch quote failed"}));
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CancellationRequest {
    total_price: Money,
}

#[derive(Debug, Serialize)]
struct CancellationResponse {
    fee: Money,
}

async fn cancellation_fee_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancellationRequest>,
) -> ApiResult<CancellationResponse> {
    let fee = state.engine.calculate_cancellation_fee(req.total_price)?;
    Ok(Json(CancellationResponse { fee }))
}

#[derive(Debug, Deserialize)]
struct ExtraTimeRequest {
    original: PriceBreakdown,
    extra_hours: Decimal,
}

async fn extra_time_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtraTimeRequest>,
) -> ApiResult<PriceAdjustment> {
    let adjustment = state.engine.extra_time_adjustment(&req.original, req.extra_hours)?;
    Ok(Json(adjustment))
}

#[derive(Debug, Deserialize)]
struct TierQuery {
    points: u64,
}

#[derive(Debug, Serialize)]
struct TierResponse {
    tier: WorkerTier,
    commission_fee: Decimal,
}

async fn tier_handler(State(state): State<Arc<AppState>>, Query(query): Query<TierQuery>) -> Json<TierResponse> {
    let table = state.engine.provider().rate_table();
    let tier = table.tiers.tier_for_points(query.points);
    Json(TierResponse {
        tier,
        commission_fee: table.tiers.get(tier).commission_fee,
    })
}

async fn config_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.provider().rate_table().as_ref().clone())
}

async fn refresh_handler(State(state): State<Arc<AppState>>) -> ApiResult<serde_json::Value> {
    let table = state.engine.provider().refresh()?;
    Ok(Json(serde_json::json!({"version": table.version()})))
}

/// Launch the API server on `addr`.  Blocks until the server terminates
/// (e.g. on Ctrl-C).
pub async fn serve(addr: SocketAddr, provider: Arc<dyn ConfigProvider>) -> Result<()> {
    let router = build_router(provider);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "pricing server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticConfigProvider;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        build_router(Arc::new(StaticConfigProvider::default()))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn quote_returns_breakdown() {
        let body = json!({
            "job": {"square_meters": 20, "ai_estimated_hours": 1, "ai_difficulty_multiplier": 1.0}
        });
        let (status, value) = send(router(), post_json("/api/quote", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["total"], "10525");
        assert_eq!(value["calculation_snapshot"]["worker_tier_applied"], "STARTER");
    }

    #[tokio::test]
    async fn invalid_job_is_unprocessable() {
        let body = json!({
            "job": {"square_meters": 0, "ai_estimated_hours": 1, "ai_difficulty_multiplier": 1.0},
            "worker_tier": "PRO"
        });
        let (status, value) = send(router(), post_json("/api/quote", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(value["error"].as_str().unwrap().contains("square_meters"));
    }

    #[tokio::test]
    async fn cancellation_fee_endpoint() {
        let (status, value) = send(router(), post_json("/api/cancellation-fee", json!({"total_price": 10525}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["fee"], "3158");
    }

    #[tokio::test]
    async fn tier_lookup_by_points() {
        let request = Request::get("/api/tier?points=2000").body(Body::empty()).unwrap();
        let (status, value) = send(router(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["tier"], "ELITE");
        assert_eq!(value["commission_fee"], "0.15");
    }

    #[tokio::test]
    async fn batch_mixes_successes_and_errors() {
        let body = json!({"requests": [
            {"job": {"square_meters": 20, "ai_estimated_hours": 1, "ai_difficulty_multiplier": 1.0}},
            {"job": {"square_meters": 20, "ai_estimated_hours": 0, "ai_difficulty_multiplier": 1.0}}
        ]});
        let (status, value) = send(router(), post_json("/api/quotes", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value[0]["breakdown"]["total"], "10525");
        assert!(value[1]["error"].is_string());
    }

    #[tokio::test]
    async fn extra_time_prices_additional_hours() {
        let quote = json!({
            "job": {"square_meters": 20, "ai_estimated_hours": 1, "ai_difficulty_multiplier": 1.0}
        });
        let (_, original) = send(router(), post_json("/api/quote", quote)).await;
        let body = json!({"original": original, "extra_hours": 2});
        let (status, value) = send(router(), post_json("/api/extra-time", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["worker_net"], "12000");
        assert_eq!(value["total"], "16840");
        assert_eq!(value["worker_tier_applied"], "STARTER");
    }

    #[tokio::test]
    async fn extra_time_rejects_non_positive_hours() {
        let quote = json!({
            "job": {"square_meters": 20, "ai_estimated_hours": 1, "ai_difficulty_multiplier": 1.0}
        });
        let (_, original) = send(router(), post_json("/api/quote", quote)).await;
        let body = json!({"original": original, "extra_hours": 0});
        let (status, _) = send(router(), post_json("/api/extra-time", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn config_returns_active_rate_table() {
        let request = Request::get("/api/config").body(Body::empty()).unwrap();
        let (status, value) = send(router(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["system"]["version"], "default-v1");
        assert_eq!(value["system"]["revision"], 1);
        assert_eq!(value["tiers"]["ELITE"]["commission_fee"], "0.15");
    }

    #[tokio::test]
    async fn broken_tier_configuration_is_a_server_error() {
        let mut table = crate::config::RateTable::default();
        table.tiers.starter.commission_fee = rust_decimal_macros::dec!(1);
        let router = build_router(Arc::new(StaticConfigProvider::new(table)));
        let body = json!({
            "job": {"square_meters": 20, "ai_estimated_hours": 1, "ai_difficulty_multiplier": 1.0}
        });
        let (status, value) = send(router, post_json("/api/quote", body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(value["error"].as_str().unwrap().contains("commission_fee"));
    }

    #[tokio::test]
    async fn oversized_job_is_unprocessable() {
        let body = json!({
            "job": {
                "square_meters": "1000000000000000000000000000",
                "ai_estimated_hours": 1,
                "ai_difficulty_multiplier": 1.0
            }
        });
        let (status, value) = send(router(), post_json("/api/quote", body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(value["error"].as_str().unwrap().contains("overflows"));
    }

    /// Hands out the default table and counts how often it was asked.
    #[derive(Default)]
    struct CountingProvider {
        reads: std::sync::atomic::AtomicUsize,
        inner: StaticConfigProvider,
    }

    impl ConfigProvider for CountingProvider {
        fn rate_table(&self) -> Arc<crate::config::RateTable> {
            self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.rate_table()
        }
    }

    #[tokio::test]
    async fn tier_lookup_reads_a_single_rate_table() {
        let provider = Arc::new(CountingProvider::default());
        let router = build_router(provider.clone());
        let request = Request::get("/api/tier?points=600").body(Body::empty()).unwrap();
        let (status, value) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["tier"], "PRO");
        assert_eq!(value["commission_fee"], "0.20");
        assert_eq!(provider.reads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_reports_active_version() {
        let request = Request::post("/api/config/refresh").body(Body::empty()).unwrap();
        let (status, value) = send(router(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["version"], "default-v1");
    }
}
