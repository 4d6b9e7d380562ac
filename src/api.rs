//! HTTP surface over [`Recommender`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::model::Recommendation;
use crate::service::{ModelStatus, ProductUpdate, Recommender, RetrainOutcome, UpdateOutcome};

/// Header carrying the shared secret for mutating routes.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    recommender: Arc<Recommender>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    /// State for `recommender`; mutating routes answer 401 when `api_key` is `None`.
    pub fn new(recommender: Arc<Recommender>, api_key: Option<String>) -> Self {
        Self {
            recommender,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/recommend", post(recommend))
        .route(
            "/v1/products/:id/recommendations",
            get(product_recommendations),
        )
        .route("/update", post(update))
        .route("/retrain", post(retrain))
        .route("/reload", post(reload))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct RecommendRequest {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    num_recommendations: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct NeighborsQuery {
    #[serde(default)]
    num_recommendations: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RecommendResponse {
    product_id: String,
    recommendations: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    message: &'static str,
    outcome: UpdateOutcome,
}

#[derive(Debug, Serialize)]
struct RetrainResponse {
    message: &'static str,
    #[serde(flatten)]
    outcome: RetrainOutcome,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    message: &'static str,
    products: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.recommender.status().await)
}

async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let product_id = request
        .product_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| error_body(StatusCode::BAD_REQUEST, "product_id is required"))?;
    let recommendations = state
        .recommender
        .recommend(&product_id, request.num_recommendations)
        .await;
    Ok(Json(RecommendResponse {
        product_id,
        recommendations,
    }))
}

async fn product_recommendations(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<NeighborsQuery>,
) -> Json<RecommendResponse> {
    let recommendations = state
        .recommender
        .recommend(&product_id, query.num_recommendations)
        .await;
    Json(RecommendResponse {
        product_id,
        recommendations,
    })
}

async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>, ApiError> {
    authorize(&state, &headers)?;
    let (Some(id), Some(title)) = (
        request.id.filter(|v| !v.trim().is_empty()),
        request.title.filter(|v| !v.trim().is_empty()),
    ) else {
        return Err(error_body(StatusCode::BAD_REQUEST, "id and title are required"));
    };
    let update = ProductUpdate {
        id,
        title,
        description: request.description,
        category: request.category,
    };
    let outcome = state
        .recommender
        .update_product(update)
        .await
        .map_err(internal_error)?;
    match outcome {
        UpdateOutcome::Updated | UpdateOutcome::Appended => Ok(Json(UpdateResponse {
            message: "Model updated successfully",
            outcome,
        })),
        UpdateOutcome::NoModel => Err(error_body(
            StatusCode::CONFLICT,
            "no trained model yet; run /retrain first",
        )),
        UpdateOutcome::ProductNotFound => {
            Err(error_body(StatusCode::NOT_FOUND, "product not found"))
        }
    }
}

async fn retrain(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RetrainResponse>, ApiError> {
    authorize(&state, &headers)?;
    let outcome = state.recommender.retrain().await.map_err(internal_error)?;
    let message = match outcome {
        RetrainOutcome::Trained { .. } => "Model retrained successfully",
        RetrainOutcome::EmptyCorpus => "No products available; model cleared",
    };
    Ok(Json(RetrainResponse { message, outcome }))
}

async fn reload(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReloadResponse>, ApiError> {
    authorize(&state, &headers)?;
    match state.recommender.reload().await.map_err(internal_error)? {
        Some(products) => Ok(Json(ReloadResponse {
            message: "Snapshot reloaded",
            products,
        })),
        None => Err(error_body(StatusCode::NOT_FOUND, "no snapshot on disk")),
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(API_KEY_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();
    match &state.api_key {
        Some(expected) if constant_time_eq(expected.as_bytes(), provided) => Ok(()),
        _ => Err(error_body(StatusCode::UNAUTHORIZED, "invalid API key")),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> ApiError {
    error!(error = ?err, "request failed");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn compares_keys() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(!constant_time_eq(b"", b"x"));
    }
}
