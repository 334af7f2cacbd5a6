//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for browsing episodes, chunk search and
//! recommendations.

use crate::chunking::Chunk;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::CompanionError;
use crate::orchestrator::Orchestrator;
use crate::recommend::RecommendationResult;
use crate::transcript::format_timestamp;
use crate::vector_store::IndexedEpisode;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/episodes", get(list_episodes))
        .route("/episodes/{episode_id}/chunks", get(get_chunks))
        .route("/episodes/{episode_id}/profile", get(get_profile))
        .route(
            "/episodes/{episode_id}/recommendations",
            get(get_recommendations),
        )
        .route("/search", post(search))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("podcompanion API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("List Episodes", "GET  /episodes");
    Output::kv("Chunks", "GET  /episodes/:episode_id/chunks");
    Output::kv("Affect Profile", "GET  /episodes/:episode_id/profile");
    Output::kv(
        "Recommendations",
        "GET  /episodes/:episode_id/recommendations?top_k=5&alpha=0.8",
    );
    Output::kv("Search", "POST /search");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Serialize)]
struct SearchResult {
    episode_id: String,
    chunk_id: u32,
    preview: String,
    ts_start: f64,
    ts_end: f64,
    timestamp: String,
    score: f32,
}

#[derive(Serialize)]
struct EpisodeListResponse {
    episodes: Vec<IndexedEpisode>,
    total: usize,
}

#[derive(Serialize)]
struct ChunkListResponse {
    episode_id: String,
    chunk_count: usize,
    chunks: Vec<Chunk>,
}

#[derive(Deserialize)]
struct RecommendParams {
    top_k: Option<usize>,
    alpha: Option<f32>,
}

#[derive(Serialize)]
struct RecommendResponse {
    episode_id: String,
    alpha: f32,
    results: Vec<RecommendationResult>,
}

#[derive(Serialize)]
struct ProfileResponse {
    episode_id: String,
    emotion_labels: Vec<String>,
    mean_profile: BTreeMap<String, f32>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Library error rendered as a JSON error body.
struct ApiError(CompanionError);

impl From<CompanionError> for ApiError {
    fn from(e: CompanionError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CompanionError::NotFound(_) => StatusCode::NOT_FOUND,
            CompanionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let records = state.orchestrator.vector_store().record_count().await.ok();
    Json(serde_json::json!({ "status": "ok", "records": records }))
}

async fn list_episodes(State(state): State<Arc<AppState>>) -> ApiResult<EpisodeListResponse> {
    let episodes = state.orchestrator.vector_store().list_episodes().await?;
    Ok(Json(EpisodeListResponse {
        total: episodes.len(),
        episodes,
    }))
}

async fn get_chunks(
    State(state): State<Arc<AppState>>,
    Path(episode_id): Path<String>,
) -> ApiResult<ChunkListResponse> {
    let chunks = state.orchestrator.stored_chunks(&episode_id)?;
    Ok(Json(ChunkListResponse {
        episode_id,
        chunk_count: chunks.len(),
        chunks,
    }))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(episode_id): Path<String>,
) -> ApiResult<ProfileResponse> {
    let profile = state
        .orchestrator
        .artifacts()
        .load_profile(&episode_id)?
        .ok_or_else(|| CompanionError::NotFound(format!("affect profile for {}", episode_id)))?;

    Ok(Json(ProfileResponse {
        episode_id: profile.episode_id,
        emotion_labels: profile.emotion_labels,
        mean_profile: profile.mean_profile,
    }))
}

async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Path(episode_id): Path<String>,
    Query(params): Query<RecommendParams>,
) -> ApiResult<RecommendResponse> {
    let options = state
        .orchestrator
        .settings()
        .recommend
        .options(params.top_k, params.alpha);

    let results = state.orchestrator.recommend(&episode_id, options).await?;
    Ok(Json(RecommendResponse {
        episode_id,
        alpha: options.alpha,
        results,
    }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let hits = state.orchestrator.search(&req.query, req.limit).await?;
    Ok(Json(SearchResponse {
        results: hits
            .into_iter()
            .map(|hit| SearchResult {
                score: hit.similarity(),
                timestamp: format_timestamp(hit.metadata.ts_start),
                episode_id: hit.metadata.episode_id,
                chunk_id: hit.metadata.chunk_id,
                preview: hit.metadata.preview,
                ts_start: hit.metadata.ts_start,
                ts_end: hit.metadata.ts_end,
            })
            .collect(),
    }))
}
