use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::media_upload::{MediaUploadCoordinator, UploadGrant};
use crate::story::{CreateStory, Story, UpdateStory};
use crate::story_repository::StoryRepository;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stories: Arc<StoryRepository>,
    pub uploads: Arc<MediaUploadCoordinator>,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/stories", post(create_story))
        .route("/stories/{id}", put(update_story).delete(delete_story))
        .route(
            "/stories/{id}/segments/{segment_id}/audio",
            post(issue_audio_upload_url),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Liveness probe
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe: the document store must answer
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.stories.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

async fn create_story(
    State(state): State<AppState>,
    payload: Result<Json<CreateStory>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Story>)> {
    let Json(request) = payload?;
    let story = state.stories.create(request).await?;

    Ok((StatusCode::CREATED, Json(story)))
}

async fn update_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStory>, JsonRejection>,
) -> ApiResult<Json<Story>> {
    let Json(request) = payload?;
    let story = state.stories.update(&id, request).await?;

    Ok(Json(story))
}

async fn delete_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.stories.delete(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// TODO: require an authenticated caller that owns the story before minting write grants
async fn issue_audio_upload_url(
    State(state): State<AppState>,
    Path((story_id, segment_id)): Path<(String, String)>,
) -> ApiResult<Json<UploadGrant>> {
    let grant = state
        .uploads
        .issue_audio_upload_url(&story_id, &segment_id)
        .await?;

    Ok(Json(grant))
}

/// Start the story API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting story API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
