//! HTTP API - transcode triggering, rendition listing, quality switching
//! and byte-range streaming
// Copyright 2025 Vodforge Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::catalog::AssetCatalog;
use crate::health;
use crate::orchestrator::{rendition_output_path, TranscodeOrchestrator};
use crate::range::{serve_file, ServeReply};
use crate::registry::RenditionRegistry;
use crate::resolver::QualityResolver;
use vodforge_types::{PipelineError, Rendition};

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: AssetCatalog,
    pub registry: RenditionRegistry,
    pub resolver: QualityResolver,
    pub orchestrator: Arc<TranscodeOrchestrator>,
    pub media_root: PathBuf,
    pub cache_max_age_secs: u64,
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/transcode", post(start_transcode))
        .route("/api/assets/:asset_id/renditions", get(list_renditions))
        .route("/api/assets/:asset_id/best", get(best_quality))
        .route("/api/assets/:asset_id", delete(delete_asset))
        .route("/api/change-resolution", post(change_resolution))
        .route("/stream/source/:asset_id", get(stream_source))
        .route("/stream/:asset_id/:quality", get(stream_rendition))
        .with_state(state)
}

/// Typed pipeline error mapped onto a client-visible status code
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::SourceNotFound(_)
            | PipelineError::AssetNotFound(_)
            | PipelineError::NoRenditionAvailable(_) => StatusCode::NOT_FOUND,
            PipelineError::FileMissing(what) => {
                // Registry claims availability but the bytes are gone:
                // registry/storage divergence, an operator problem.
                error!(
                    rendition = what,
                    "Rendition marked available but file missing on disk"
                );
                StatusCode::NOT_FOUND
            }
            PipelineError::UnknownQuality(_) => StatusCode::BAD_REQUEST,
            PipelineError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            PipelineError::EncoderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::EncodeFailed { .. } | PipelineError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct TranscodeRequest {
    pub asset_id: Uuid,
    pub source_path: PathBuf,
    pub original_filename: String,
    /// Re-encode rungs that are already COMPLETED. Default: skip them.
    #[serde(default)]
    pub force: bool,
}

/// Trigger transcoding of an uploaded source. Fire-and-forget: the
/// response returns as soon as the job is scheduled.
async fn start_transcode(
    State(state): State<AppState>,
    Json(request): Json<TranscodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let asset = state
        .catalog
        .register(
            request.asset_id,
            request.source_path,
            request.original_filename,
        )
        .await?;

    let handle = state
        .orchestrator
        .process_to_renditions(asset.asset_id, asset.storage_path, request.force)
        .await?;
    // The job reports through the registry; the settled report is logged
    // by the job task itself.
    drop(handle);

    info!(asset_id = %asset.asset_id, "Transcode job accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "PROCESSING", "asset_id": asset.asset_id })),
    ))
}

/// All rendition rows of an asset, in ladder order.
async fn list_renditions(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
) -> Result<Json<Vec<Rendition>>, ApiError> {
    if state.catalog.get(asset_id).await.is_none() {
        return Err(PipelineError::AssetNotFound(asset_id).into());
    }

    let ladder = state.orchestrator.ladder();
    let mut rows = state.registry.find_by_asset(asset_id).await;
    rows.sort_by_key(|row| ladder.position(&row.quality).unwrap_or(usize::MAX));
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct BestQualityQuery {
    pub preferred: Option<String>,
}

async fn best_quality(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
    Query(query): Query<BestQualityQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let quality = state
        .resolver
        .best_available(asset_id, query.preferred.as_deref())
        .await?;
    Ok(Json(json!({ "asset_id": asset_id, "quality": quality })))
}

#[derive(Debug, Deserialize)]
pub struct ChangeResolutionRequest {
    pub asset_id: Uuid,
    pub quality: String,
    pub current_time: Option<f64>,
}

async fn change_resolution(
    State(state): State<AppState>,
    Json(request): Json<ChangeResolutionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let switch = state
        .resolver
        .change_resolution(request.asset_id, &request.quality, request.current_time)
        .await?;
    Ok(Json(switch))
}

async fn delete_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .catalog
        .delete_cascading(asset_id, &state.registry, &state.media_root)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stream rendition bytes with Range support.
///
/// Availability is resolved before the byte server is invoked; the byte
/// server itself never sees encoding state and is only ever pointed at a
/// COMPLETED rendition's final path.
async fn stream_rendition(
    State(state): State<AppState>,
    Path((asset_id, quality)): Path<(Uuid, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !state.resolver.is_available(asset_id, &quality).await {
        return Err(PipelineError::NoRenditionAvailable(asset_id).into());
    }

    let path = rendition_output_path(&state.media_root, asset_id, &quality);
    let reply = serve_file(&path, range_header(&headers), state.cache_max_age_secs).await;

    if reply.status == 404 {
        // The registry said available; the bytes disagree.
        return Err(PipelineError::FileMissing(format!("{}/{}", asset_id, quality)).into());
    }
    Ok(reply_into_response(reply))
}

/// Stream the original source file with Range support.
async fn stream_source(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = state.catalog.resolve_path(asset_id).await?;
    let reply = serve_file(&path, range_header(&headers), state.cache_max_age_secs).await;

    if reply.status == 404 {
        return Err(PipelineError::FileMissing(format!("{}/source", asset_id)).into());
    }
    Ok(reply_into_response(reply))
}

fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|v| v.to_str().ok())
}

fn reply_into_response(reply: ServeReply) -> Response {
    let status =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = status;
    for (name, value) in &reply.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
