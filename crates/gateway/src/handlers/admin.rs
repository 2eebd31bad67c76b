//! Editorial desk handlers: listings, detail view, status edits

use super::{ok, ApiJson, ApiPath, ApiResponse};
use crate::AppState;
use axum::extract::State;
use journal_common::db::models::Manuscript;
use journal_common::errors::Result;
use journal_common::services::ManuscriptDetail;
use journal_common::Caller;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct ManuscriptListResponse {
    pub manuscripts: Vec<Manuscript>,
}

#[derive(Debug, Serialize)]
pub struct ManuscriptResponse {
    pub manuscript: Manuscript,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[serde(alias = "manuscriptId")]
    pub manuscript_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub status: String,
}

/// GET /admin/list-manuscripts
pub async fn list_manuscripts(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<ApiResponse<ManuscriptListResponse>> {
    let manuscripts = state.services.manuscripts.list_for_role(&caller).await?;
    Ok(ok(ManuscriptListResponse { manuscripts }))
}

/// GET /admin/queue
pub async fn queue(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<ApiResponse<ManuscriptListResponse>> {
    let manuscripts = state.services.manuscripts.queue(&caller).await?;
    Ok(ok(ManuscriptListResponse { manuscripts }))
}

/// GET /admin/submissions/{id}
pub async fn submission_detail(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(manuscript_id): ApiPath<Uuid>,
) -> Result<ApiResponse<ManuscriptDetail>> {
    let detail = state
        .services
        .manuscripts
        .detail(&caller, manuscript_id)
        .await?;
    Ok(ok(detail))
}

/// POST /admin/update-manuscript-status
pub async fn update_status(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<ApiResponse<ManuscriptResponse>> {
    request.validate()?;

    let manuscript = state
        .services
        .manuscripts
        .update_status(&caller, request.manuscript_id, &request.status)
        .await?;
    Ok(ok(ManuscriptResponse { manuscript }))
}
