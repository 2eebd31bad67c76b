//! Reviewer assignment and decision handlers

use super::{ok, ApiJson, ApiResponse};
use crate::AppState;
use axum::extract::State;
use journal_common::db::models::ManuscriptReview;
use journal_common::errors::Result;
use journal_common::services::ReviewerRef;
use journal_common::Caller;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub review: ManuscriptReview,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignReviewerRequest {
    #[serde(alias = "manuscriptId")]
    pub manuscript_id: Uuid,
    #[serde(default, alias = "reviewerId")]
    pub reviewer_id: Option<Uuid>,
    #[serde(default, alias = "reviewerEmail")]
    #[validate(email)]
    pub reviewer_email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecisionRequest {
    #[serde(alias = "manuscriptId")]
    pub manuscript_id: Uuid,
    #[validate(length(min = 1, max = 32))]
    pub recommendation: String,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub notes: Option<String>,
}

/// POST /admin/review/assign
pub async fn assign_reviewer(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<AssignReviewerRequest>,
) -> Result<ApiResponse<ReviewResponse>> {
    request.validate()?;
    let reviewer = ReviewerRef::from_parts(request.reviewer_id, request.reviewer_email)?;

    let review = state
        .services
        .reviews
        .assign(&caller, request.manuscript_id, reviewer)
        .await?;
    Ok(ok(ReviewResponse { review }))
}

/// POST /admin/review/decision
pub async fn submit_decision(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<DecisionRequest>,
) -> Result<ApiResponse<ReviewResponse>> {
    request.validate()?;

    let review = state
        .services
        .reviews
        .submit_decision(
            &caller,
            request.manuscript_id,
            &request.recommendation,
            request.notes,
        )
        .await?;
    Ok(ok(ReviewResponse { review }))
}
