//! Profile handlers: the caller's own profile and admin access management

use super::{ok, ApiJson, ApiPath, ApiResponse};
use crate::AppState;
use axum::extract::State;
use journal_common::db::models::Profile;
use journal_common::errors::Result;
use journal_common::Caller;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct ProfileListResponse {
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccessRequest {
    #[validate(length(min = 1, max = 32))]
    pub role: Option<String>,
    pub approved: Option<bool>,
}

/// GET /me
pub async fn me(caller: Caller) -> ApiResponse<ProfileResponse> {
    ok(ProfileResponse {
        profile: caller.profile,
    })
}

/// GET /admin/profiles
pub async fn list_profiles(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<ApiResponse<ProfileListResponse>> {
    let profiles = state.services.profiles.list(&caller).await?;
    Ok(ok(ProfileListResponse { profiles }))
}

/// POST /admin/profiles/{id}/access
pub async fn update_access(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(profile_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateAccessRequest>,
) -> Result<ApiResponse<ProfileResponse>> {
    request.validate()?;

    let profile = state
        .services
        .profiles
        .update_access(&caller, profile_id, request.role.as_deref(), request.approved)
        .await?;
    Ok(ok(ProfileResponse { profile }))
}
