//! In-app notification inbox

use super::{ok, ApiPath, ApiResponse};
use crate::AppState;
use axum::extract::State;
use journal_common::db::models::Notification;
use journal_common::errors::Result;
use journal_common::Caller;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub notification: Notification,
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<ApiResponse<NotificationListResponse>> {
    let notifications = state.services.inbox.list(&caller).await?;
    let unread = notifications.iter().filter(|n| n.read_at.is_none()).count();
    Ok(ok(NotificationListResponse {
        notifications,
        unread,
    }))
}

/// POST /notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(notification_id): ApiPath<Uuid>,
) -> Result<ApiResponse<NotificationResponse>> {
    let notification = state
        .services
        .inbox
        .mark_read(&caller, notification_id)
        .await?;
    Ok(ok(NotificationResponse { notification }))
}
