//! In-app notifications for the signed-in user

use crate::auth::Caller;
use crate::db::models::Notification;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use uuid::Uuid;

const INBOX_LIMIT: u64 = 100;

pub struct InboxService {
    repo: Repository,
}

impl InboxService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Newest first
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Notification>> {
        self.repo
            .list_notifications_for_user(caller.user_id(), INBOX_LIMIT)
            .await
    }

    /// Other users' notifications are reported as missing
    pub async fn mark_read(&self, caller: &Caller, notification_id: Uuid) -> Result<Notification> {
        self.repo
            .mark_notification_read(notification_id, caller.user_id())
            .await?
            .ok_or_else(|| AppError::not_found("notification", notification_id))
    }
}
