//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Fields of a manuscript about to be submitted
#[derive(Debug, Clone)]
pub struct NewManuscript {
    pub id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub author_id: Option<Uuid>,
    pub submitter_id: Option<Uuid>,
    pub authors: Option<Value>,
    pub word_path: Option<String>,
}

/// Fields of a stored file about to become a manuscript version
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub id: Uuid,
    pub file_path: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by: Option<Uuid>,
}

/// Issue metadata supplied to the publication compiler
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub volume: Option<i32>,
    pub issue_number: Option<i32>,
    pub published_at: DateTime<Utc>,
    pub cover_url: Option<String>,
    pub pdf_path: Option<String>,
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Profile Operations
    // ========================================================================

    pub async fn find_profile_by_id(&self, id: Uuid) -> Result<Option<Profile>> {
        ProfileEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Emails are stored lowercased
    pub async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        ProfileEntity::find()
            .filter(ProfileColumn::Email.eq(email.trim().to_ascii_lowercase()))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ProfileEntity::find()
            .filter(ProfileColumn::Id.is_in(ids.iter().copied()))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_profiles_by_emails(&self, emails: &[String]) -> Result<Vec<Profile>> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = emails.iter().map(|e| e.to_ascii_lowercase()).collect();
        ProfileEntity::find()
            .filter(ProfileColumn::Email.is_in(lowered))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a profile. A concurrent first sign-in for the same user
    /// resolves to the row that won the race.
    pub async fn insert_profile(
        &self,
        id: Uuid,
        email: &str,
        role: Role,
        approved: bool,
    ) -> Result<Profile> {
        let now = now();
        let email = email.trim().to_ascii_lowercase();
        let profile = ProfileActiveModel {
            id: Set(id),
            email: Set(email.clone()),
            full_name: Set(None),
            role: Set(role.as_str().to_string()),
            approved: Set(approved),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match profile.insert(self.conn()).await {
            Ok(created) => Ok(created),
            Err(e) if is_unique_violation(&e) => {
                if let Some(existing) = self.find_profile_by_id(id).await? {
                    return Ok(existing);
                }
                // The email belongs to a profile under another identity
                if self.find_profile_by_email(&email).await?.is_some() {
                    tracing::warn!(profile_id = %id, "Email already linked to another profile");
                    return Err(AppError::forbidden(
                        "Email is already linked to another account",
                    ));
                }
                Err(AppError::Database(e))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>> {
        ProfileEntity::find()
            .order_by_asc(ProfileColumn::Email)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Approved editors and admins
    pub async fn list_staff_profiles(&self) -> Result<Vec<Profile>> {
        ProfileEntity::find()
            .filter(ProfileColumn::Role.is_in([Role::Editor.as_str(), Role::Admin.as_str()]))
            .filter(ProfileColumn::Approved.eq(true))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_profile_access(
        &self,
        id: Uuid,
        role: Option<Role>,
        approved: Option<bool>,
    ) -> Result<Profile> {
        let mut profile: ProfileActiveModel = self
            .find_profile_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("profile", id))?
            .into();

        if let Some(role) = role {
            profile.role = Set(role.as_str().to_string());
        }
        if let Some(approved) = approved {
            profile.approved = Set(approved);
        }
        profile.updated_at = Set(now());

        profile.update(self.conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Manuscript Operations
    // ========================================================================

    /// Insert a manuscript with its first version and point
    /// `current_version` at it, atomically.
    pub async fn create_manuscript_with_version(
        &self,
        manuscript: NewManuscript,
        version: NewVersion,
    ) -> Result<(Manuscript, ManuscriptVersion)> {
        let txn = self.conn().begin().await?;
        let now = now();

        let created = ManuscriptActiveModel {
            id: Set(manuscript.id),
            title: Set(manuscript.title),
            abstract_text: Set(manuscript.abstract_text),
            status: Set(ManuscriptStatus::Submitted.as_str().to_string()),
            author_id: Set(manuscript.author_id),
            submitter_id: Set(manuscript.submitter_id),
            current_version: Set(None),
            authors: Set(manuscript.authors),
            file_storage_path: Set(None),
            word_path: Set(manuscript.word_path),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let first = insert_version(&txn, created.id, 1, version).await?;

        let mut active: ManuscriptActiveModel = created.into();
        active.current_version = Set(Some(first.id));
        let manuscript = active.update(&txn).await?;

        txn.commit().await?;
        Ok((manuscript, first))
    }

    /// Append a version and repoint `current_version`, atomically.
    /// Status is left untouched.
    pub async fn add_version(
        &self,
        manuscript_id: Uuid,
        version: NewVersion,
    ) -> Result<(Manuscript, ManuscriptVersion)> {
        let txn = self.conn().begin().await?;

        let manuscript = ManuscriptEntity::find_by_id(manuscript_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("manuscript", manuscript_id))?;

        let latest = ManuscriptVersionEntity::find()
            .filter(ManuscriptVersionColumn::ManuscriptId.eq(manuscript_id))
            .order_by_desc(ManuscriptVersionColumn::VersionNumber)
            .one(&txn)
            .await?;
        let number = latest.map(|v| v.version_number + 1).unwrap_or(1);

        let created = insert_version(&txn, manuscript_id, number, version).await?;

        let mut active: ManuscriptActiveModel = manuscript.into();
        active.current_version = Set(Some(created.id));
        active.updated_at = Set(now());
        let manuscript = active.update(&txn).await?;

        txn.commit().await?;
        Ok((manuscript, created))
    }

    pub async fn find_manuscript_by_id(&self, id: Uuid) -> Result<Option<Manuscript>> {
        ManuscriptEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_manuscripts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Manuscript>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ManuscriptEntity::find()
            .filter(ManuscriptColumn::Id.is_in(ids.iter().copied()))
            .order_by_desc(ManuscriptColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// All manuscripts, newest first
    pub async fn list_manuscripts(&self) -> Result<Vec<Manuscript>> {
        ManuscriptEntity::find()
            .order_by_desc(ManuscriptColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn list_manuscripts_with_status(
        &self,
        statuses: &[ManuscriptStatus],
    ) -> Result<Vec<Manuscript>> {
        ManuscriptEntity::find()
            .filter(ManuscriptColumn::Status.is_in(statuses.iter().map(|s| s.as_str())))
            .order_by_asc(ManuscriptColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Manuscripts that name the user as author or submitter
    pub async fn list_manuscripts_owned_by(&self, user_id: Uuid) -> Result<Vec<Manuscript>> {
        ManuscriptEntity::find()
            .filter(
                Condition::any()
                    .add(ManuscriptColumn::AuthorId.eq(user_id))
                    .add(ManuscriptColumn::SubmitterId.eq(user_id)),
            )
            .order_by_desc(ManuscriptColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Manuscripts with an assignment row for the reviewer
    pub async fn list_manuscripts_for_reviewer(
        &self,
        reviewer_id: Uuid,
        undecided_only: bool,
    ) -> Result<Vec<Manuscript>> {
        let mut query = ManuscriptReviewEntity::find()
            .filter(ManuscriptReviewColumn::ReviewerId.eq(reviewer_id));
        if undecided_only {
            query = query.filter(ManuscriptReviewColumn::DecidedAt.is_null());
        }

        let manuscript_ids: Vec<Uuid> = query
            .select_only()
            .column(ManuscriptReviewColumn::ManuscriptId)
            .into_tuple()
            .all(self.conn())
            .await?;

        self.find_manuscripts_by_ids(&manuscript_ids).await
    }

    pub async fn update_manuscript_status(
        &self,
        id: Uuid,
        status: ManuscriptStatus,
    ) -> Result<Manuscript> {
        let mut manuscript: ManuscriptActiveModel = self
            .find_manuscript_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("manuscript", id))?
            .into();

        manuscript.status = Set(status.as_str().to_string());
        manuscript.updated_at = Set(now());

        manuscript.update(self.conn()).await.map_err(Into::into)
    }

    /// Compare-and-set on status. Returns whether the row changed.
    pub async fn advance_status(
        &self,
        id: Uuid,
        from: ManuscriptStatus,
        to: ManuscriptStatus,
    ) -> Result<bool> {
        let result = ManuscriptEntity::update_many()
            .col_expr(ManuscriptColumn::Status, Expr::value(to.as_str()))
            .col_expr(ManuscriptColumn::UpdatedAt, Expr::value(now()))
            .filter(ManuscriptColumn::Id.eq(id))
            .filter(ManuscriptColumn::Status.eq(from.as_str()))
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Version Operations
    // ========================================================================

    pub async fn find_version_by_id(&self, id: Uuid) -> Result<Option<ManuscriptVersion>> {
        ManuscriptVersionEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn list_versions(&self, manuscript_id: Uuid) -> Result<Vec<ManuscriptVersion>> {
        ManuscriptVersionEntity::find()
            .filter(ManuscriptVersionColumn::ManuscriptId.eq(manuscript_id))
            .order_by_asc(ManuscriptVersionColumn::VersionNumber)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Review Operations
    // ========================================================================

    pub async fn find_review(
        &self,
        manuscript_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<Option<ManuscriptReview>> {
        ManuscriptReviewEntity::find()
            .filter(ManuscriptReviewColumn::ManuscriptId.eq(manuscript_id))
            .filter(ManuscriptReviewColumn::ReviewerId.eq(reviewer_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Return the assignment row for the pair, inserting it if missing.
    /// The flag reports whether this call created the row. A duplicate
    /// insert from a concurrent request resolves to the existing row.
    pub async fn insert_review_if_absent(
        &self,
        manuscript_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<(ManuscriptReview, bool)> {
        if let Some(existing) = self.find_review(manuscript_id, reviewer_id).await? {
            return Ok((existing, false));
        }
        self.insert_review(manuscript_id, reviewer_id).await
    }

    /// Insert a pending review; losing a race to the pair index yields the winner's row
    async fn insert_review(
        &self,
        manuscript_id: Uuid,
        reviewer_id: Uuid,
    ) -> Result<(ManuscriptReview, bool)> {
        let review = ManuscriptReviewActiveModel {
            id: Set(Uuid::new_v4()),
            manuscript_id: Set(manuscript_id),
            reviewer_id: Set(reviewer_id),
            recommendation: Set(None),
            notes: Set(None),
            created_at: Set(now()),
            decided_at: Set(None),
        };

        match review.insert(self.conn()).await {
            Ok(created) => Ok((created, true)),
            Err(e) if is_unique_violation(&e) => {
                tracing::debug!(
                    manuscript_id = %manuscript_id,
                    reviewer_id = %reviewer_id,
                    "Concurrent assignment detected, returning existing row"
                );
                let existing = self
                    .find_review(manuscript_id, reviewer_id)
                    .await?
                    .ok_or(AppError::Database(e))?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_reviews_for_manuscript(
        &self,
        manuscript_id: Uuid,
    ) -> Result<Vec<ManuscriptReview>> {
        ManuscriptReviewEntity::find()
            .filter(ManuscriptReviewColumn::ManuscriptId.eq(manuscript_id))
            .order_by_asc(ManuscriptReviewColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Store a decision, overwriting any previous one
    pub async fn record_decision(
        &self,
        review: ManuscriptReview,
        recommendation: Recommendation,
        notes: Option<String>,
    ) -> Result<ManuscriptReview> {
        let mut active: ManuscriptReviewActiveModel = review.into();
        active.recommendation = Set(Some(recommendation.as_str().to_string()));
        active.notes = Set(notes);
        active.decided_at = Set(Some(now()));

        active.update(self.conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Issue Operations
    // ========================================================================

    /// Create an issue, one article per resolvable manuscript (in the
    /// order given) and mark every named manuscript `published`, in one
    /// transaction. Unknown ids are skipped. Returns the manuscripts that
    /// became articles.
    pub async fn create_issue_with_articles(
        &self,
        new_issue: NewIssue,
        manuscript_ids: &[Uuid],
    ) -> Result<(Issue, Vec<Article>, Vec<Manuscript>)> {
        let mut seen = HashSet::new();
        let ordered: Vec<Uuid> = manuscript_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let txn = self.conn().begin().await?;
        let now = now();

        let issue = IssueActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new_issue.title),
            volume: Set(new_issue.volume),
            issue_number: Set(new_issue.issue_number),
            published_at: Set(new_issue.published_at.into()),
            cover_url: Set(new_issue.cover_url),
            pdf_path: Set(new_issue.pdf_path.clone()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut by_id: HashMap<Uuid, Manuscript> = ManuscriptEntity::find()
            .filter(ManuscriptColumn::Id.is_in(ordered.iter().copied()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut articles = Vec::with_capacity(by_id.len());
        let mut included = Vec::with_capacity(by_id.len());
        for id in &ordered {
            let Some(manuscript) = by_id.remove(id) else {
                continue;
            };

            let article = ArticleActiveModel {
                id: Set(Uuid::new_v4()),
                issue_id: Set(issue.id),
                manuscript_id: Set(Some(manuscript.id)),
                position: Set(articles.len() as i32),
                title: Set(manuscript.title.clone()),
                abstract_text: Set(manuscript.abstract_text.clone()),
                authors: Set(manuscript.authors.clone()),
                pdf_path: Set(new_issue.pdf_path.clone()),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            articles.push(article);
            included.push(manuscript);
        }

        if articles.is_empty() {
            txn.rollback().await?;
            return Err(AppError::validation(
                "manuscript_ids",
                "None of the listed manuscripts exist",
            ));
        }

        ManuscriptEntity::update_many()
            .col_expr(
                ManuscriptColumn::Status,
                Expr::value(ManuscriptStatus::Published.as_str()),
            )
            .col_expr(ManuscriptColumn::UpdatedAt, Expr::value(now))
            .filter(ManuscriptColumn::Id.is_in(ordered.iter().copied()))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        for manuscript in &mut included {
            manuscript.status = ManuscriptStatus::Published.as_str().to_string();
            manuscript.updated_at = now;
        }

        Ok((issue, articles, included))
    }

    pub async fn find_issue_by_id(&self, id: Uuid) -> Result<Option<Issue>> {
        IssueEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Most recently published issue
    pub async fn latest_issue(&self) -> Result<Option<Issue>> {
        IssueEntity::find()
            .order_by_desc(IssueColumn::PublishedAt)
            .order_by_desc(IssueColumn::CreatedAt)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn list_issues(&self) -> Result<Vec<Issue>> {
        IssueEntity::find()
            .order_by_desc(IssueColumn::PublishedAt)
            .order_by_desc(IssueColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn update_issue_cover(&self, id: Uuid, cover_url: Option<String>) -> Result<Issue> {
        let mut issue: IssueActiveModel = self
            .find_issue_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("issue", id))?
            .into();

        issue.cover_url = Set(cover_url);
        issue.update(self.conn()).await.map_err(Into::into)
    }

    /// Table of contents order
    pub async fn list_articles_for_issue(&self, issue_id: Uuid) -> Result<Vec<Article>> {
        ArticleEntity::find()
            .filter(ArticleColumn::IssueId.eq(issue_id))
            .order_by_asc(ArticleColumn::Position)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Notification Operations
    // ========================================================================

    pub async fn insert_notification(
        &self,
        user_id: Uuid,
        manuscript_id: Option<Uuid>,
        title: &str,
        body: &str,
    ) -> Result<Notification> {
        NotificationActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            manuscript_id: Set(manuscript_id),
            title: Set(title.to_string()),
            body: Set(body.to_string()),
            created_at: Set(now()),
            read_at: Set(None),
        }
        .insert(self.conn())
        .await
        .map_err(Into::into)
    }

    /// Newest first
    pub async fn list_notifications_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Notification>> {
        NotificationEntity::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .order_by_desc(NotificationColumn::CreatedAt)
            .limit(limit)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Mark one of the user's notifications read. `None` if the row does
    /// not exist or belongs to someone else.
    pub async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Notification>> {
        let Some(notification) = NotificationEntity::find_by_id(id)
            .filter(NotificationColumn::UserId.eq(user_id))
            .one(self.conn())
            .await?
        else {
            return Ok(None);
        };

        if notification.read_at.is_some() {
            return Ok(Some(notification));
        }

        let mut active: NotificationActiveModel = notification.into();
        active.read_at = Set(Some(now()));
        Ok(Some(active.update(self.conn()).await?))
    }
}

async fn insert_version<C: ConnectionTrait>(
    conn: &C,
    manuscript_id: Uuid,
    version_number: i32,
    version: NewVersion,
) -> Result<ManuscriptVersion> {
    ManuscriptVersionActiveModel {
        id: Set(version.id),
        manuscript_id: Set(manuscript_id),
        version_number: Set(version_number),
        file_path: Set(version.file_path),
        file_name: Set(version.file_name),
        content_type: Set(version.content_type),
        size_bytes: Set(version.size_bytes),
        checksum: Set(version.checksum),
        uploaded_by: Set(version.uploaded_by),
        created_at: Set(now()),
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{submission, Harness};

    async fn manuscript_and_reviewer(h: &Harness) -> (Uuid, Uuid) {
        let author = h.caller("author@journal.org", Role::Author, false).await;
        let reviewer = h.caller("reviewer@journal.org", Role::Reviewer, true).await;
        let (manuscript, _) = h
            .services
            .manuscripts
            .create(&author, submission("Pair Index"))
            .await
            .unwrap();
        (manuscript.id, reviewer.profile.id)
    }

    #[tokio::test]
    async fn test_pair_index_rejects_duplicate_rows() {
        let h = Harness::new().await;
        let (manuscript_id, reviewer_id) = manuscript_and_reviewer(&h).await;
        h.repo
            .insert_review_if_absent(manuscript_id, reviewer_id)
            .await
            .unwrap();

        let duplicate = ManuscriptReviewActiveModel {
            id: Set(Uuid::new_v4()),
            manuscript_id: Set(manuscript_id),
            reviewer_id: Set(reviewer_id),
            recommendation: Set(None),
            notes: Set(None),
            created_at: Set(now()),
            decided_at: Set(None),
        };
        let err = duplicate.insert(h.repo_conn()).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_losing_insert_returns_existing_row() {
        let h = Harness::new().await;
        let (manuscript_id, reviewer_id) = manuscript_and_reviewer(&h).await;

        // Both writers passed the existence check; the second insert hits the index
        let (first, created) = h.repo.insert_review(manuscript_id, reviewer_id).await.unwrap();
        assert!(created);
        let (second, created) = h.repo.insert_review(manuscript_id, reviewer_id).await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);

        let reviews = h.repo.list_reviews_for_manuscript(manuscript_id).await.unwrap();
        assert_eq!(reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_profile_insert_is_idempotent_per_identity() {
        let h = Harness::new().await;
        let id = Uuid::new_v4();

        let first = h
            .repo
            .insert_profile(id, "Grace@Journal.org", Role::Author, false)
            .await
            .unwrap();
        assert_eq!(first.email, "grace@journal.org");

        let again = h
            .repo
            .insert_profile(id, "grace@journal.org", Role::Author, false)
            .await
            .unwrap();
        assert_eq!(again.id, id);

        let err = h
            .repo
            .insert_profile(Uuid::new_v4(), "grace@journal.org", Role::Author, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }
}
