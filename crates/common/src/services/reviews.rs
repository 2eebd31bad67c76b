//! Reviewer assignment and review decisions

use crate::auth::{Access, Caller};
use crate::db::models::{ManuscriptReview, ManuscriptStatus, Profile, Recommendation, Role};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::notify::{NotificationEvent, Notifier};
use tracing::{info, instrument};
use uuid::Uuid;

/// How the editor named the reviewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewerRef {
    Id(Uuid),
    Email(String),
}

impl ReviewerRef {
    /// An id wins over an email when both are supplied
    pub fn from_parts(id: Option<Uuid>, email: Option<String>) -> Result<Self> {
        match (id, email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())) {
            (Some(id), _) => Ok(ReviewerRef::Id(id)),
            (None, Some(email)) => Ok(ReviewerRef::Email(email)),
            (None, None) => Err(AppError::validation(
                "reviewer_id",
                "reviewer_id or reviewer_email is required",
            )),
        }
    }
}

pub struct ReviewService {
    repo: Repository,
    notifier: Notifier,
}

impl ReviewService {
    pub fn new(repo: Repository, notifier: Notifier) -> Self {
        Self { repo, notifier }
    }

    async fn resolve_reviewer(&self, reviewer: &ReviewerRef) -> Result<Profile> {
        let profile = match reviewer {
            ReviewerRef::Id(id) => self.repo.find_profile_by_id(*id).await?,
            ReviewerRef::Email(email) => self.repo.find_profile_by_email(email).await?,
        };

        profile
            .filter(|p| p.approved && p.role() == Role::Reviewer)
            .ok_or_else(|| {
                AppError::validation("reviewer", "Reviewer must be an approved reviewer profile")
            })
    }

    /// Assign a reviewer. Re-assigning an existing pair returns the
    /// existing row unchanged. The first assignment of a `submitted`
    /// manuscript moves it to `under_review`.
    #[instrument(skip(self, caller), fields(actor_id = %caller.user_id()))]
    pub async fn assign(
        &self,
        caller: &Caller,
        manuscript_id: Uuid,
        reviewer: ReviewerRef,
    ) -> Result<ManuscriptReview> {
        caller.require(Access::Editor)?;

        let reviewer = self.resolve_reviewer(&reviewer).await?;
        let manuscript = self
            .repo
            .find_manuscript_by_id(manuscript_id)
            .await?
            .ok_or_else(|| AppError::not_found("manuscript", manuscript_id))?;

        let (review, created) = self
            .repo
            .insert_review_if_absent(manuscript.id, reviewer.id)
            .await?;
        metrics::record_assignment(created);

        if !created {
            info!(review_id = %review.id, "Reviewer already assigned");
            return Ok(review);
        }

        info!(
            review_id = %review.id,
            manuscript_id = %manuscript.id,
            reviewer_id = %reviewer.id,
            "Reviewer assigned"
        );

        let advanced = self
            .repo
            .advance_status(
                manuscript.id,
                ManuscriptStatus::Submitted,
                ManuscriptStatus::UnderReview,
            )
            .await?;
        if advanced {
            metrics::record_status_change(ManuscriptStatus::UnderReview.as_str());
            self.notifier.dispatch(NotificationEvent::StatusChanged {
                manuscript_id: manuscript.id,
                status: ManuscriptStatus::UnderReview,
            });
        }

        self.notifier.dispatch(NotificationEvent::ReviewerAssigned {
            manuscript_id: manuscript.id,
            reviewer_id: reviewer.id,
        });
        Ok(review)
    }

    /// Record the caller's recommendation on an assigned manuscript.
    /// A repeat call overwrites the previous decision.
    #[instrument(skip(self, caller, notes), fields(actor_id = %caller.user_id()))]
    pub async fn submit_decision(
        &self,
        caller: &Caller,
        manuscript_id: Uuid,
        recommendation: &str,
        notes: Option<String>,
    ) -> Result<ManuscriptReview> {
        caller.require(Access::Reviewer)?;

        let recommendation = Recommendation::parse(recommendation).ok_or_else(|| {
            AppError::validation(
                "recommendation",
                format!("Unknown recommendation: {}", recommendation),
            )
        })?;

        let review = self
            .repo
            .find_review(manuscript_id, caller.user_id())
            .await?
            .ok_or_else(|| AppError::forbidden("Not assigned to this manuscript"))?;

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let review = self
            .repo
            .record_decision(review, recommendation, notes)
            .await?;

        metrics::record_decision(recommendation.as_str());
        info!(
            review_id = %review.id,
            recommendation = %recommendation,
            "Review decision recorded"
        );

        self.notifier.dispatch(NotificationEvent::DecisionSubmitted {
            manuscript_id,
            reviewer_id: caller.user_id(),
            recommendation,
        });
        Ok(review)
    }
}
