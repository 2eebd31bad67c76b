//! Publication compiler and public issue reads

use super::files::{FileAccessBroker, SignedUrl};
use crate::auth::{Access, Caller};
use crate::db::models::{Article, Issue, ManuscriptStatus};
use crate::db::{NewIssue, Repository};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::notify::{NotificationEvent, Notifier};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input to the publication compiler
#[derive(Debug, Clone, Default)]
pub struct PublishIssue {
    pub title: String,
    pub volume: Option<i32>,
    pub issue_number: Option<i32>,
    /// Defaults to now
    pub published_at: Option<DateTime<Utc>>,
    pub cover_url: Option<String>,
    pub pdf_path: Option<String>,
    pub manuscript_ids: Vec<Uuid>,
}

/// An issue with its table of contents
#[derive(Debug, Clone, Serialize)]
pub struct IssueWithArticles {
    pub issue: Issue,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleWithIssue {
    pub article: Article,
    pub issue: Option<Issue>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct PublicationService {
    repo: Repository,
    files: Arc<FileAccessBroker>,
    notifier: Notifier,
    require_accepted: bool,
}

impl PublicationService {
    pub fn new(
        repo: Repository,
        files: Arc<FileAccessBroker>,
        notifier: Notifier,
        require_accepted: bool,
    ) -> Self {
        Self {
            repo,
            files,
            notifier,
            require_accepted,
        }
    }

    /// Create an issue from a batch of manuscripts and mark them published.
    /// Issue, articles and status changes commit together.
    #[instrument(skip(self, caller, request), fields(actor_id = %caller.user_id()))]
    pub async fn publish_issue(
        &self,
        caller: &Caller,
        request: PublishIssue,
    ) -> Result<IssueWithArticles> {
        caller.require(Access::Editor)?;

        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("title", "Title is required"));
        }
        if request.manuscript_ids.is_empty() {
            return Err(AppError::validation(
                "manuscript_ids",
                "At least one manuscript is required",
            ));
        }

        if self.require_accepted {
            let found = self.repo.find_manuscripts_by_ids(&request.manuscript_ids).await?;
            for id in &request.manuscript_ids {
                match found.iter().find(|m| m.id == *id) {
                    Some(m) if m.manuscript_status() == ManuscriptStatus::Accepted => {}
                    Some(m) => {
                        return Err(AppError::validation(
                            "manuscript_ids",
                            format!("Manuscript {} is {}, not accepted", id, m.status),
                        ))
                    }
                    None => {
                        return Err(AppError::validation(
                            "manuscript_ids",
                            format!("Manuscript {} does not exist", id),
                        ))
                    }
                }
            }
        }

        let new_issue = NewIssue {
            title,
            volume: request.volume,
            issue_number: request.issue_number,
            published_at: request.published_at.unwrap_or_else(Utc::now),
            cover_url: non_empty(request.cover_url),
            pdf_path: non_empty(request.pdf_path),
        };

        let (issue, articles, published) = self
            .repo
            .create_issue_with_articles(new_issue, &request.manuscript_ids)
            .await?;

        metrics::record_issue_published(articles.len());
        info!(
            issue_id = %issue.id,
            articles = articles.len(),
            requested = request.manuscript_ids.len(),
            "Issue published"
        );

        for manuscript in &published {
            metrics::record_status_change(ManuscriptStatus::Published.as_str());
            self.notifier.dispatch(NotificationEvent::StatusChanged {
                manuscript_id: manuscript.id,
                status: ManuscriptStatus::Published,
            });
        }

        Ok(IssueWithArticles { issue, articles })
    }

    pub async fn update_cover(
        &self,
        caller: &Caller,
        issue_id: Uuid,
        cover_url: Option<String>,
    ) -> Result<Issue> {
        caller.require(Access::Editor)?;
        let issue = self
            .repo
            .update_issue_cover(issue_id, non_empty(cover_url))
            .await?;
        info!(actor_id = %caller.user_id(), issue_id = %issue.id, "Issue cover updated");
        Ok(issue)
    }

    /// Newest first
    pub async fn list_issues(&self) -> Result<Vec<Issue>> {
        self.repo.list_issues().await
    }

    pub async fn issue(&self, issue_id: Uuid) -> Result<IssueWithArticles> {
        let issue = self
            .repo
            .find_issue_by_id(issue_id)
            .await?
            .ok_or_else(|| AppError::not_found("issue", issue_id))?;
        let articles = self.repo.list_articles_for_issue(issue.id).await?;
        Ok(IssueWithArticles { issue, articles })
    }

    pub async fn latest_issue(&self) -> Result<IssueWithArticles> {
        let issue = self
            .repo
            .latest_issue()
            .await?
            .ok_or_else(|| AppError::not_found("issue", "latest"))?;
        let articles = self.repo.list_articles_for_issue(issue.id).await?;
        Ok(IssueWithArticles { issue, articles })
    }

    pub async fn article(&self, article_id: Uuid) -> Result<ArticleWithIssue> {
        let article = self
            .repo
            .find_article_by_id(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("article", article_id))?;
        let issue = self.repo.find_issue_by_id(article.issue_id).await?;
        Ok(ArticleWithIssue { article, issue })
    }

    /// Public download link for a published article
    pub async fn article_pdf_url(&self, article_id: Uuid) -> Result<SignedUrl> {
        let ArticleWithIssue { article, .. } = self.article(article_id).await?;
        let path = article
            .pdf_path
            .ok_or_else(|| AppError::not_found("article pdf", article_id))?;
        self.files.public_url(&path).await
    }
}
