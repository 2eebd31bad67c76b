//! Issue publication and the public table of contents

use super::{ok, ApiJson, ApiPath, ApiResponse};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use journal_common::db::models::Issue;
use journal_common::errors::{AppError, Result};
use journal_common::services::{ArticleWithIssue, IssueWithArticles, PublishIssue, SignedUrl};
use journal_common::Caller;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct PublishIssueRequest {
    #[validate(length(max = 500))]
    pub title: String,
    #[serde(default)]
    pub volume: Option<i32>,
    #[serde(default, alias = "issueNumber")]
    pub issue_number: Option<i32>,
    /// RFC 3339 timestamp or a plain `YYYY-MM-DD` date
    #[serde(default, alias = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(default, alias = "coverUrl")]
    #[validate(length(max = 2048))]
    pub cover_url: Option<String>,
    #[serde(default, alias = "pdfPath")]
    #[validate(length(max = 1024))]
    pub pdf_path: Option<String>,
    #[serde(default, alias = "manuscriptIds")]
    pub manuscript_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCoverRequest {
    #[serde(default, alias = "coverUrl")]
    #[validate(length(max = 2048))]
    pub cover_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueResponse {
    pub issue: Issue,
}

#[derive(Debug, Serialize)]
pub struct IssueListResponse {
    pub issues: Vec<Issue>,
}

fn parse_published_at(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| AppError::validation("published_at", format!("Invalid date: {}", value)))
}

/// POST /admin/publish-issue
pub async fn publish_issue(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<PublishIssueRequest>,
) -> Result<(StatusCode, ApiResponse<IssueWithArticles>)> {
    request.validate()?;

    let published = state
        .services
        .publication
        .publish_issue(
            &caller,
            PublishIssue {
                published_at: parse_published_at(request.published_at.as_deref())?,
                title: request.title,
                volume: request.volume,
                issue_number: request.issue_number,
                cover_url: request.cover_url,
                pdf_path: request.pdf_path,
                manuscript_ids: request.manuscript_ids,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, ok(published)))
}

/// PATCH /admin/issues/{id}/cover
pub async fn update_cover(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(issue_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateCoverRequest>,
) -> Result<ApiResponse<IssueResponse>> {
    request.validate()?;

    let issue = state
        .services
        .publication
        .update_cover(&caller, issue_id, request.cover_url)
        .await?;
    Ok(ok(IssueResponse { issue }))
}

/// GET /issues
pub async fn list_issues(State(state): State<AppState>) -> Result<ApiResponse<IssueListResponse>> {
    let issues = state.services.publication.list_issues().await?;
    Ok(ok(IssueListResponse { issues }))
}

/// GET /issues/latest
pub async fn latest_issue(
    State(state): State<AppState>,
) -> Result<ApiResponse<IssueWithArticles>> {
    Ok(ok(state.services.publication.latest_issue().await?))
}

/// GET /issues/{id}
pub async fn get_issue(
    State(state): State<AppState>,
    ApiPath(issue_id): ApiPath<Uuid>,
) -> Result<ApiResponse<IssueWithArticles>> {
    Ok(ok(state.services.publication.issue(issue_id).await?))
}

/// GET /articles/{id}
pub async fn get_article(
    State(state): State<AppState>,
    ApiPath(article_id): ApiPath<Uuid>,
) -> Result<ApiResponse<ArticleWithIssue>> {
    Ok(ok(state.services.publication.article(article_id).await?))
}

/// GET /articles/{id}/pdf
pub async fn article_pdf(
    State(state): State<AppState>,
    ApiPath(article_id): ApiPath<Uuid>,
) -> Result<ApiResponse<SignedUrl>> {
    Ok(ok(state
        .services
        .publication
        .article_pdf_url(article_id)
        .await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_published_at() {
        assert_eq!(parse_published_at(None).unwrap(), None);
        assert_eq!(parse_published_at(Some("  ")).unwrap(), None);

        let date = parse_published_at(Some("2024-03-01")).unwrap().unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let ts = parse_published_at(Some("2024-03-01T12:30:00+02:00"))
            .unwrap()
            .unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:30:00+00:00");

        assert!(parse_published_at(Some("March 1st")).is_err());
    }
}
