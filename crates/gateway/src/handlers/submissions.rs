//! Submission handlers: create, revise, list own, signed download links

use super::{ok, ApiJson, ApiPath, ApiQuery, ApiResponse};
use crate::AppState;
use axum::extract::multipart::Field;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use journal_common::db::models::{Manuscript, ManuscriptVersion};
use journal_common::errors::Result;
use journal_common::services::{
    decode_base64_payload, FileKind, FileUpload, NewSubmission, SignedUrl,
};
use journal_common::Caller;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct SubmissionCreatedResponse {
    pub manuscript: Manuscript,
    pub version: ManuscriptVersion,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: ManuscriptVersion,
}

#[derive(Debug, Serialize)]
pub struct ManuscriptListResponse {
    pub manuscripts: Vec<Manuscript>,
}

/// Revision body: the PDF as base64, optionally a data URL
#[derive(Debug, Deserialize, Validate)]
pub struct UploadRevisionRequest {
    #[serde(alias = "file_base64", alias = "fileBase64")]
    #[validate(length(min = 1))]
    pub file: String,
    #[serde(default, alias = "fileName")]
    #[validate(length(max = 255))]
    pub file_name: Option<String>,
    #[serde(default, alias = "contentType")]
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

async fn read_upload(field: Field<'_>) -> Result<Option<FileUpload>> {
    let file_name = field
        .file_name()
        .map(String::from)
        .filter(|n| !n.is_empty());
    let content_type = field.content_type().map(String::from);
    let bytes = field.bytes().await?;

    if bytes.is_empty() && file_name.is_none() {
        return Ok(None);
    }
    Ok(Some(FileUpload {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    }))
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// POST /submissions/create (multipart: title, abstract, authors, file, word_file)
pub async fn create_submission(
    State(state): State<AppState>,
    caller: Caller,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, ApiResponse<SubmissionCreatedResponse>)> {
    let mut multipart = multipart?;
    let mut submission = NewSubmission::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => submission.title = field.text().await?,
            "abstract" => submission.abstract_text = non_empty(field.text().await?),
            "authors" => submission.authors = non_empty(field.text().await?),
            "file" => submission.file = read_upload(field).await?,
            "word_file" => submission.word_file = read_upload(field).await?,
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let (manuscript, version) = state
        .services
        .manuscripts
        .create(&caller, submission)
        .await?;

    Ok((
        StatusCode::CREATED,
        ok(SubmissionCreatedResponse {
            manuscript,
            version,
        }),
    ))
}

/// POST /submissions/{id}/upload-revision
pub async fn upload_revision(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(manuscript_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UploadRevisionRequest>,
) -> Result<(StatusCode, ApiResponse<VersionResponse>)> {
    request.validate()?;

    let (data_url_type, bytes) = decode_base64_payload(&request.file)?;
    let upload = FileUpload {
        file_name: request.file_name,
        content_type: request.content_type.or(data_url_type),
        bytes,
    };

    let version = state
        .services
        .manuscripts
        .upload_revision(&caller, manuscript_id, upload)
        .await?;

    Ok((StatusCode::CREATED, ok(VersionResponse { version })))
}

/// GET /submissions/mine
pub async fn my_submissions(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<ApiResponse<ManuscriptListResponse>> {
    let manuscripts = state.services.manuscripts.list_mine(&caller).await?;
    Ok(ok(ManuscriptListResponse { manuscripts }))
}

/// GET /submissions/{id}/signed-url?type=pdf|word
pub async fn signed_url(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<SignedUrlQuery>,
) -> Result<ApiResponse<SignedUrl>> {
    let kind = FileKind::parse(query.kind.as_deref())?;
    let signed = state.services.files.signed_url(&caller, id, kind).await?;
    Ok(ok(signed))
}
