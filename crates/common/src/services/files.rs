//! File access broker: resolves stored paths and mints signed URLs

use crate::auth::{Access, Caller};
use crate::db::models::Manuscript;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::ObjectStorage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Word,
}

impl FileKind {
    /// Absent means `pdf`
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") | Some("pdf") => Ok(FileKind::Pdf),
            Some("word") => Ok(FileKind::Word),
            Some(other) => Err(AppError::validation(
                "type",
                format!("Unknown file type: {}", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Word => "word",
        }
    }
}

/// A freshly minted download link
#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub struct FileAccessBroker {
    repo: Repository,
    storage: Arc<dyn ObjectStorage>,
    ttl: Duration,
}

impl FileAccessBroker {
    pub fn new(repo: Repository, storage: Arc<dyn ObjectStorage>, ttl: Duration) -> Self {
        Self { repo, storage, ttl }
    }

    /// Signed URL for a manuscript file. `id` may name a version or a
    /// manuscript; a manuscript id follows its current version.
    pub async fn signed_url(&self, caller: &Caller, id: Uuid, kind: FileKind) -> Result<SignedUrl> {
        let path = match kind {
            FileKind::Word => {
                caller.require(Access::Editor)?;
                let manuscript = self.manuscript(id).await?;
                manuscript
                    .word_path
                    .ok_or_else(|| AppError::not_found("word file", id))?
            }
            FileKind::Pdf => {
                let (manuscript, version_path) = self.locate_pdf(id).await?;
                self.authorize(caller, &manuscript).await?;
                self.pdf_path(manuscript, version_path).await?
            }
        };

        debug!(actor_id = %caller.user_id(), kind = kind.as_str(), "Issuing signed URL");
        self.mint(&path, kind.as_str()).await
    }

    /// Signed URL for a published path, no caller required
    pub async fn public_url(&self, path: &str) -> Result<SignedUrl> {
        self.mint(path, "article").await
    }

    async fn mint(&self, path: &str, kind: &str) -> Result<SignedUrl> {
        let url = self.storage.signed_url(path, self.ttl).await?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        metrics::record_signed_url(kind);
        Ok(SignedUrl { url, expires_at })
    }

    async fn manuscript(&self, id: Uuid) -> Result<Manuscript> {
        self.repo
            .find_manuscript_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("manuscript", id))
    }

    /// The manuscript behind a version id or a manuscript id, plus the
    /// version's path when a version id was given
    async fn locate_pdf(&self, id: Uuid) -> Result<(Manuscript, Option<String>)> {
        if let Some(version) = self.repo.find_version_by_id(id).await? {
            let manuscript = self.manuscript(version.manuscript_id).await?;
            return Ok((manuscript, Some(version.file_path)));
        }
        Ok((self.manuscript(id).await?, None))
    }

    /// `current_version` first, then the legacy single-file path
    async fn pdf_path(&self, manuscript: Manuscript, version_path: Option<String>) -> Result<String> {
        if let Some(path) = version_path {
            return Ok(path);
        }

        if let Some(version_id) = manuscript.current_version {
            if let Some(version) = self.repo.find_version_by_id(version_id).await? {
                return Ok(version.file_path);
            }
        }

        match manuscript.file_storage_path {
            Some(path) if !path.is_empty() => Ok(path),
            _ => Err(AppError::not_found("manuscript file", manuscript.id)),
        }
    }

    /// Editors, the owner, or an assigned reviewer
    async fn authorize(&self, caller: &Caller, manuscript: &Manuscript) -> Result<()> {
        if caller.can(Access::Editor) || caller.owns(manuscript) {
            return Ok(());
        }
        if caller.can(Access::Reviewer)
            && self
                .repo
                .find_review(manuscript.id, caller.user_id())
                .await?
                .is_some()
        {
            return Ok(());
        }
        Err(AppError::forbidden("No access to this manuscript file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ManuscriptActiveModel, Role};
    use crate::db::{NewManuscript, NewVersion};
    use crate::services::testing::{pdf, submission, Harness};
    use sea_orm::{ActiveModelTrait, Set};

    #[test]
    fn test_file_kind_parse() {
        assert_eq!(FileKind::parse(None).unwrap(), FileKind::Pdf);
        assert_eq!(FileKind::parse(Some("word")).unwrap(), FileKind::Word);
        assert!(FileKind::parse(Some("zip")).is_err());
    }

    #[tokio::test]
    async fn test_pdf_by_manuscript_and_version_id() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;
        let (manuscript, first) = h
            .services
            .manuscripts
            .create(&author, submission("Trial Results"))
            .await
            .unwrap();
        let second = h
            .services
            .manuscripts
            .upload_revision(&author, manuscript.id, pdf("v2.pdf"))
            .await
            .unwrap();

        let current = h
            .services
            .files
            .signed_url(&author, manuscript.id, FileKind::Pdf)
            .await
            .unwrap();
        assert!(current.url.contains(&second.file_path));
        assert!(current.expires_at > Utc::now() + chrono::Duration::minutes(59));

        let old = h
            .services
            .files
            .signed_url(&author, first.id, FileKind::Pdf)
            .await
            .unwrap();
        assert!(old.url.contains(&first.file_path));
    }

    #[tokio::test]
    async fn test_manuscript_without_version_is_not_found() {
        let h = Harness::new().await;
        let editor = h.caller("ed@journal.org", Role::Editor, true).await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;

        let (manuscript, _) = h
            .services
            .manuscripts
            .create(&author, submission("Trial Results"))
            .await
            .unwrap();
        let mut active: ManuscriptActiveModel = manuscript.clone().into();
        active.current_version = Set(None);
        active.update(h.repo_conn()).await.unwrap();

        let err = h
            .services
            .files
            .signed_url(&editor, manuscript.id, FileKind::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        let err = h
            .services
            .files
            .signed_url(&editor, Uuid::new_v4(), FileKind::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_stranger_is_forbidden_before_file_lookup() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;
        let stranger = h.caller("eve@journal.org", Role::Author, false).await;

        let (manuscript, _) = h
            .services
            .manuscripts
            .create(&author, submission("Trial Results"))
            .await
            .unwrap();
        let mut active: ManuscriptActiveModel = manuscript.clone().into();
        active.current_version = Set(None);
        active.update(h.repo_conn()).await.unwrap();

        // A missing file is only reported to callers who may see the manuscript
        let err = h
            .services
            .files
            .signed_url(&stranger, manuscript.id, FileKind::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let err = h
            .services
            .files
            .signed_url(&author, manuscript.id, FileKind::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_legacy_path_fallback() {
        let h = Harness::new().await;
        let editor = h.caller("ed@journal.org", Role::Editor, true).await;
        h.storage
            .upload("legacy/old.pdf", b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap();

        let (manuscript, _) = h
            .repo
            .create_manuscript_with_version(
                NewManuscript {
                    id: Uuid::new_v4(),
                    title: "Legacy".to_string(),
                    abstract_text: None,
                    author_id: None,
                    submitter_id: None,
                    authors: None,
                    word_path: None,
                },
                NewVersion {
                    id: Uuid::new_v4(),
                    file_path: "legacy/old.pdf".to_string(),
                    file_name: None,
                    content_type: "application/pdf".to_string(),
                    size_bytes: 4,
                    checksum: String::new(),
                    uploaded_by: None,
                },
            )
            .await
            .unwrap();
        let mut active: ManuscriptActiveModel = manuscript.clone().into();
        active.current_version = Set(None);
        active.file_storage_path = Set(Some("legacy/old.pdf".to_string()));
        active.update(h.repo_conn()).await.unwrap();

        let url = h
            .services
            .files
            .signed_url(&editor, manuscript.id, FileKind::Pdf)
            .await
            .unwrap();
        assert!(url.url.contains("legacy/old.pdf"));
    }

    #[tokio::test]
    async fn test_pdf_access_rules() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;
        let stranger = h.caller("eve@journal.org", Role::Author, true).await;
        let reviewer = h.caller("r@journal.org", Role::Reviewer, true).await;
        let (manuscript, _) = h
            .services
            .manuscripts
            .create(&author, submission("Trial Results"))
            .await
            .unwrap();

        let err = h
            .services
            .files
            .signed_url(&stranger, manuscript.id, FileKind::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let err = h
            .services
            .files
            .signed_url(&reviewer, manuscript.id, FileKind::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        h.repo
            .insert_review_if_absent(manuscript.id, reviewer.user_id())
            .await
            .unwrap();
        tokio_test::assert_ok!(
            h.services
                .files
                .signed_url(&reviewer, manuscript.id, FileKind::Pdf)
                .await
        );
    }

    #[tokio::test]
    async fn test_word_requires_editor_and_path() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;
        let editor = h.caller("ed@journal.org", Role::Editor, true).await;
        let (manuscript, _) = h
            .services
            .manuscripts
            .create(&author, submission("Trial Results"))
            .await
            .unwrap();

        let err = h
            .services
            .files
            .signed_url(&author, manuscript.id, FileKind::Word)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let err = h
            .services
            .files
            .signed_url(&editor, manuscript.id, FileKind::Word)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
