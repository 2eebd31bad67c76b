//! Manuscript submission, revisions, status changes and listings

use crate::auth::{Access, Caller};
use crate::db::models::{
    Authors, Manuscript, ManuscriptReview, ManuscriptStatus, ManuscriptVersion, Profile,
};
use crate::db::{NewManuscript, NewVersion, Repository};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::notify::{NotificationEvent, Notifier};
use crate::storage::{self, ObjectStorage, PDF_CONTENT_TYPE};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// An uploaded file as received from the client
#[derive(Debug, Clone, Default)]
pub struct FileUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    fn is_pdf(&self) -> bool {
        storage::is_pdf(self.content_type.as_deref(), self.file_name.as_deref())
    }

    fn name_or(&self, fallback: &str) -> String {
        self.file_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// A new submission from the multipart form
#[derive(Debug, Clone, Default)]
pub struct NewSubmission {
    pub title: String,
    pub abstract_text: Option<String>,
    /// JSON or free text
    pub authors: Option<String>,
    pub file: Option<FileUpload>,
    pub word_file: Option<FileUpload>,
}

/// Staff view of one manuscript
#[derive(Debug, Clone, Serialize)]
pub struct ManuscriptDetail {
    pub manuscript: Manuscript,
    pub authors: Authors,
    pub reviews: Vec<ManuscriptReview>,
    pub reviewer_profiles: Vec<Profile>,
    pub versions: Vec<ManuscriptVersion>,
}

/// Split an optional `data:<type>;base64,` prefix from a base64 payload
pub fn decode_base64_payload(payload: &str) -> Result<(Option<String>, Vec<u8>)> {
    let payload = payload.trim();
    let (content_type, data) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest.split_once(',').ok_or_else(|| AppError::InvalidFormat {
                message: "Malformed data URL".to_string(),
            })?;
            let media_type = header.strip_suffix(";base64").ok_or_else(|| {
                AppError::InvalidFormat {
                    message: "Data URL must be base64 encoded".to_string(),
                }
            })?;
            let media_type = (!media_type.is_empty()).then(|| media_type.to_string());
            (media_type, data)
        }
        None => (None, payload),
    };

    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| AppError::InvalidFormat {
            message: format!("Invalid base64 payload: {}", e),
        })?;
    Ok((content_type, bytes))
}

pub struct ManuscriptService {
    repo: Repository,
    storage: Arc<dyn ObjectStorage>,
    notifier: Notifier,
    max_upload_bytes: usize,
}

impl ManuscriptService {
    pub fn new(
        repo: Repository,
        storage: Arc<dyn ObjectStorage>,
        notifier: Notifier,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            repo,
            storage,
            notifier,
            max_upload_bytes,
        }
    }

    fn check_size(&self, upload: &FileUpload) -> Result<()> {
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge {
                size: upload.bytes.len(),
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    fn new_version(
        &self,
        manuscript_id: Uuid,
        upload: &FileUpload,
        uploaded_by: Uuid,
    ) -> (NewVersion, String) {
        let version_id = Uuid::new_v4();
        let file_name = upload.name_or("manuscript.pdf");
        let path = storage::version_path(manuscript_id, version_id, &file_name);
        let version = NewVersion {
            id: version_id,
            file_path: path.clone(),
            file_name: Some(file_name),
            content_type: PDF_CONTENT_TYPE.to_string(),
            size_bytes: upload.bytes.len() as i64,
            checksum: storage::checksum(&upload.bytes),
            uploaded_by: Some(uploaded_by),
        };
        (version, path)
    }

    /// Submit a manuscript: store the PDF, then insert the manuscript and
    /// its first version. Any authenticated caller may submit.
    #[instrument(skip(self, caller, submission), fields(actor_id = %caller.user_id()))]
    pub async fn create(
        &self,
        caller: &Caller,
        submission: NewSubmission,
    ) -> Result<(Manuscript, ManuscriptVersion)> {
        let title = submission.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("title", "Title is required"));
        }

        let file = submission
            .file
            .filter(|f| !f.bytes.is_empty())
            .ok_or_else(|| AppError::validation("file", "A PDF file is required"))?;
        if !file.is_pdf() {
            return Err(AppError::UnsupportedFileType {
                message: "Manuscripts must be submitted as PDF".to_string(),
            });
        }
        self.check_size(&file)?;

        let word_file = submission.word_file.filter(|f| !f.bytes.is_empty());
        if let Some(ref word) = word_file {
            self.check_size(word)?;
        }

        let authors = submission
            .authors
            .as_deref()
            .map(Authors::from_text)
            .and_then(|a| a.to_stored());
        let abstract_text = submission
            .abstract_text
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let manuscript_id = Uuid::new_v4();
        let (version, path) = self.new_version(manuscript_id, &file, caller.user_id());
        let size = file.bytes.len();

        self.storage
            .upload(&path, file.bytes, PDF_CONTENT_TYPE)
            .await?;

        let word_path = match word_file {
            Some(word) => {
                let path = storage::word_path(manuscript_id, &word.name_or("manuscript.docx"));
                let content_type = word
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                self.storage.upload(&path, word.bytes, &content_type).await?;
                Some(path)
            }
            None => None,
        };
        let has_word = word_path.is_some();

        let (manuscript, version) = self
            .repo
            .create_manuscript_with_version(
                NewManuscript {
                    id: manuscript_id,
                    title,
                    abstract_text,
                    author_id: Some(caller.user_id()),
                    submitter_id: Some(caller.user_id()),
                    authors,
                    word_path,
                },
                version,
            )
            .await?;

        metrics::record_submission(size, has_word);
        info!(manuscript_id = %manuscript.id, version_id = %version.id, "Manuscript submitted");

        Ok((manuscript, version))
    }

    /// Upload a revised PDF. Only the owner or editor-level staff may do
    /// this; status is not changed.
    #[instrument(skip(self, caller, file), fields(actor_id = %caller.user_id()))]
    pub async fn upload_revision(
        &self,
        caller: &Caller,
        manuscript_id: Uuid,
        file: FileUpload,
    ) -> Result<ManuscriptVersion> {
        let manuscript = self
            .repo
            .find_manuscript_by_id(manuscript_id)
            .await?
            .ok_or_else(|| AppError::not_found("manuscript", manuscript_id))?;

        if !caller.owns(&manuscript) && !caller.can(Access::Editor) {
            return Err(AppError::forbidden(
                "Only the author or editorial staff may upload revisions",
            ));
        }

        if file.bytes.is_empty() {
            return Err(AppError::validation("file", "File is empty"));
        }
        if !file.is_pdf() {
            return Err(AppError::validation("file", "Revisions must be PDF files"));
        }
        self.check_size(&file)?;

        let (version, path) = self.new_version(manuscript.id, &file, caller.user_id());
        let size = file.bytes.len();
        self.storage
            .upload(&path, file.bytes, PDF_CONTENT_TYPE)
            .await?;

        let (_, version) = self.repo.add_version(manuscript.id, version).await?;

        metrics::record_revision(size);
        info!(
            manuscript_id = %manuscript.id,
            version_id = %version.id,
            version_number = version.version_number,
            "Revision uploaded"
        );
        Ok(version)
    }

    /// Set a manuscript's status. Any editable status may follow any other;
    /// `published` is reserved for the publication compiler.
    #[instrument(skip(self, caller), fields(actor_id = %caller.user_id()))]
    pub async fn update_status(
        &self,
        caller: &Caller,
        manuscript_id: Uuid,
        status: &str,
    ) -> Result<Manuscript> {
        caller.require(Access::Editor)?;

        let status = ManuscriptStatus::parse(status)
            .filter(ManuscriptStatus::is_editable)
            .ok_or_else(|| {
                AppError::validation("status", format!("Status not allowed: {}", status))
            })?;

        let manuscript = self.repo.update_manuscript_status(manuscript_id, status).await?;

        metrics::record_status_change(status.as_str());
        info!(manuscript_id = %manuscript.id, status = %status, "Manuscript status updated");

        self.notifier.dispatch(NotificationEvent::StatusChanged {
            manuscript_id: manuscript.id,
            status,
        });
        Ok(manuscript)
    }

    /// Editors see everything, reviewers see their assignments
    pub async fn list_for_role(&self, caller: &Caller) -> Result<Vec<Manuscript>> {
        if caller.can(Access::Editor) {
            self.repo.list_manuscripts().await
        } else if caller.can(Access::Reviewer) {
            self.repo
                .list_manuscripts_for_reviewer(caller.user_id(), false)
                .await
        } else {
            Err(AppError::forbidden("Requires editor or reviewer access"))
        }
    }

    /// Work waiting on the caller
    pub async fn queue(&self, caller: &Caller) -> Result<Vec<Manuscript>> {
        if caller.can(Access::Editor) {
            self.repo
                .list_manuscripts_with_status(&[
                    ManuscriptStatus::Submitted,
                    ManuscriptStatus::UnderReview,
                ])
                .await
        } else if caller.can(Access::Reviewer) {
            self.repo
                .list_manuscripts_for_reviewer(caller.user_id(), true)
                .await
        } else {
            Err(AppError::forbidden("Requires editor or reviewer access"))
        }
    }

    /// Manuscripts the caller authored or submitted
    pub async fn list_mine(&self, caller: &Caller) -> Result<Vec<Manuscript>> {
        self.repo.list_manuscripts_owned_by(caller.user_id()).await
    }

    /// Detail view. Reviewers only see manuscripts assigned to them.
    pub async fn detail(&self, caller: &Caller, manuscript_id: Uuid) -> Result<ManuscriptDetail> {
        let is_editor = caller.can(Access::Editor);
        if !is_editor && !caller.can(Access::Reviewer) {
            return Err(AppError::forbidden("Requires editor or reviewer access"));
        }

        let manuscript = self
            .repo
            .find_manuscript_by_id(manuscript_id)
            .await?
            .ok_or_else(|| AppError::not_found("manuscript", manuscript_id))?;

        let reviews = self.repo.list_reviews_for_manuscript(manuscript.id).await?;
        if !is_editor && !reviews.iter().any(|r| r.reviewer_id == caller.user_id()) {
            return Err(AppError::forbidden("Not assigned to this manuscript"));
        }

        let reviewer_ids: Vec<Uuid> = reviews.iter().map(|r| r.reviewer_id).collect();
        let reviewer_profiles = self.repo.find_profiles_by_ids(&reviewer_ids).await?;
        let versions = self.repo.list_versions(manuscript.id).await?;

        Ok(ManuscriptDetail {
            authors: manuscript.normalized_authors(),
            manuscript,
            reviews,
            reviewer_profiles,
            versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::services::testing::{pdf, submission, Harness, PDF_BYTES};

    #[test]
    fn test_decode_base64_payload() {
        let (ct, bytes) = decode_base64_payload("data:application/pdf;base64,JVBERi0=").unwrap();
        assert_eq!(ct.as_deref(), Some("application/pdf"));
        assert_eq!(bytes, b"%PDF-");

        let (ct, bytes) = decode_base64_payload("JVBERi0=").unwrap();
        assert!(ct.is_none());
        assert_eq!(bytes, b"%PDF-");

        assert!(decode_base64_payload("data:application/pdf,JVBERi0=").is_err());
        assert!(decode_base64_payload("not base64!").is_err());
    }

    #[tokio::test]
    async fn test_create_sets_current_version() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;

        let (manuscript, version) = h
            .services
            .manuscripts
            .create(&author, submission("Trial Results"))
            .await
            .unwrap();

        assert_eq!(manuscript.manuscript_status(), ManuscriptStatus::Submitted);
        assert_eq!(manuscript.current_version, Some(version.id));
        assert_eq!(version.manuscript_id, manuscript.id);
        assert_eq!(version.version_number, 1);
        assert_eq!(version.checksum, storage::checksum(PDF_BYTES));

        let stored = h.storage.get(&version.file_path).await.unwrap();
        assert_eq!(stored.bytes, PDF_BYTES);
    }

    #[tokio::test]
    async fn test_create_requires_title_and_pdf() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;

        let mut blank = submission("   ");
        let err = h.services.manuscripts.create(&author, blank.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        blank.title = "Has title".to_string();
        blank.file = None;
        let err = h.services.manuscripts.create(&author, blank.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        blank.file = Some(FileUpload {
            file_name: Some("paper.docx".to_string()),
            content_type: Some("application/msword".to_string()),
            bytes: b"PK".to_vec(),
        });
        let err = h.services.manuscripts.create(&author, blank).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFileType { .. }));

        // Nothing reached storage
        assert!(h.storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_with_word_file_and_authors() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;

        let mut sub = submission("Trial Results");
        sub.authors = Some(r#"[{"name":"Ada","email":"ada@journal.org"}]"#.to_string());
        sub.word_file = Some(FileUpload {
            file_name: Some("source.docx".to_string()),
            content_type: None,
            bytes: b"PK\x03\x04".to_vec(),
        });

        let (manuscript, _) = h.services.manuscripts.create(&author, sub).await.unwrap();
        let word_path = manuscript.word_path.clone().unwrap();
        assert!(word_path.ends_with("source-source.docx"));
        assert_eq!(
            manuscript.normalized_authors().emails(),
            vec!["ada@journal.org".to_string()]
        );
        assert_eq!(h.storage.len().await, 2);
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let mut config = crate::config::AppConfig::default();
        config.storage.max_upload_bytes = 4;
        let h = Harness::with_config(config).await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;

        let err = h
            .services
            .manuscripts
            .create(&author, submission("Big"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_revision_repoints_current_version() {
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
        assert_eq!(second.version_number, 2);

        let reloaded = h.repo.find_manuscript_by_id(manuscript.id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_version, Some(second.id));
        assert_eq!(reloaded.status, manuscript.status);

        // Every version still points at its manuscript
        for version in h.repo.list_versions(manuscript.id).await.unwrap() {
            assert_eq!(version.manuscript_id, manuscript.id);
        }
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_revision_permissions_and_type() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;
        let stranger = h.caller("eve@journal.org", Role::Author, true).await;
        let editor = h.caller("ed@journal.org", Role::Editor, true).await;
        let (manuscript, _) = h
            .services
            .manuscripts
            .create(&author, submission("Trial Results"))
            .await
            .unwrap();

        let err = h
            .services
            .manuscripts
            .upload_revision(&stranger, manuscript.id, pdf("v2.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let not_pdf = FileUpload {
            file_name: Some("v2.docx".to_string()),
            content_type: Some("application/msword".to_string()),
            bytes: b"PK".to_vec(),
        };
        let err = h
            .services
            .manuscripts
            .upload_revision(&editor, manuscript.id, not_pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        // Suffix alone is enough
        let by_name = FileUpload {
            file_name: Some("v2.pdf".to_string()),
            content_type: None,
            bytes: PDF_BYTES.to_vec(),
        };
        tokio_test::assert_ok!(
            h.services
                .manuscripts
                .upload_revision(&editor, manuscript.id, by_name)
                .await
        );
    }

    #[tokio::test]
    async fn test_update_status() {
        let mut h = Harness::new().await;
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
            .manuscripts
            .update_status(&author, manuscript.id, "accepted")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        for bad in ["published", "archived", ""] {
            let err = h
                .services
                .manuscripts
                .update_status(&editor, manuscript.id, bad)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }

        // Permissive transitions: rejected may move back to under_review
        for status in ["rejected", "under_review", "accepted"] {
            h.services
                .manuscripts
                .update_status(&editor, manuscript.id, status)
                .await
                .unwrap();
        }
        let reloaded = h.repo.find_manuscript_by_id(manuscript.id).await.unwrap().unwrap();
        assert_eq!(reloaded.manuscript_status(), ManuscriptStatus::Accepted);

        let events = h.drain_events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            NotificationEvent::StatusChanged {
                manuscript_id: manuscript.id,
                status: ManuscriptStatus::Accepted,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_manuscript_status_update_is_not_found() {
        let h = Harness::new().await;
        let editor = h.caller("ed@journal.org", Role::Editor, true).await;
        let err = h
            .services
            .manuscripts
            .update_status(&editor, Uuid::new_v4(), "accepted")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_listings_by_role() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;
        let editor = h.caller("ed@journal.org", Role::Admin, true).await;
        let reviewer = h.caller("rev@journal.org", Role::Reviewer, true).await;

        let (first, _) = h
            .services
            .manuscripts
            .create(&author, submission("First"))
            .await
            .unwrap();
        h.services
            .manuscripts
            .create(&author, submission("Second"))
            .await
            .unwrap();
        h.repo.insert_review_if_absent(first.id, reviewer.user_id()).await.unwrap();

        assert_eq!(h.services.manuscripts.list_for_role(&editor).await.unwrap().len(), 2);
        let assigned = h.services.manuscripts.list_for_role(&reviewer).await.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, first.id);

        let err = h.services.manuscripts.list_for_role(&author).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        assert_eq!(h.services.manuscripts.list_mine(&author).await.unwrap().len(), 2);
        assert!(h.services.manuscripts.list_mine(&reviewer).await.unwrap().is_empty());

        assert_eq!(h.services.manuscripts.queue(&editor).await.unwrap().len(), 2);
        assert_eq!(h.services.manuscripts.queue(&reviewer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_detail_restricted_for_reviewers() {
        let h = Harness::new().await;
        let author = h.caller("ada@journal.org", Role::Author, false).await;
        let editor = h.caller("ed@journal.org", Role::Editor, true).await;
        let assigned = h.caller("rev@journal.org", Role::Reviewer, true).await;
        let other = h.caller("rev2@journal.org", Role::Reviewer, true).await;

        let (manuscript, _) = h
            .services
            .manuscripts
            .create(&author, submission("Trial Results"))
            .await
            .unwrap();
        h.repo
            .insert_review_if_absent(manuscript.id, assigned.user_id())
            .await
            .unwrap();

        let detail = h.services.manuscripts.detail(&editor, manuscript.id).await.unwrap();
        assert_eq!(detail.reviews.len(), 1);
        assert_eq!(detail.reviewer_profiles[0].email, "rev@journal.org");
        assert_eq!(detail.versions.len(), 1);

        tokio_test::assert_ok!(h.services.manuscripts.detail(&assigned, manuscript.id).await);

        let err = h.services.manuscripts.detail(&other, manuscript.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        let err = h.services.manuscripts.detail(&author, manuscript.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }
}
