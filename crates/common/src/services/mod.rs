//! Workflow services: the operations behind the HTTP surface
//!
//! Every mutating operation authorizes first, validates second, and only
//! then touches storage or the database. Notifications are dispatched after
//! the primary write has committed.

mod files;
mod inbox;
mod manuscripts;
mod profiles;
mod publication;
mod reviews;

pub use files::{FileAccessBroker, FileKind, SignedUrl};
pub use inbox::InboxService;
pub use manuscripts::{
    decode_base64_payload, FileUpload, ManuscriptDetail, ManuscriptService, NewSubmission,
};
pub use profiles::ProfileService;
pub use publication::{ArticleWithIssue, IssueWithArticles, PublicationService, PublishIssue};
pub use reviews::{ReviewService, ReviewerRef};

use crate::config::AppConfig;
use crate::db::Repository;
use crate::notify::Notifier;
use crate::storage::ObjectStorage;
use std::sync::Arc;

/// Container for all services, injected into the router state
#[derive(Clone)]
pub struct Services {
    pub profiles: Arc<ProfileService>,
    pub manuscripts: Arc<ManuscriptService>,
    pub reviews: Arc<ReviewService>,
    pub publication: Arc<PublicationService>,
    pub files: Arc<FileAccessBroker>,
    pub inbox: Arc<InboxService>,
}

impl Services {
    pub fn new(
        repo: Repository,
        storage: Arc<dyn ObjectStorage>,
        notifier: Notifier,
        config: &AppConfig,
    ) -> Self {
        let ttl = config.signed_url_ttl();
        let files = Arc::new(FileAccessBroker::new(repo.clone(), storage.clone(), ttl));

        Self {
            profiles: Arc::new(ProfileService::new(
                repo.clone(),
                config.auth.seed_admin_email.clone(),
            )),
            manuscripts: Arc::new(ManuscriptService::new(
                repo.clone(),
                storage,
                notifier.clone(),
                config.storage.max_upload_bytes,
            )),
            reviews: Arc::new(ReviewService::new(repo.clone(), notifier.clone())),
            publication: Arc::new(PublicationService::new(
                repo.clone(),
                files.clone(),
                notifier,
                config.publication.require_accepted,
            )),
            files,
            inbox: Arc::new(InboxService::new(repo)),
        }
    }
}
