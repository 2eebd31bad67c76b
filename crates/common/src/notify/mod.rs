//! Notification fan-out
//!
//! Workflow operations dispatch events onto an in-process queue after their
//! primary write has committed. A worker task resolves recipients, inserts
//! in-app notifications and sends email. Delivery is best-effort: nothing
//! here ever reports an error back to the operation that raised the event.

use crate::db::models::{Manuscript, ManuscriptStatus, Profile, Recommendation};
use crate::db::Repository;
use crate::mail::{EmailMessage, Mailer};
use crate::metrics;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Workflow events that produce notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// Status changed by an editor or by publication
    StatusChanged {
        manuscript_id: Uuid,
        status: ManuscriptStatus,
    },
    /// A reviewer was newly assigned
    ReviewerAssigned {
        manuscript_id: Uuid,
        reviewer_id: Uuid,
    },
    /// A reviewer recorded a recommendation
    DecisionSubmitted {
        manuscript_id: Uuid,
        reviewer_id: Uuid,
        recommendation: Recommendation,
    },
}

impl NotificationEvent {
    pub fn manuscript_id(&self) -> Uuid {
        match self {
            NotificationEvent::StatusChanged { manuscript_id, .. }
            | NotificationEvent::ReviewerAssigned { manuscript_id, .. }
            | NotificationEvent::DecisionSubmitted { manuscript_id, .. } => *manuscript_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::StatusChanged { .. } => "status_changed",
            NotificationEvent::ReviewerAssigned { .. } => "reviewer_assigned",
            NotificationEvent::DecisionSubmitted { .. } => "decision_submitted",
        }
    }
}

/// Sending half of the fan-out queue
#[derive(Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<NotificationEvent>>,
}

impl Notifier {
    /// Create a notifier and the receiver its worker consumes
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that drops every event
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Enqueue without waiting. A full or closed queue drops the event.
    pub fn dispatch(&self, event: NotificationEvent) {
        let Some(ref tx) = self.tx else {
            debug!(kind = event.kind(), "Notifications disabled, event dropped");
            return;
        };

        if let Err(e) = tx.try_send(event) {
            let (reason, event) = match e {
                mpsc::error::TrySendError::Full(ev) => ("queue full", ev),
                mpsc::error::TrySendError::Closed(ev) => ("queue closed", ev),
            };
            warn!(
                kind = event.kind(),
                manuscript_id = %event.manuscript_id(),
                reason,
                "Notification event dropped"
            );
        }
    }
}

/// What a single event produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub in_app_created: usize,
    pub emails_sent: usize,
    pub failures: usize,
}

/// Recipients of one event: profiles get in-app rows, every address gets email
#[derive(Debug, Default)]
struct Recipients {
    profile_ids: BTreeSet<Uuid>,
    emails: BTreeSet<String>,
}

impl Recipients {
    fn add_profile(&mut self, profile: &Profile) {
        self.profile_ids.insert(profile.id);
        self.emails.insert(profile.email.to_ascii_lowercase());
    }
}

/// Consumes the fan-out queue
pub struct NotificationWorker {
    repository: Repository,
    mailer: Arc<dyn Mailer>,
    portal_url: String,
}

impl NotificationWorker {
    pub fn new(repository: Repository, mailer: Arc<dyn Mailer>, portal_url: String) -> Self {
        Self {
            repository,
            mailer,
            portal_url: portal_url.trim_end_matches('/').to_string(),
        }
    }

    /// Process events until every notifier is dropped
    pub async fn run(self, mut rx: mpsc::Receiver<NotificationEvent>) {
        info!(mailer = self.mailer.name(), "Notification worker started");

        while let Some(event) = rx.recv().await {
            self.process(event).await;
        }

        info!("Notification worker stopped");
    }

    /// Deliver one event. Failures are logged and counted, never returned.
    #[instrument(skip(self), fields(kind = event.kind(), manuscript_id = %event.manuscript_id()))]
    pub async fn process(&self, event: NotificationEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let manuscript = match self
            .repository
            .find_manuscript_by_id(event.manuscript_id())
            .await
        {
            Ok(Some(m)) => m,
            Ok(None) => {
                warn!("Manuscript vanished before notification delivery");
                return report;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load manuscript for notification");
                report.failures += 1;
                return report;
            }
        };

        let recipients = match self.resolve_recipients(&event, &manuscript).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Failed to resolve notification recipients");
                report.failures += 1;
                return report;
            }
        };

        let (title, body) = self.compose(&event, &manuscript);

        for user_id in &recipients.profile_ids {
            match self
                .repository
                .insert_notification(*user_id, Some(manuscript.id), &title, &body)
                .await
            {
                Ok(_) => {
                    report.in_app_created += 1;
                    metrics::record_notification("in_app", true);
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "In-app notification insert failed");
                    report.failures += 1;
                    metrics::record_notification("in_app", false);
                }
            }
        }

        // One message per address so recipients do not see each other
        let (subject, text) = (&title, &body);
        let sends = recipients.emails.iter().map(|address| async move {
            let message = EmailMessage {
                to: vec![address.clone()],
                subject: subject.clone(),
                text: text.clone(),
            };
            (address, self.mailer.send(&message).await)
        });
        for (address, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => {
                    report.emails_sent += 1;
                    metrics::record_notification("email", true);
                }
                Err(e) => {
                    warn!(to = %address, error = %e, "Notification email failed");
                    report.failures += 1;
                    metrics::record_notification("email", false);
                }
            }
        }

        debug!(
            in_app = report.in_app_created,
            emails = report.emails_sent,
            failures = report.failures,
            "Notification delivered"
        );
        report
    }

    async fn resolve_recipients(
        &self,
        event: &NotificationEvent,
        manuscript: &Manuscript,
    ) -> crate::Result<Recipients> {
        let mut recipients = Recipients::default();

        match event {
            NotificationEvent::StatusChanged { .. } => {
                // Free-form author list by email, plus the owning profiles
                let author_emails = manuscript.normalized_authors().emails();
                for profile in self.repository.find_profiles_by_emails(&author_emails).await? {
                    recipients.add_profile(&profile);
                }
                recipients.emails.extend(author_emails);

                let owners: Vec<Uuid> = [manuscript.author_id, manuscript.submitter_id]
                    .into_iter()
                    .flatten()
                    .collect();
                for profile in self.repository.find_profiles_by_ids(&owners).await? {
                    recipients.add_profile(&profile);
                }
            }
            NotificationEvent::ReviewerAssigned { reviewer_id, .. } => {
                if let Some(profile) = self.repository.find_profile_by_id(*reviewer_id).await? {
                    recipients.add_profile(&profile);
                }
            }
            NotificationEvent::DecisionSubmitted { .. } => {
                for profile in self.repository.list_staff_profiles().await? {
                    recipients.add_profile(&profile);
                }
            }
        }

        Ok(recipients)
    }

    fn compose(&self, event: &NotificationEvent, manuscript: &Manuscript) -> (String, String) {
        let link = format!("{}/submissions/{}", self.portal_url, manuscript.id);
        match event {
            NotificationEvent::StatusChanged { status, .. } => (
                format!("Manuscript {}", status.label().to_lowercase()),
                format!(
                    "The status of \"{}\" is now: {}.\n\n{}",
                    manuscript.title,
                    status.label(),
                    link
                ),
            ),
            NotificationEvent::ReviewerAssigned { .. } => (
                "New review assignment".to_string(),
                format!(
                    "You have been assigned to review \"{}\".\n\n{}",
                    manuscript.title, link
                ),
            ),
            NotificationEvent::DecisionSubmitted { recommendation, .. } => (
                "Review decision submitted".to_string(),
                format!(
                    "A reviewer recommended \"{}\" for \"{}\".\n\n{}",
                    recommendation.label(),
                    manuscript.title,
                    link
                ),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AuthorRecord, Authors, Role};
    use crate::db::{DbPool, NewManuscript, NewVersion};
    use crate::mail::RecordingMailer;

    struct Fixture {
        repo: Repository,
        mailer: Arc<RecordingMailer>,
        worker: NotificationWorker,
    }

    async fn fixture(mailer: RecordingMailer) -> Fixture {
        let repo = Repository::new(DbPool::in_memory().await.unwrap());
        let mailer = Arc::new(mailer);
        let worker = NotificationWorker::new(
            repo.clone(),
            mailer.clone(),
            "https://journal.example/".to_string(),
        );
        Fixture {
            repo,
            mailer,
            worker,
        }
    }

    async fn manuscript(repo: &Repository, author: &Profile, coauthor_email: &str) -> Manuscript {
        let authors = Authors::List(vec![
            AuthorRecord {
                name: "Ada Author".to_string(),
                email: Some(author.email.clone()),
                affiliation: None,
            },
            AuthorRecord {
                name: "Cole Coauthor".to_string(),
                email: Some(coauthor_email.to_string()),
                affiliation: Some("Elsewhere University".to_string()),
            },
        ]);
        let (m, _) = repo
            .create_manuscript_with_version(
                NewManuscript {
                    id: Uuid::new_v4(),
                    title: "On Tides".to_string(),
                    abstract_text: None,
                    author_id: Some(author.id),
                    submitter_id: Some(author.id),
                    authors: authors.to_stored(),
                    word_path: None,
                },
                NewVersion {
                    id: Uuid::new_v4(),
                    file_path: "manuscripts/x/v1.pdf".to_string(),
                    file_name: Some("v1.pdf".to_string()),
                    content_type: "application/pdf".to_string(),
                    size_bytes: 8,
                    checksum: "00".to_string(),
                    uploaded_by: Some(author.id),
                },
            )
            .await
            .unwrap();
        m
    }

    #[tokio::test]
    async fn test_status_change_reaches_authors_and_owner() {
        let f = fixture(RecordingMailer::new()).await;
        let author = f
            .repo
            .insert_profile(Uuid::new_v4(), "ada@journal.org", Role::Author, false)
            .await
            .unwrap();
        let m = manuscript(&f.repo, &author, "cole@elsewhere.edu").await;

        let report = f
            .worker
            .process(NotificationEvent::StatusChanged {
                manuscript_id: m.id,
                status: ManuscriptStatus::Accepted,
            })
            .await;

        // Owner profile gets one in-app row; both addresses get email once
        assert_eq!(report.in_app_created, 1);
        assert_eq!(report.emails_sent, 2);
        assert_eq!(report.failures, 0);

        let sent = f.mailer.sent().await;
        assert!(sent.iter().any(|msg| msg.to == vec!["cole@elsewhere.edu".to_string()]));
        assert!(sent[0].text.contains("https://journal.example/submissions/"));

        let inbox = f.repo.list_notifications_for_user(author.id, 10).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].body.contains("Accepted"));
    }

    #[tokio::test]
    async fn test_email_failure_is_counted_not_raised() {
        let f = fixture(RecordingMailer::failing()).await;
        let author = f
            .repo
            .insert_profile(Uuid::new_v4(), "ada@journal.org", Role::Author, false)
            .await
            .unwrap();
        let m = manuscript(&f.repo, &author, "cole@elsewhere.edu").await;

        let report = f
            .worker
            .process(NotificationEvent::StatusChanged {
                manuscript_id: m.id,
                status: ManuscriptStatus::Rejected,
            })
            .await;

        assert_eq!(report.in_app_created, 1);
        assert_eq!(report.emails_sent, 0);
        assert_eq!(report.failures, 2);
    }

    #[tokio::test]
    async fn test_decision_goes_to_approved_staff_only() {
        let f = fixture(RecordingMailer::new()).await;
        let author = f
            .repo
            .insert_profile(Uuid::new_v4(), "ada@journal.org", Role::Author, false)
            .await
            .unwrap();
        let editor = f
            .repo
            .insert_profile(Uuid::new_v4(), "ed@journal.org", Role::Editor, true)
            .await
            .unwrap();
        f.repo
            .insert_profile(Uuid::new_v4(), "pending@journal.org", Role::Editor, false)
            .await
            .unwrap();
        let reviewer = f
            .repo
            .insert_profile(Uuid::new_v4(), "rev@journal.org", Role::Reviewer, true)
            .await
            .unwrap();
        let m = manuscript(&f.repo, &author, "cole@elsewhere.edu").await;

        let report = f
            .worker
            .process(NotificationEvent::DecisionSubmitted {
                manuscript_id: m.id,
                reviewer_id: reviewer.id,
                recommendation: Recommendation::MinorRevisions,
            })
            .await;

        assert_eq!(report.in_app_created, 1);
        let sent = f.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec![editor.email.clone()]);
    }

    #[tokio::test]
    async fn test_missing_manuscript_is_a_no_op() {
        let f = fixture(RecordingMailer::new()).await;
        let report = f
            .worker
            .process(NotificationEvent::ReviewerAssigned {
                manuscript_id: Uuid::new_v4(),
                reviewer_id: Uuid::new_v4(),
            })
            .await;
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_panicking() {
        let (notifier, mut rx) = Notifier::channel(1);
        let event = NotificationEvent::ReviewerAssigned {
            manuscript_id: Uuid::new_v4(),
            reviewer_id: Uuid::new_v4(),
        };
        notifier.dispatch(event.clone());
        notifier.dispatch(event.clone());

        assert_eq!(rx.recv().await, Some(event));
        tokio_test::assert_err!(rx.try_recv());
    }

    #[tokio::test]
    async fn test_closed_queue_and_disabled_notifier() {
        let (notifier, rx) = Notifier::channel(4);
        drop(rx);
        notifier.dispatch(NotificationEvent::StatusChanged {
            manuscript_id: Uuid::new_v4(),
            status: ManuscriptStatus::Submitted,
        });
        Notifier::disabled().dispatch(NotificationEvent::StatusChanged {
            manuscript_id: Uuid::new_v4(),
            status: ManuscriptStatus::Submitted,
        });
    }
}
