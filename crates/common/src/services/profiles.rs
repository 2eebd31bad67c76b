//! Profiles: first sign-in, seed admin bootstrap and role management

use crate::auth::{Access, Caller, Identity};
use crate::db::models::{Profile, Role};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use tracing::info;
use uuid::Uuid;

pub struct ProfileService {
    repo: Repository,
    seed_admin_email: Option<String>,
}

impl ProfileService {
    pub fn new(repo: Repository, seed_admin_email: Option<String>) -> Self {
        Self {
            repo,
            seed_admin_email: seed_admin_email
                .map(|e| e.trim().to_ascii_lowercase())
                .filter(|e| !e.is_empty()),
        }
    }

    fn is_seed_admin(&self, email: &str) -> bool {
        self.seed_admin_email
            .as_deref()
            .is_some_and(|seed| seed.eq_ignore_ascii_case(email.trim()))
    }

    /// Load the caller's profile, creating it on first sign-in.
    /// New profiles are unapproved authors, except the seed admin.
    pub async fn ensure_profile(&self, identity: &Identity) -> Result<Profile> {
        if let Some(profile) = self.repo.find_profile_by_id(identity.user_id).await? {
            return Ok(profile);
        }

        let (role, approved) = if self.is_seed_admin(&identity.email) {
            (Role::Admin, true)
        } else {
            (Role::Author, false)
        };

        let profile = self
            .repo
            .insert_profile(identity.user_id, &identity.email, role, approved)
            .await?;

        info!(
            user_id = %profile.id,
            role = %profile.role,
            approved = profile.approved,
            "Profile created on first sign-in"
        );
        Ok(profile)
    }

    /// Promote an existing seed admin profile to approved admin.
    /// Returns the profile when a change was made.
    pub async fn bootstrap_seed_admin(&self) -> Result<Option<Profile>> {
        let Some(ref email) = self.seed_admin_email else {
            return Ok(None);
        };

        let Some(profile) = self.repo.find_profile_by_email(email).await? else {
            info!("Seed admin has not signed in yet, profile will be created on first sign-in");
            return Ok(None);
        };

        if profile.approved && profile.role() == Role::Admin {
            return Ok(None);
        }

        let promoted = self
            .repo
            .update_profile_access(profile.id, Some(Role::Admin), Some(true))
            .await?;
        info!(user_id = %promoted.id, "Seed admin promoted");
        Ok(Some(promoted))
    }

    pub async fn list(&self, caller: &Caller) -> Result<Vec<Profile>> {
        caller.require(Access::Admin)?;
        self.repo.list_profiles().await
    }

    /// Change a profile's role and/or approval
    pub async fn update_access(
        &self,
        caller: &Caller,
        profile_id: Uuid,
        role: Option<&str>,
        approved: Option<bool>,
    ) -> Result<Profile> {
        caller.require(Access::Admin)?;

        let role = role
            .map(|r| {
                Role::parse(r).ok_or_else(|| {
                    AppError::validation("role", format!("Unknown role: {}", r))
                })
            })
            .transpose()?;

        if role.is_none() && approved.is_none() {
            return Err(AppError::validation("role", "Nothing to update"));
        }

        let updated = self
            .repo
            .update_profile_access(profile_id, role, approved)
            .await?;

        info!(
            actor_id = %caller.user_id(),
            profile_id = %updated.id,
            role = %updated.role,
            approved = updated.approved,
            "Profile access updated"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::testing::Harness;

    fn identity(email: &str) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_sign_in_creates_unapproved_author() {
        let h = Harness::new().await;
        let id = identity("new@journal.org");

        let profile = h.services.profiles.ensure_profile(&id).await.unwrap();
        assert_eq!(profile.role(), Role::Author);
        assert!(!profile.approved);

        // Second sign-in returns the same row
        let again = h.services.profiles.ensure_profile(&id).await.unwrap();
        assert_eq!(again.id, profile.id);
    }

    #[tokio::test]
    async fn test_email_claimed_by_another_identity_is_forbidden() {
        let h = Harness::new().await;
        let existing = h.caller("ada@journal.org", Role::Author, false).await;

        let err = h
            .services
            .profiles
            .ensure_profile(&identity("Ada@Journal.org"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        // The original owner is untouched
        let owner = h.repo.find_profile_by_email("ada@journal.org").await.unwrap().unwrap();
        assert_eq!(owner.id, existing.profile.id);
    }

    #[tokio::test]
    async fn test_seed_admin_created_approved() {
        let mut config = AppConfig::default();
        config.auth.seed_admin_email = Some("Founder@Journal.org".to_string());
        let h = Harness::with_config(config).await;

        let profile = h
            .services
            .profiles
            .ensure_profile(&identity("founder@journal.org"))
            .await
            .unwrap();
        assert_eq!(profile.role(), Role::Admin);
        assert!(profile.approved);
    }

    #[tokio::test]
    async fn test_bootstrap_promotes_existing_seed_profile() {
        let mut config = AppConfig::default();
        config.auth.seed_admin_email = Some("founder@journal.org".to_string());
        let h = Harness::with_config(config).await;
        h.caller("founder@journal.org", Role::Author, false).await;

        let promoted = h.services.profiles.bootstrap_seed_admin().await.unwrap();
        let promoted = promoted.unwrap();
        assert_eq!(promoted.role(), Role::Admin);
        assert!(promoted.approved);

        // Idempotent
        assert!(h.services.profiles.bootstrap_seed_admin().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_access_requires_admin() {
        let h = Harness::new().await;
        let editor = h.caller("ed@journal.org", Role::Editor, true).await;
        let target = h.caller("rev@journal.org", Role::Author, false).await;

        let err = h
            .services
            .profiles
            .update_access(&editor, target.user_id(), Some("reviewer"), Some(true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_update_access() {
        let h = Harness::new().await;
        let admin = h.caller("admin@journal.org", Role::Admin, true).await;
        let target = h.caller("rev@journal.org", Role::Author, false).await;

        let updated = h
            .services
            .profiles
            .update_access(&admin, target.user_id(), Some("reviewer"), Some(true))
            .await
            .unwrap();
        assert_eq!(updated.role(), Role::Reviewer);
        assert!(updated.approved);

        let err = h
            .services
            .profiles
            .update_access(&admin, target.user_id(), Some("owner"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = h
            .services
            .profiles
            .update_access(&admin, Uuid::new_v4(), None, Some(true))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_requires_admin() {
        let h = Harness::new().await;
        let admin = h.caller("admin@journal.org", Role::Admin, true).await;
        let unapproved = h.caller("pending@journal.org", Role::Admin, false).await;

        assert_eq!(h.services.profiles.list(&admin).await.unwrap().len(), 2);
        assert!(h.services.profiles.list(&unapproved).await.is_err());
    }
}
