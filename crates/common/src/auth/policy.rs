//! Authorization policy: (role, approved) against a requested access level

use super::Identity;
use crate::db::models::{Manuscript, Profile, Role};
use crate::errors::{AppError, Result};
use uuid::Uuid;

/// Access levels required by mutating and staff endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Approved editor or admin
    Editor,
    /// Approved reviewer
    Reviewer,
    /// Approved admin (profile role management)
    Admin,
}

impl Access {
    fn describe(&self) -> &'static str {
        match self {
            Access::Editor => "editor-level access",
            Access::Reviewer => "reviewer access",
            Access::Admin => "admin access",
        }
    }
}

/// Whether a profile holds the access level
pub fn allows(profile: &Profile, access: Access) -> bool {
    if !profile.approved {
        return false;
    }
    match access {
        Access::Editor => matches!(profile.role(), Role::Editor | Role::Admin),
        Access::Reviewer => profile.role() == Role::Reviewer,
        Access::Admin => profile.role() == Role::Admin,
    }
}

/// An authenticated caller
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    pub profile: Profile,
}

impl Caller {
    pub fn user_id(&self) -> Uuid {
        self.identity.user_id
    }

    pub fn can(&self, access: Access) -> bool {
        allows(&self.profile, access)
    }

    /// Require an access level, returning Forbidden if absent
    pub fn require(&self, access: Access) -> Result<()> {
        if self.can(access) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("Requires {}", access.describe())))
        }
    }

    /// Author/submitter of the manuscript
    pub fn owns(&self, manuscript: &Manuscript) -> bool {
        manuscript.is_owned_by(self.user_id())
    }
}
