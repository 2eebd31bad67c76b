//! Manuscript entity and its status state machine

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Manuscript status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManuscriptStatus {
    Submitted,
    UnderReview,
    RevisionsRequested,
    Accepted,
    Rejected,
    Published,
}

impl ManuscriptStatus {
    /// Statuses an editor may set directly. `Published` is reserved for
    /// the publication compiler.
    pub const EDITABLE: [ManuscriptStatus; 5] = [
        ManuscriptStatus::Submitted,
        ManuscriptStatus::UnderReview,
        ManuscriptStatus::RevisionsRequested,
        ManuscriptStatus::Accepted,
        ManuscriptStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ManuscriptStatus::Submitted => "submitted",
            ManuscriptStatus::UnderReview => "under_review",
            ManuscriptStatus::RevisionsRequested => "revisions_requested",
            ManuscriptStatus::Accepted => "accepted",
            ManuscriptStatus::Rejected => "rejected",
            ManuscriptStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "submitted" => Some(ManuscriptStatus::Submitted),
            "under_review" => Some(ManuscriptStatus::UnderReview),
            "revisions_requested" => Some(ManuscriptStatus::RevisionsRequested),
            "accepted" => Some(ManuscriptStatus::Accepted),
            "rejected" => Some(ManuscriptStatus::Rejected),
            "published" => Some(ManuscriptStatus::Published),
            _ => None,
        }
    }

    /// Human readable text used in notifications
    pub fn label(&self) -> &'static str {
        match self {
            ManuscriptStatus::Submitted => "Submitted",
            ManuscriptStatus::UnderReview => "Under review",
            ManuscriptStatus::RevisionsRequested => "Revisions requested",
            ManuscriptStatus::Accepted => "Accepted",
            ManuscriptStatus::Rejected => "Rejected",
            ManuscriptStatus::Published => "Published",
        }
    }

    pub fn is_editable(&self) -> bool {
        Self::EDITABLE.contains(self)
    }
}

impl fmt::Display for ManuscriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manuscripts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_name = "abstract", column_type = "Text", nullable)]
    pub abstract_text: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub author_id: Option<Uuid>,

    pub submitter_id: Option<Uuid>,

    /// Authoritative latest file
    pub current_version: Option<Uuid>,

    /// Free-form author list, normalized through `Authors`
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub authors: Option<Json>,

    /// Pre-versioning upload location
    #[sea_orm(column_type = "Text", nullable)]
    pub file_storage_path: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub word_path: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Parsed status; unknown stored values read as `Submitted`
    pub fn manuscript_status(&self) -> ManuscriptStatus {
        ManuscriptStatus::parse(&self.status).unwrap_or(ManuscriptStatus::Submitted)
    }

    /// Whether the user is the manuscript's author or submitter
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.author_id == Some(user_id) || self.submitter_id == Some(user_id)
    }

    pub fn normalized_authors(&self) -> super::Authors {
        super::Authors::from_stored(self.authors.as_ref())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::manuscript_version::Entity")]
    Versions,

    #[sea_orm(has_many = "super::manuscript_review::Entity")]
    Reviews,
}

impl Related<super::manuscript_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Versions.def()
    }
}

impl Related<super::manuscript_review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names_roundtrip() {
        for status in [
            ManuscriptStatus::Submitted,
            ManuscriptStatus::UnderReview,
            ManuscriptStatus::RevisionsRequested,
            ManuscriptStatus::Accepted,
            ManuscriptStatus::Rejected,
            ManuscriptStatus::Published,
        ] {
            assert_eq!(ManuscriptStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ManuscriptStatus::parse("archived"), None);
    }

    #[test]
    fn test_published_is_not_editable() {
        assert!(!ManuscriptStatus::Published.is_editable());
        assert!(ManuscriptStatus::Rejected.is_editable());
    }
}
