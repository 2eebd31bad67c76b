//! Reviewer assignment entity, unique per (manuscript, reviewer)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reviewer recommendation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Accept,
    MinorRevisions,
    MajorRevisions,
    Reject,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Accept => "accept",
            Recommendation::MinorRevisions => "minor_revisions",
            Recommendation::MajorRevisions => "major_revisions",
            Recommendation::Reject => "reject",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "accept" => Some(Recommendation::Accept),
            "minor_revisions" => Some(Recommendation::MinorRevisions),
            "major_revisions" => Some(Recommendation::MajorRevisions),
            "reject" => Some(Recommendation::Reject),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Accept => "Accept",
            Recommendation::MinorRevisions => "Minor revisions",
            Recommendation::MajorRevisions => "Major revisions",
            Recommendation::Reject => "Reject",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manuscript_reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub manuscript_id: Uuid,

    pub reviewer_id: Uuid,

    /// Null until the reviewer submits a decision
    #[sea_orm(column_type = "Text", nullable)]
    pub recommendation: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub decided_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    pub fn is_decided(&self) -> bool {
        self.decided_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::manuscript::Entity",
        from = "Column::ManuscriptId",
        to = "super::manuscript::Column::Id"
    )]
    Manuscript,

    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::ReviewerId",
        to = "super::profile::Column::Id"
    )]
    Reviewer,
}

impl Related<super::manuscript::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manuscript.def()
    }
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviewer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
