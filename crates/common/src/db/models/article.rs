//! Article entity: an issue's table-of-contents entry

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub issue_id: Uuid,

    /// Manuscript this article was compiled from
    pub manuscript_id: Option<Uuid>,

    /// 0-based table-of-contents order
    pub position: i32,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_name = "abstract", column_type = "Text", nullable)]
    pub abstract_text: Option<String>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub authors: Option<Json>,

    #[sea_orm(column_type = "Text", nullable)]
    pub pdf_path: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn normalized_authors(&self) -> super::Authors {
        super::Authors::from_stored(self.authors.as_ref())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::issue::Entity",
        from = "Column::IssueId",
        to = "super::issue::Column::Id",
        on_delete = "Cascade"
    )]
    Issue,
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issue.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
