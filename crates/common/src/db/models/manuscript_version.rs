//! Manuscript version entity: one immutable uploaded file

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manuscript_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub manuscript_id: Uuid,

    /// 1-based, increasing per manuscript
    pub version_number: i32,

    #[sea_orm(column_type = "Text")]
    pub file_path: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub file_name: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content_type: String,

    pub size_bytes: i64,

    /// Hex SHA-256 of the uploaded bytes
    #[sea_orm(column_type = "Text")]
    pub checksum: String,

    pub uploaded_by: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::manuscript::Entity",
        from = "Column::ManuscriptId",
        to = "super::manuscript::Column::Id"
    )]
    Manuscript,
}

impl Related<super::manuscript::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manuscript.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
