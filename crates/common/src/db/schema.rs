//! Schema creation from the entity definitions

use crate::db::models::*;
use crate::errors::Result;
use sea_orm::sea_query::{Alias, Index};
use sea_orm::{ConnectionTrait, EntityTrait, Schema};
use tracing::info;

/// Name of the unique index backing idempotent reviewer assignment
pub const REVIEW_PAIR_INDEX: &str = "ux_manuscript_reviews_pair";

async fn create_table<C, E>(conn: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = conn.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Create every table and index that does not exist yet.
/// Tables are created parents first so foreign keys resolve.
pub async fn create_schema<C: ConnectionTrait>(conn: &C) -> Result<()> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    create_table(conn, &schema, ProfileEntity).await?;
    create_table(conn, &schema, ManuscriptEntity).await?;
    create_table(conn, &schema, ManuscriptVersionEntity).await?;
    create_table(conn, &schema, ManuscriptReviewEntity).await?;
    create_table(conn, &schema, IssueEntity).await?;
    create_table(conn, &schema, ArticleEntity).await?;
    create_table(conn, &schema, NotificationEntity).await?;

    let review_pair = Index::create()
        .name(REVIEW_PAIR_INDEX)
        .table(Alias::new("manuscript_reviews"))
        .col(Alias::new("manuscript_id"))
        .col(Alias::new("reviewer_id"))
        .unique()
        .if_not_exists()
        .to_owned();
    conn.execute(backend.build(&review_pair)).await?;

    info!("Database schema ensured");
    Ok(())
}
