//! SeaORM entity models
//!
//! Database entities for the journal portal

mod article;
mod authors;
mod issue;
mod manuscript;
mod manuscript_review;
mod manuscript_version;
mod notification;
mod profile;

pub use authors::{AuthorRecord, Authors};

pub use profile::{
    Entity as ProfileEntity,
    Model as Profile,
    ActiveModel as ProfileActiveModel,
    Column as ProfileColumn,
    Role,
};

pub use manuscript::{
    Entity as ManuscriptEntity,
    Model as Manuscript,
    ActiveModel as ManuscriptActiveModel,
    Column as ManuscriptColumn,
    ManuscriptStatus,
};

pub use manuscript_version::{
    Entity as ManuscriptVersionEntity,
    Model as ManuscriptVersion,
    ActiveModel as ManuscriptVersionActiveModel,
    Column as ManuscriptVersionColumn,
};

pub use manuscript_review::{
    Entity as ManuscriptReviewEntity,
    Model as ManuscriptReview,
    ActiveModel as ManuscriptReviewActiveModel,
    Column as ManuscriptReviewColumn,
    Recommendation,
};

pub use issue::{
    Entity as IssueEntity,
    Model as Issue,
    ActiveModel as IssueActiveModel,
    Column as IssueColumn,
};

pub use article::{
    Entity as ArticleEntity,
    Model as Article,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
};

pub use notification::{
    Entity as NotificationEntity,
    Model as Notification,
    ActiveModel as NotificationActiveModel,
    Column as NotificationColumn,
};
