//! Feed post entity - announcements shown in the marketplace feed.
//! Published posts with a past `expires_at` are removed by the cleanup job.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Feed post database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feed_posts")]
pub struct Model {
    /// Unique identifier for the post
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Admin who wrote the post
    pub author_id: i64,
    /// Headline
    pub title: String,
    /// Post body
    #[sea_orm(column_type = "Text")]
    pub body: String,
    /// `"draft"` or `"published"`
    pub status: String,
    /// After this instant a published post is deleted by cleanup
    pub expires_at: Option<DateTimeUtc>,
    /// When the post was created
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
