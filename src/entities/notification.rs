//! Notification entity - persisted notices for the counterparty of a state change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    /// Unique identifier for the notification
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Recipient
    pub user_id: i64,
    /// `"order_received"`, `"order_status_changed"`, `"out_of_stock"` or `"new_message"`
    pub kind: String,
    /// Short title
    pub title: String,
    /// Body text
    #[sea_orm(column_type = "Text")]
    pub body: String,
    /// Structured payload (ids of the affected rows)
    pub data: Json,
    /// Whether the recipient has seen it
    pub is_read: bool,
    /// When it was created
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
