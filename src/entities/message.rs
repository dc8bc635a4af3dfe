//! Message entity - one message inside a conversation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Message database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    /// Unique identifier for the message
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Conversation the message belongs to
    pub conversation_id: i64,
    /// Participant who sent it
    pub sender_id: i64,
    /// Message body
    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// `"text"`, `"image"` or `"file"`
    pub message_type: String,
    /// JSON array of attachment references
    pub attachments: Json,
    /// Message this one replies to, within the same conversation
    pub reply_to_message_id: Option<i64>,
    /// Whether the recipient has read it
    pub is_read: bool,
    /// When the message was sent
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Message and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each message belongs to one conversation
    #[sea_orm(
        belongs_to = "super::conversation::Entity",
        from = "Column::ConversationId",
        to = "super::conversation::Column::Id"
    )]
    Conversation,
}

impl Related<super::conversation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conversation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
