//! Conversation entity - a two-party thread, optionally tied to a product, order or service.
//!
//! Participants are stored in canonical order (`participant_one_id < participant_two_id`)
//! and a unique index on `(participant_one_id, participant_two_id, context_key)` keeps
//! at most one row per pair and context. The `*_one` / `*_two` columns belong to the
//! participant in the matching slot.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Conversation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    /// Unique identifier for the conversation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lower participant id
    pub participant_one_id: i64,
    /// Higher participant id
    pub participant_two_id: i64,
    /// `"direct"`, `"product_inquiry"`, `"order_related"` or `"service_inquiry"`
    pub context_type: String,
    /// Stable text form of the context (e.g. `"product:12"`), part of the unique key
    pub context_key: String,
    /// Linked product, if any
    pub product_id: Option<i64>,
    /// Linked order, if any
    pub order_id: Option<i64>,
    /// Linked service, if any
    pub service_id: Option<i64>,
    /// Generated title
    pub title: String,
    /// When the last message was sent
    pub last_message_at: Option<DateTimeUtc>,
    /// Truncated content of the last message
    pub last_message_preview: Option<String>,
    /// Messages participant one has not read yet
    pub participant_one_unread: i32,
    /// Messages participant two has not read yet
    pub participant_two_unread: i32,
    /// Participant one blocked participant two
    pub blocked_by_one: bool,
    /// Participant two blocked participant one
    pub blocked_by_two: bool,
    /// Hidden from participant one's inbox
    pub archived_by_one: bool,
    /// Hidden from participant two's inbox
    pub archived_by_two: bool,
    /// When the conversation was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Conversation and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One conversation has many messages
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
