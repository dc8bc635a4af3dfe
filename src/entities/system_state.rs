//! System state entity - key/value bookkeeping for maintenance jobs,
//! such as the instant the last cleanup run committed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// System state database model - one row per key
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_state")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Bookkeeping key (e.g., `"last_cleanup_at"`)
    #[sea_orm(unique)]
    pub key: String,
    /// Value stored as string (RFC 3339 for instants)
    pub value: String,
    /// When this row was last modified
    pub updated_at: DateTimeUtc,
}

/// `SystemState` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
