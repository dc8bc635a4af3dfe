//! User entity - farmers, buyers and admins.
//!
//! Accounts are never deleted; `is_active` is cleared instead so that orders and
//! conversations keep pointing at a real row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, copied onto orders as a contact snapshot
    pub full_name: String,
    /// Contact email
    pub email: String,
    /// Optional contact phone number
    pub phone: Option<String>,
    /// `"farmer"`, `"buyer"` or `"admin"`
    pub role: String,
    /// Deactivated accounts cannot place orders
    pub is_active: bool,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A farmer lists many products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
