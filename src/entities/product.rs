//! Product entity - a farmer's listing with a finite stock.
//!
//! `remaining_quantity` only moves through the order engine (confirm/cancel) and
//! the stock adjustment operation. `status` is recomputed on every stock change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning farmer
    pub farmer_id: i64,
    /// Listing title (e.g., "Tomatoes")
    pub title: String,
    /// Optional free-text description
    pub description: Option<String>,
    /// Price per unit
    pub price: f64,
    /// Unit the quantity is measured in (e.g., "kg")
    pub unit: String,
    /// Optional category used for browsing
    pub category: Option<String>,
    /// Stock the listing started with; upper bound for `remaining_quantity`
    pub original_quantity: i32,
    /// Stock still available for confirmation
    pub remaining_quantity: i32,
    /// `"active"`, `"sold_out"` or `"inactive"`
    pub status: String,
    /// Number of successful stock deductions
    pub order_count: i32,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one farmer
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FarmerId",
        to = "super::user::Column::Id"
    )]
    Farmer,
    /// One product has many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Farmer.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
