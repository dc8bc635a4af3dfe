//! Order entity - a buyer's request for a quantity of one product.
//!
//! `unit_price` and `delivery_fee` are captured at creation and never change, so
//! `total_price` must always equal `quantity * unit_price + delivery_fee`.
//! Cancellation metadata is only populated once the order reaches `"cancelled"`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Buyer who placed the order
    pub buyer_id: i64,
    /// Farmer owning the ordered product
    pub farmer_id: i64,
    /// Ordered product
    pub product_id: i64,
    /// Ordered quantity, always positive
    pub quantity: i32,
    /// Product price at creation time
    pub unit_price: f64,
    /// `"pickup"`, `"delivery"` or `"shipping"`
    pub delivery_method: String,
    /// Fee for the delivery method at creation time
    pub delivery_fee: f64,
    /// `quantity * unit_price + delivery_fee`
    pub total_price: f64,
    /// Optional delivery address
    pub delivery_address: Option<String>,
    /// Optional notes from the buyer or the confirming farmer
    pub notes: Option<String>,
    /// Buyer name at creation time
    pub buyer_name: String,
    /// Buyer phone at creation time
    pub buyer_phone: Option<String>,
    /// Buyer email at creation time
    pub buyer_email: String,
    /// `"pending"`, `"confirmed"`, `"preparing"`, `"delivered"` or `"cancelled"`
    pub status: String,
    /// Why the order was cancelled
    pub cancellation_reason: Option<String>,
    /// `"buyer"`, `"farmer"` or `"system"`
    pub cancelled_by: Option<String>,
    /// When the order was cancelled
    pub cancelled_at: Option<DateTimeUtc>,
    /// When the farmer confirmed the order (stock deducted)
    pub confirmed_at: Option<DateTimeUtc>,
    /// When the order was delivered
    pub delivered_at: Option<DateTimeUtc>,
    /// When the order was created
    pub created_at: DateTimeUtc,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order references one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
