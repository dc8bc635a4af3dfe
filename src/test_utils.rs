//! Shared test utilities for the marketplace core.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    config::MarketConfig,
    core::{
        EngineContext,
        clock::FixedClock,
        notify::{Notice, NotificationSink},
        order::{self, NewOrder},
        product::{self, NewProduct},
        status::{DeliveryMethod, UserRole},
        user,
    },
    entities,
    errors::Result,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use std::sync::{Arc, Mutex};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// The instant every test context's clock reports.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Notification sink that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    /// Notices delivered so far, in delivery order.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn deliver(&self, notice: &Notice, _at: DateTime<Utc>) -> Result<()> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Context with default settings, a clock fixed at [`test_now`] and a recording sink.
pub fn test_context() -> (EngineContext, Arc<RecordingNotifier>) {
    let recorder = Arc::new(RecordingNotifier::default());
    let ctx = EngineContext::new(Arc::clone(&recorder) as _, MarketConfig::default())
        .with_clock(Arc::new(FixedClock(test_now())));
    (ctx, recorder)
}

/// Creates a farmer account.
///
/// # Defaults
/// * `email`: derived from the name
/// * `phone`: None
pub async fn create_test_farmer(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    name: &str,
) -> Result<entities::user::Model> {
    user::create_user(db, ctx, name, &email_for(name), None, UserRole::Farmer).await
}

/// Creates a buyer account.
///
/// # Defaults
/// * `email`: derived from the name
/// * `phone`: "555-0100"
pub async fn create_test_buyer(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    name: &str,
) -> Result<entities::user::Model> {
    user::create_user(
        db,
        ctx,
        name,
        &email_for(name),
        Some("555-0100".to_string()),
        UserRole::Buyer,
    )
    .await
}

fn email_for(name: &str) -> String {
    format!("{}@example.com", name.to_lowercase().replace(' ', "."))
}

/// Creates a product with sensible defaults.
///
/// # Defaults
/// * `title`: "Heirloom Tomatoes"
/// * `price`: 10.0 per "kg"
pub async fn create_test_product(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    farmer_id: i64,
    quantity: i32,
) -> Result<entities::product::Model> {
    product::create_product(
        db,
        ctx,
        farmer_id,
        NewProduct {
            title: "Heirloom Tomatoes".to_string(),
            description: Some("Picked this morning".to_string()),
            price: 10.0,
            unit: "kg".to_string(),
            category: Some("vegetables".to_string()),
            quantity,
        },
    )
    .await
}

/// Creates a pickup order from a new buyer, so every call has its own buyer.
pub async fn create_test_order(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    product_id: i64,
    quantity: i32,
) -> Result<entities::order::Model> {
    let buyer = create_test_buyer(db, ctx, "Test Buyer").await?;
    order::create_order(
        db,
        ctx,
        NewOrder {
            product_id,
            quantity,
            delivery_method: DeliveryMethod::Pickup,
            delivery_address: None,
            notes: None,
        },
        buyer.id,
    )
    .await
}

/// Sets up a database and a recording context.
/// Returns (db, ctx, recorder).
pub async fn setup_test_env() -> Result<(DatabaseConnection, EngineContext, Arc<RecordingNotifier>)>
{
    let db = setup_test_db().await?;
    let (ctx, recorder) = test_context();
    Ok((db, ctx, recorder))
}

/// Sets up a database with one farmer and one buyer.
/// Returns (db, ctx, farmer, buyer).
pub async fn setup_with_users() -> Result<(
    DatabaseConnection,
    EngineContext,
    entities::user::Model,
    entities::user::Model,
)> {
    let (db, ctx, _recorder) = setup_test_env().await?;
    let farmer = create_test_farmer(&db, &ctx, "Farah Farmer").await?;
    let buyer = create_test_buyer(&db, &ctx, "Bea Buyer").await?;
    Ok((db, ctx, farmer, buyer))
}

/// Sets up a database with a farmer's product holding `quantity` units.
/// Returns (db, ctx, recorder, product).
pub async fn setup_with_product(
    quantity: i32,
) -> Result<(
    DatabaseConnection,
    EngineContext,
    Arc<RecordingNotifier>,
    entities::product::Model,
)> {
    let (db, ctx, recorder) = setup_test_env().await?;
    let farmer = create_test_farmer(&db, &ctx, "Farah Farmer").await?;
    let product = create_test_product(&db, &ctx, farmer.id, quantity).await?;
    Ok((db, ctx, recorder, product))
}
