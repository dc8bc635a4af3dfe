//! Stock adjustments on a locked product row.
//!
//! The helpers here run inside a caller's transaction and are shared with the order
//! engine, so every path that moves `remaining_quantity` applies the same bounds
//! and recomputes the listing status the same way.

use crate::{
    core::{EngineContext, notify::Notice, status::ProductStatus, store::begin_locked},
    entities::{Product, product},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, QuerySelect, Set, prelude::*};
use tracing::info;

/// Direction of a manual stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockOperation {
    /// Restock, clamped at the original quantity
    Add,
    /// Sale outside the order flow; counts as one order
    Subtract,
}

/// Reads a product with an exclusive row lock held until the transaction ends.
pub(crate) async fn lock_product<C: ConnectionTrait>(
    txn: &C,
    product_id: i64,
) -> Result<product::Model> {
    Product::find_by_id(product_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))
}

/// Writes a new remaining quantity and the status that follows from it.
///
/// `remaining` must already be within `[0, original_quantity]`.
pub(crate) async fn write_stock<C: ConnectionTrait>(
    txn: &C,
    product: product::Model,
    remaining: i32,
    extra_orders: i32,
    now: DateTime<Utc>,
) -> Result<product::Model> {
    let status = ProductStatus::parse(&product.status)?.after_stock_change(remaining);
    let order_count = product.order_count + extra_orders;

    let mut active: product::ActiveModel = product.into();
    active.remaining_quantity = Set(remaining);
    active.status = Set(status.as_str().to_string());
    active.order_count = Set(order_count);
    active.updated_at = Set(now);
    active.update(txn).await.map_err(Into::into)
}

/// Removes `quantity` units, failing with a conflict if the stock does not cover it.
pub(crate) async fn deduct_stock<C: ConnectionTrait>(
    txn: &C,
    product: product::Model,
    quantity: i32,
    now: DateTime<Utc>,
) -> Result<product::Model> {
    if quantity > product.remaining_quantity {
        return Err(Error::conflict(format!(
            "Insufficient stock for product {}: {} remaining, {} requested",
            product.id, product.remaining_quantity, quantity
        )));
    }
    let remaining = product.remaining_quantity - quantity;
    write_stock(txn, product, remaining, 1, now).await
}

/// Returns `quantity` units, never exceeding the original quantity.
pub(crate) async fn restore_stock<C: ConnectionTrait>(
    txn: &C,
    product: product::Model,
    quantity: i32,
    now: DateTime<Utc>,
) -> Result<product::Model> {
    let remaining = product
        .remaining_quantity
        .saturating_add(quantity)
        .min(product.original_quantity);
    write_stock(txn, product, remaining, 0, now).await
}

/// Adjusts a product's stock in its own transaction.
///
/// # Errors
/// Returns an error if:
/// - `quantity` is not positive
/// - The product does not exist
/// - A subtraction would take the stock below zero (conflict)
pub async fn adjust_stock(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    product_id: i64,
    quantity: i32,
    operation: StockOperation,
) -> Result<product::Model> {
    if quantity <= 0 {
        return Err(Error::validation(format!(
            "Stock adjustment must be positive, got {quantity}"
        )));
    }

    let txn = begin_locked(db).await?;
    let product = lock_product(&txn, product_id).await?;
    let was_available = product.remaining_quantity > 0;
    let now = ctx.clock.now();

    let updated = match operation {
        StockOperation::Subtract => deduct_stock(&txn, product, quantity, now).await?,
        StockOperation::Add => restore_stock(&txn, product, quantity, now).await?,
    };

    txn.commit().await?;

    info!(
        product_id,
        ?operation,
        quantity,
        remaining = updated.remaining_quantity,
        "Stock adjusted"
    );
    if was_available && updated.remaining_quantity == 0 {
        ctx.notify_all(&[Notice::out_of_stock(
            updated.farmer_id,
            updated.id,
            &updated.title,
        )])
        .await;
    }
    Ok(updated)
}
