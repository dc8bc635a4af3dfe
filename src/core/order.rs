//! Order engine - creation, confirmation, progression and cancellation of orders.
//!
//! Each operation runs in one transaction opened by [`begin_locked`]. Rows are locked
//! in a fixed order, order before product, so two operations touching the same pair
//! can never wait on each other in a cycle. Stock is only deducted at confirmation;
//! pending orders may collectively ask for more than is left.
//!
//! Any error returned from inside the transaction drops it, which rolls it back.
//! Notices are dispatched only after a successful commit.

use crate::{
    core::{
        EngineContext,
        notify::Notice,
        product::is_available,
        status::{CancelledBy, DeliveryMethod, OrderStatus},
        stock::{deduct_stock, lock_product, restore_stock},
        store::begin_locked,
    },
    entities::{Order, User, order},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, QueryOrder, QuerySelect, Set, prelude::*};
use tracing::info;

/// Buyer-supplied part of a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Product being ordered
    pub product_id: i64,
    /// Units requested
    pub quantity: i32,
    /// Selects the delivery fee
    pub delivery_method: DeliveryMethod,
    /// Where to deliver, if not picked up
    pub delivery_address: Option<String>,
    /// Free-form buyer notes
    pub notes: Option<String>,
}

/// Farmer-supplied extras when accepting an order.
#[derive(Debug, Clone, Default)]
pub struct Confirmation {
    /// Replaces the order notes when present
    pub notes: Option<String>,
}

/// `quantity * unit_price + delivery_fee`.
#[must_use]
pub fn expected_total(quantity: i32, unit_price: f64, delivery_fee: f64) -> f64 {
    f64::from(quantity).mul_add(unit_price, delivery_fee)
}

async fn lock_order<C: ConnectionTrait>(txn: &C, order_id: i64) -> Result<order::Model> {
    Order::find_by_id(order_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| Error::not_found("order", order_id))
}

/// Places a pending order. Stock is checked but not deducted.
///
/// Checks run in this order and stop at the first failure: the product exists, it is
/// available, it covers the quantity, the buyer does not own it, and the buyer exists
/// and is active.
///
/// # Errors
/// `Validation` for a non-positive quantity or a failed business rule, `NotFound` for a
/// missing product or a missing or deactivated buyer.
pub async fn create_order(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    new_order: NewOrder,
    buyer_id: i64,
) -> Result<order::Model> {
    if new_order.quantity <= 0 {
        return Err(Error::validation(format!(
            "Order quantity must be positive, got {}",
            new_order.quantity
        )));
    }

    let txn = begin_locked(db).await?;

    let product = lock_product(&txn, new_order.product_id).await?;
    if !is_available(&product) {
        return Err(Error::validation(format!(
            "Product {} is not available",
            product.id
        )));
    }
    if new_order.quantity > product.remaining_quantity {
        return Err(Error::validation(format!(
            "Only {} {} available, {} requested",
            product.remaining_quantity, product.unit, new_order.quantity
        )));
    }
    if product.farmer_id == buyer_id {
        return Err(Error::validation("Farmers cannot order their own products"));
    }

    let buyer = User::find_by_id(buyer_id)
        .one(&txn)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| Error::not_found("user", buyer_id))?;

    let now = ctx.clock.now();
    let delivery_fee = ctx.config.pricing.fee_for(new_order.delivery_method);
    let order = order::ActiveModel {
        buyer_id: Set(buyer.id),
        farmer_id: Set(product.farmer_id),
        product_id: Set(product.id),
        quantity: Set(new_order.quantity),
        unit_price: Set(product.price),
        delivery_method: Set(new_order.delivery_method.as_str().to_string()),
        delivery_fee: Set(delivery_fee),
        total_price: Set(expected_total(
            new_order.quantity,
            product.price,
            delivery_fee,
        )),
        delivery_address: Set(new_order.delivery_address),
        notes: Set(new_order.notes),
        buyer_name: Set(buyer.full_name),
        buyer_phone: Set(buyer.phone),
        buyer_email: Set(buyer.email),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        order_id = order.id,
        product_id = order.product_id,
        buyer_id,
        quantity = order.quantity,
        total = order.total_price,
        "Order created"
    );
    ctx.notify_all(&[Notice::order_received(
        order.farmer_id,
        order.id,
        &product.title,
        order.quantity,
    )])
    .await;

    Ok(order)
}

/// Accepts a pending order and deducts its quantity from stock.
///
/// Of several concurrent confirmations of one order exactly one succeeds; the rest see
/// the order already confirmed and fail with `Conflict`.
///
/// # Errors
/// - `NotFound` if the order or its product is missing
/// - `Validation` if `farmer_id` does not own the order or it was cancelled
/// - `Conflict` if the order was already accepted or stock no longer covers it
pub async fn confirm_order(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    order_id: i64,
    farmer_id: i64,
    confirmation: Confirmation,
) -> Result<order::Model> {
    let txn = begin_locked(db).await?;

    let order = lock_order(&txn, order_id).await?;
    if order.farmer_id != farmer_id {
        return Err(Error::validation("Only the product's farmer can confirm this order"));
    }
    let status = OrderStatus::parse(&order.status)?;
    if !status.can_be_confirmed() {
        return Err(if status == OrderStatus::Cancelled {
            Error::validation(format!("Order {order_id} was cancelled"))
        } else {
            Error::conflict(format!("Order {order_id} is already {status}"))
        });
    }

    let now = ctx.clock.now();
    let product = lock_product(&txn, order.product_id).await?;
    let product = deduct_stock(&txn, product, order.quantity, now).await?;

    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Confirmed.as_str().to_string());
    active.confirmed_at = Set(Some(now));
    active.updated_at = Set(now);
    if let Some(notes) = confirmation.notes {
        active.notes = Set(Some(notes));
    }
    let order = active.update(&txn).await?;

    txn.commit().await?;

    info!(
        order_id,
        product_id = product.id,
        remaining = product.remaining_quantity,
        "Order confirmed"
    );
    let mut notices = vec![Notice::order_status_changed(
        order.buyer_id,
        order.id,
        OrderStatus::Confirmed.as_str(),
    )];
    if product.remaining_quantity == 0 {
        notices.push(Notice::out_of_stock(
            product.farmer_id,
            product.id,
            &product.title,
        ));
    }
    ctx.notify_all(&notices).await;

    Ok(order)
}

/// Moves a confirmed order to preparing, or a preparing order to delivered.
///
/// # Errors
/// `Validation` if `next` is not one of those two steps, the transition would skip a
/// state, or `farmer_id` does not own the order. `NotFound` if the order is missing.
pub async fn advance_order(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    order_id: i64,
    farmer_id: i64,
    next: OrderStatus,
) -> Result<order::Model> {
    if !matches!(next, OrderStatus::Preparing | OrderStatus::Delivered) {
        return Err(Error::validation(format!(
            "Orders cannot be advanced to {next}"
        )));
    }

    let txn = begin_locked(db).await?;

    let order = lock_order(&txn, order_id).await?;
    if order.farmer_id != farmer_id {
        return Err(Error::validation("Only the product's farmer can update this order"));
    }
    let current = OrderStatus::parse(&order.status)?;
    if !current.can_transition_to(next) {
        return Err(Error::validation(format!(
            "Order {order_id} cannot move from {current} to {next}"
        )));
    }

    let now = ctx.clock.now();
    let mut active: order::ActiveModel = order.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(now);
    if next == OrderStatus::Delivered {
        active.delivered_at = Set(Some(now));
    }
    let order = active.update(&txn).await?;

    txn.commit().await?;

    info!(order_id, from = %current, to = %next, "Order advanced");
    ctx.notify_all(&[Notice::order_status_changed(
        order.buyer_id,
        order.id,
        next.as_str(),
    )])
    .await;

    Ok(order)
}

/// Cancels an order on behalf of its buyer or farmer.
///
/// If the order had been confirmed, its quantity goes back to the product (never above
/// the original quantity) and a sold-out listing becomes active again.
///
/// # Errors
/// `NotFound` if the order is missing. `Validation` if `user_id` is neither party or
/// the order is already delivered or cancelled.
pub async fn cancel_order(
    db: &DatabaseConnection,
    ctx: &EngineContext,
    order_id: i64,
    user_id: i64,
    reason: &str,
) -> Result<order::Model> {
    let txn = begin_locked(db).await?;

    let order = lock_order(&txn, order_id).await?;
    let (actor, counterparty) = if user_id == order.buyer_id {
        (CancelledBy::Buyer, order.farmer_id)
    } else if user_id == order.farmer_id {
        (CancelledBy::Farmer, order.buyer_id)
    } else {
        return Err(Error::validation("Only the buyer or the farmer can cancel this order"));
    };

    let status = OrderStatus::parse(&order.status)?;
    if !status.can_be_cancelled() {
        return Err(Error::validation(format!(
            "Order {order_id} is {status} and cannot be cancelled"
        )));
    }

    let now = ctx.clock.now();
    if status.holds_stock() {
        let product = lock_product(&txn, order.product_id).await?;
        restore_stock(&txn, product, order.quantity, now).await?;
    }

    let reason = reason.trim();
    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().to_string());
    active.cancellation_reason = Set((!reason.is_empty()).then(|| reason.to_string()));
    active.cancelled_by = Set(Some(actor.as_str().to_string()));
    active.cancelled_at = Set(Some(now));
    active.updated_at = Set(now);
    let order = active.update(&txn).await?;

    txn.commit().await?;

    info!(
        order_id,
        cancelled_by = actor.as_str(),
        restored = status.holds_stock(),
        "Order cancelled"
    );
    ctx.notify_all(&[Notice::order_status_changed(
        counterparty,
        order.id,
        OrderStatus::Cancelled.as_str(),
    )])
    .await;

    Ok(order)
}

/// Retrieves a specific order by its unique ID.
pub async fn get_order_by_id(db: &DatabaseConnection, order_id: i64) -> Result<Option<order::Model>> {
    Order::find_by_id(order_id).one(db).await.map_err(Into::into)
}

/// Orders placed by a buyer, newest first.
pub async fn get_orders_for_buyer(
    db: &DatabaseConnection,
    buyer_id: i64,
) -> Result<Vec<order::Model>> {
    Order::find()
        .filter(order::Column::BuyerId.eq(buyer_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Orders received by a farmer, newest first, optionally limited to one status.
pub async fn get_orders_for_farmer(
    db: &DatabaseConnection,
    farmer_id: i64,
    status: Option<OrderStatus>,
) -> Result<Vec<order::Model>> {
    let mut query = Order::find().filter(order::Column::FarmerId.eq(farmer_id));
    if let Some(status) = status {
        query = query.filter(order::Column::Status.eq(status.as_str()));
    }
    query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
