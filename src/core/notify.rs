//! Notification sink - informs the counterparty of a committed state change.
//!
//! Notices are built inside an operation but only dispatched after its transaction
//! commits, so no row lock is ever held while a sink does I/O. A failing sink is
//! logged and otherwise ignored: the state change it reports has already happened.

use crate::{
    entities::{Notification, notification},
    errors::Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// A buyer placed an order on the farmer's product
    OrderReceived,
    /// An order moved to a new status
    OrderStatusChanged,
    /// A product's stock reached zero
    OutOfStock,
    /// A message arrived in a conversation
    NewMessage,
}

impl NoticeKind {
    /// Column value for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderReceived => "order_received",
            Self::OrderStatusChanged => "order_status_changed",
            Self::OutOfStock => "out_of_stock",
            Self::NewMessage => "new_message",
        }
    }
}

/// A single notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    /// Recipient
    pub user_id: i64,
    /// What happened
    pub kind: NoticeKind,
    /// Short title
    pub title: String,
    /// Body text
    pub body: String,
    /// Ids of the affected rows
    pub data: Value,
}

impl Notice {
    /// Order placed on one of the farmer's products.
    #[must_use]
    pub fn order_received(farmer_id: i64, order_id: i64, product_title: &str, quantity: i32) -> Self {
        Self {
            user_id: farmer_id,
            kind: NoticeKind::OrderReceived,
            title: "New order".to_string(),
            body: format!("New order for {quantity} x {product_title}"),
            data: json!({ "order_id": order_id }),
        }
    }

    /// Order moved to `status`.
    #[must_use]
    pub fn order_status_changed(user_id: i64, order_id: i64, status: &str) -> Self {
        let body = match status {
            "confirmed" => "Your order was accepted".to_string(),
            "cancelled" => "The order was cancelled".to_string(),
            "delivered" => "Your order was delivered".to_string(),
            other => format!("Your order is now {other}"),
        };
        Self {
            user_id,
            kind: NoticeKind::OrderStatusChanged,
            title: "Order status update".to_string(),
            body,
            data: json!({ "order_id": order_id, "status": status }),
        }
    }

    /// Product sold out.
    #[must_use]
    pub fn out_of_stock(farmer_id: i64, product_id: i64, product_title: &str) -> Self {
        Self {
            user_id: farmer_id,
            kind: NoticeKind::OutOfStock,
            title: "Out of stock".to_string(),
            body: format!("\"{product_title}\" is out of stock. Please update the available quantity."),
            data: json!({ "product_id": product_id }),
        }
    }

    /// Message received.
    #[must_use]
    pub fn new_message(recipient_id: i64, conversation_id: i64, message_id: i64) -> Self {
        Self {
            user_id: recipient_id,
            kind: NoticeKind::NewMessage,
            title: "New message".to_string(),
            body: "You have a new message".to_string(),
            data: json!({ "conversation_id": conversation_id, "message_id": message_id }),
        }
    }
}

/// Destination for notices.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one notice.
    async fn deliver(&self, notice: &Notice, at: DateTime<Utc>) -> Result<()>;
}

/// Persists notices in the `notifications` table.
///
/// Holds the connection behind an `Arc` so the engine and the sink share one pool.
#[derive(Debug, Clone)]
pub struct DatabaseNotifier {
    db: Arc<DatabaseConnection>,
}

impl DatabaseNotifier {
    /// Creates a notifier writing through `db`.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationSink for DatabaseNotifier {
    async fn deliver(&self, notice: &Notice, at: DateTime<Utc>) -> Result<()> {
        let row = notification::ActiveModel {
            user_id: Set(notice.user_id),
            kind: Set(notice.kind.as_str().to_string()),
            title: Set(notice.title.clone()),
            body: Set(notice.body.clone()),
            data: Set(notice.data.clone()),
            is_read: Set(false),
            created_at: Set(at),
            ..Default::default()
        };
        row.insert(self.db.as_ref()).await?;
        Ok(())
    }
}

/// Discards every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn deliver(&self, notice: &Notice, _at: DateTime<Utc>) -> Result<()> {
        debug!(user_id = notice.user_id, kind = notice.kind.as_str(), "Dropping notice");
        Ok(())
    }
}

/// A user's stored notifications, newest first.
pub async fn get_notifications_for_user(
    db: &DatabaseConnection,
    user_id: i64,
    unread_only: bool,
) -> Result<Vec<notification::Model>> {
    let mut query = Notification::find().filter(notification::Column::UserId.eq(user_id));
    if unread_only {
        query = query.filter(notification::Column::IsRead.eq(false));
    }
    query
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks all of a user's notifications read. Returns how many changed.
pub async fn mark_notifications_read(db: &DatabaseConnection, user_id: i64) -> Result<u64> {
    let result = Notification::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Sends every notice, logging failures instead of propagating them.
pub async fn dispatch(sink: &dyn NotificationSink, notices: &[Notice], at: DateTime<Utc>) {
    for notice in notices {
        if let Err(e) = sink.deliver(notice, at).await {
            warn!(
                user_id = notice.user_id,
                kind = notice.kind.as_str(),
                "Failed to deliver notification: {e}"
            );
        }
    }
}
