//! Maintenance job
//!
//! Removes expired feed posts, archives idle conversations and cancels stale pending
//! orders in a single transaction, then records when it ran in the `system_state`
//! table. The run is time-boxed: if it does not finish within the configured limit the
//! transaction is dropped and nothing it did is kept.

use crate::{
    core::{
        EngineContext,
        notify::Notice,
        status::{CancelledBy, OrderStatus},
        store::begin_locked,
    },
    entities::{Conversation, FeedPost, Order, SystemState, conversation, feed_post, order, system_state},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{Condition, DatabaseTransaction, QuerySelect, Set, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

const LAST_CLEANUP_KEY: &str = "last_cleanup_at";

/// Only published posts expire; drafts are kept regardless of `expires_at`.
const PUBLISHED: &str = "published";

/// What one cleanup run changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    /// Expired feed posts deleted
    pub expired_posts_deleted: u64,
    /// Idle conversations archived for both participants
    pub conversations_archived: u64,
    /// Ids of pending orders cancelled by the system
    pub cancelled_order_ids: Vec<i64>,
    /// When the run committed
    pub ran_at: DateTime<Utc>,
}

/// When the cleanup last committed, if ever.
pub async fn last_cleanup_at(db: &DatabaseConnection) -> Result<Option<DateTime<Utc>>> {
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_CLEANUP_KEY))
        .one(db)
        .await?;

    match state {
        Some(s) => DateTime::parse_from_rfc3339(&s.value)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| Error::Config {
                message: format!("Failed to parse last cleanup time: {e}"),
            }),
        None => Ok(None),
    }
}

/// Whether a full run interval has passed since the last cleanup.
pub async fn is_cleanup_due(db: &DatabaseConnection, ctx: &EngineContext) -> Result<bool> {
    let secs = ctx.config.maintenance.run_interval_secs;
    let interval = i64::try_from(secs)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .ok_or_else(|| Error::Config {
            message: format!("Run interval of {secs} seconds is out of range"),
        })?;
    let now = ctx.clock.now();
    Ok(last_cleanup_at(db)
        .await?
        .is_none_or(|last| now - last >= interval))
}

fn days_before(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    ChronoDuration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| Error::Config {
            message: format!("A window of {days} days is out of range"),
        })
}

async fn set_last_cleanup_at<C>(db: &C, at: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_CLEANUP_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(at.to_rfc3339());
        active_model.updated_at = Set(at);
        active_model.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(LAST_CLEANUP_KEY.to_string()),
            value: Set(at.to_rfc3339()),
            updated_at: Set(at),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

/// Runs the cleanup within the configured time limit.
///
/// The limit covers the work inside the transaction; the commit itself runs after it.
///
/// # Errors
/// `Timeout` if the work exceeds `maintenance.max_run_secs`, `Config` if a window does
/// not fit the calendar, or any store error. In all of these cases nothing is changed.
pub async fn cleanup_expired_data(
    db: &DatabaseConnection,
    ctx: &EngineContext,
) -> Result<CleanupResult> {
    let seconds = ctx.config.maintenance.max_run_secs;
    let Ok(outcome) =
        tokio::time::timeout(Duration::from_secs(seconds), run_cleanup(db, ctx)).await
    else {
        warn!(seconds, "Cleanup exceeded its time limit, rolled back");
        return Err(Error::Timeout {
            operation: "cleanup_expired_data",
            seconds,
        });
    };
    let (txn, result, notices) = outcome?;
    txn.commit().await?;

    info!(
        posts = result.expired_posts_deleted,
        conversations = result.conversations_archived,
        orders = result.cancelled_order_ids.len(),
        "Cleanup committed"
    );
    ctx.notify_all(&notices).await;
    Ok(result)
}

/// The cleanup work, left uncommitted. Notices for the cancelled orders are returned
/// unsent; they are dispatched after the commit.
async fn run_cleanup(
    db: &DatabaseConnection,
    ctx: &EngineContext,
) -> Result<(DatabaseTransaction, CleanupResult, Vec<Notice>)> {
    let settings = &ctx.config.maintenance;
    let now = ctx.clock.now();
    let archive_cutoff = days_before(now, settings.conversation_archive_after_days)?;
    let expiry_cutoff = days_before(now, settings.pending_order_expiry_days)?;

    let txn = begin_locked(db).await?;

    let expired_posts_deleted = FeedPost::delete_many()
        .filter(feed_post::Column::Status.eq(PUBLISHED))
        .filter(feed_post::Column::ExpiresAt.is_not_null())
        .filter(feed_post::Column::ExpiresAt.lt(now))
        .exec(&txn)
        .await?
        .rows_affected;

    let conversations_archived = Conversation::update_many()
        .col_expr(conversation::Column::ArchivedByOne, Expr::value(true))
        .col_expr(conversation::Column::ArchivedByTwo, Expr::value(true))
        .filter(
            Condition::any()
                .add(conversation::Column::LastMessageAt.lt(archive_cutoff))
                .add(
                    Condition::all()
                        .add(conversation::Column::LastMessageAt.is_null())
                        .add(conversation::Column::CreatedAt.lt(archive_cutoff)),
                ),
        )
        .filter(
            Condition::any()
                .add(conversation::Column::ArchivedByOne.eq(false))
                .add(conversation::Column::ArchivedByTwo.eq(false)),
        )
        .exec(&txn)
        .await?
        .rows_affected;

    let stale: Vec<(i64, i64, i64)> = Order::find()
        .select_only()
        .column(order::Column::Id)
        .column(order::Column::BuyerId)
        .column(order::Column::FarmerId)
        .filter(order::Column::Status.eq(OrderStatus::Pending.as_str()))
        .filter(order::Column::CreatedAt.lt(expiry_cutoff))
        .lock_exclusive()
        .into_tuple()
        .all(&txn)
        .await?;
    let cancelled_order_ids: Vec<i64> = stale.iter().map(|(id, _, _)| *id).collect();
    if !cancelled_order_ids.is_empty() {
        Order::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Cancelled.as_str()),
            )
            .col_expr(
                order::Column::CancellationReason,
                Expr::value(settings.auto_cancel_reason.clone()),
            )
            .col_expr(
                order::Column::CancelledBy,
                Expr::value(CancelledBy::System.as_str()),
            )
            .col_expr(order::Column::CancelledAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.is_in(cancelled_order_ids.clone()))
            .exec(&txn)
            .await?;
    }

    set_last_cleanup_at(&txn, now).await?;

    let result = CleanupResult {
        expired_posts_deleted,
        conversations_archived,
        cancelled_order_ids,
        ran_at: now,
    };

    let status = OrderStatus::Cancelled.as_str();
    let notices: Vec<Notice> = stale
        .iter()
        .flat_map(|&(id, buyer_id, farmer_id)| {
            [
                Notice::order_status_changed(buyer_id, id, status),
                Notice::order_status_changed(farmer_id, id, status),
            ]
        })
        .collect();

    Ok((txn, result, notices))
}

/// Formats a cleanup result for the log.
#[must_use]
pub fn format_cleanup_summary(result: &CleanupResult) -> String {
    format!(
        "Cleanup - {}\n  Expired posts deleted: {}\n  Conversations archived: {}\n  Pending orders cancelled: {}\n",
        result.ran_at.format("%Y-%m-%d %H:%M UTC"),
        result.expired_posts_deleted,
        result.conversations_archived,
        result.cancelled_order_ids.len()
    )
}
