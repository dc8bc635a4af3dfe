//! Data integrity scan
//!
//! Reads products, orders and users and reports rows that break the marketplace
//! invariants. It never writes and never fails because of what it finds; only a
//! store error makes it return `Err`.

use crate::{
    core::{EngineContext, order::expected_total, status::ProductStatus},
    entities::{Order, Product, User, product},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Stored totals may differ from the recomputed value by at most this much.
pub const TOTAL_TOLERANCE: f64 = 0.01;

/// Category of an integrity problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Order whose product, buyer or farmer no longer exists
    OrphanedOrders,
    /// Product with remaining quantity below zero
    NegativeStock,
    /// Order whose total is not `quantity * unit_price + delivery_fee`
    InconsistentOrderTotals,
    /// Product with more remaining than it was listed with
    StockAboveOriginal,
    /// Product whose status does not match its remaining quantity
    InconsistentStockStatus,
}

impl IssueKind {
    /// Snake-case label, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrphanedOrders => "orphaned_orders",
            Self::NegativeStock => "negative_stock",
            Self::InconsistentOrderTotals => "inconsistent_order_totals",
            Self::StockAboveOriginal => "stock_above_original",
            Self::InconsistentStockStatus => "inconsistent_stock_status",
        }
    }
}

/// All rows affected by one kind of problem.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityIssue {
    /// Kind of problem
    pub kind: IssueKind,
    /// Number of affected rows
    pub count: usize,
    /// Ids of the affected orders or products
    pub ids: Vec<i64>,
}

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    /// When the scan ran
    pub checked_at: DateTime<Utc>,
    /// One entry per kind that found something
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// Whether any problem was found.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// The report as a single JSON line.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The entry for `kind`, if it found anything.
    #[must_use]
    pub fn issue(&self, kind: IssueKind) -> Option<&IntegrityIssue> {
        self.issues.iter().find(|issue| issue.kind == kind)
    }
}

fn push_issue(issues: &mut Vec<IntegrityIssue>, kind: IssueKind, ids: Vec<i64>) {
    if !ids.is_empty() {
        issues.push(IntegrityIssue {
            kind,
            count: ids.len(),
            ids,
        });
    }
}

fn has_inconsistent_status(product: &product::Model) -> bool {
    !ProductStatus::parse(&product.status)
        .is_ok_and(|status| status == status.after_stock_change(product.remaining_quantity))
}

/// Scans the store for broken invariants.
///
/// # Errors
/// Only if the store cannot be read.
pub async fn validate_data_integrity(
    db: &DatabaseConnection,
    ctx: &EngineContext,
) -> Result<IntegrityReport> {
    let user_ids: HashSet<i64> = User::find()
        .select_only()
        .column(crate::entities::user::Column::Id)
        .into_tuple::<i64>()
        .all(db)
        .await?
        .into_iter()
        .collect();
    let products = Product::find()
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?;
    let product_ids: HashSet<i64> = products.iter().map(|p| p.id).collect();
    let orders = Order::find()
        .order_by_asc(crate::entities::order::Column::Id)
        .all(db)
        .await?;

    let orphaned = orders
        .iter()
        .filter(|o| {
            !product_ids.contains(&o.product_id)
                || !user_ids.contains(&o.buyer_id)
                || !user_ids.contains(&o.farmer_id)
        })
        .map(|o| o.id)
        .collect();
    let bad_totals = orders
        .iter()
        .filter(|o| {
            let expected = expected_total(o.quantity, o.unit_price, o.delivery_fee);
            (o.total_price - expected).abs() > TOTAL_TOLERANCE
        })
        .map(|o| o.id)
        .collect();
    let negative = products
        .iter()
        .filter(|p| p.remaining_quantity < 0)
        .map(|p| p.id)
        .collect();
    let above_original = products
        .iter()
        .filter(|p| p.remaining_quantity > p.original_quantity)
        .map(|p| p.id)
        .collect();
    let bad_status = products
        .iter()
        .filter(|p| has_inconsistent_status(p))
        .map(|p| p.id)
        .collect();

    let mut issues = Vec::new();
    push_issue(&mut issues, IssueKind::OrphanedOrders, orphaned);
    push_issue(&mut issues, IssueKind::NegativeStock, negative);
    push_issue(&mut issues, IssueKind::InconsistentOrderTotals, bad_totals);
    push_issue(&mut issues, IssueKind::StockAboveOriginal, above_original);
    push_issue(&mut issues, IssueKind::InconsistentStockStatus, bad_status);

    let report = IntegrityReport {
        checked_at: ctx.clock.now(),
        issues,
    };
    if report.has_issues() {
        warn!(
            kinds = report.issues.len(),
            products = products.len(),
            orders = orders.len(),
            "Integrity scan found problems"
        );
    } else {
        info!(
            products = products.len(),
            orders = orders.len(),
            "Integrity scan clean"
        );
    }
    Ok(report)
}

/// Human-readable summary of a report, one line per problem kind.
#[must_use]
pub fn format_integrity_summary(report: &IntegrityReport) -> String {
    use std::fmt::Write;

    let mut summary = format!(
        "Integrity check - {}\n",
        report.checked_at.format("%Y-%m-%d %H:%M UTC")
    );
    if !report.has_issues() {
        summary.push_str("  No issues found\n");
        return summary;
    }
    for issue in &report.issues {
        let ids: Vec<String> = issue.ids.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            summary,
            "  {}: {} (ids: {})",
            issue.kind.as_str(),
            issue.count,
            ids.join(", ")
        );
    }
    summary
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::order::{NewOrder, create_order};
    use crate::core::status::DeliveryMethod;
    use crate::entities::order;
    use crate::test_utils::*;
    use sea_orm::Set;

    #[tokio::test]
    async fn test_clean_database_has_no_issues() -> Result<()> {
        let (db, ctx, _recorder, product) = setup_with_product(10).await?;
        create_test_order(&db, &ctx, product.id, 2).await?;

        let report = validate_data_integrity(&db, &ctx).await?;
        assert!(!report.has_issues());
        assert_eq!(report.checked_at, test_now());
        assert!(format_integrity_summary(&report).contains("No issues found"));
        Ok(())
    }

    #[tokio::test]
    async fn test_inconsistent_total_is_flagged() -> Result<()> {
        let (db, ctx, _recorder, product) = setup_with_product(10).await?;
        let buyer = create_test_buyer(&db, &ctx, "Bea Buyer").await?;
        let new_order = NewOrder {
            product_id: product.id,
            quantity: 3,
            delivery_method: DeliveryMethod::Delivery,
            delivery_address: None,
            notes: None,
        };
        let order = create_order(&db, &ctx, new_order, buyer.id).await?;
        assert!((order.total_price - 35.0).abs() < f64::EPSILON);

        let mut tampered: order::ActiveModel = order.clone().into();
        tampered.total_price = Set(40.0);
        tampered.update(&db).await?;

        let report = validate_data_integrity(&db, &ctx).await?;
        let issue = report.issue(IssueKind::InconsistentOrderTotals).unwrap();
        assert_eq!(issue.count, 1);
        assert_eq!(issue.ids, vec![order.id]);
        assert_eq!(report.issues.len(), 1);

        // Scan is read-only
        let stored = Order::find_by_id(order.id).one(&db).await?.unwrap();
        assert!((stored.total_price - 40.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn test_stock_problems_are_flagged() -> Result<()> {
        let (db, ctx, _recorder, product) = setup_with_product(10).await?;
        let other = create_test_product(&db, &ctx, product.farmer_id, 10).await?;
        let third = create_test_product(&db, &ctx, product.farmer_id, 10).await?;

        let mut negative: product::ActiveModel = product.clone().into();
        negative.remaining_quantity = Set(-2);
        negative.update(&db).await?;

        let mut above: product::ActiveModel = other.clone().into();
        above.remaining_quantity = Set(12);
        above.update(&db).await?;

        let mut mislabeled: product::ActiveModel = third.clone().into();
        mislabeled.status = Set("sold_out".to_string());
        mislabeled.update(&db).await?;

        let report = validate_data_integrity(&db, &ctx).await?;
        assert_eq!(
            report.issue(IssueKind::NegativeStock).unwrap().ids,
            vec![product.id]
        );
        assert_eq!(
            report.issue(IssueKind::StockAboveOriginal).unwrap().ids,
            vec![other.id]
        );
        assert_eq!(
            report.issue(IssueKind::InconsistentStockStatus).unwrap().ids,
            vec![third.id]
        );
        assert!(report.issue(IssueKind::OrphanedOrders).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_orphaned_order_is_flagged() -> Result<()> {
        let (db, ctx, _recorder, product) = setup_with_product(10).await?;
        let order = create_test_order(&db, &ctx, product.id, 1).await?;

        User::delete_by_id(order.buyer_id).exec(&db).await?;

        let report = validate_data_integrity(&db, &ctx).await?;
        let issue = report.issue(IssueKind::OrphanedOrders).unwrap();
        assert_eq!(issue.ids, vec![order.id]);

        let summary = format_integrity_summary(&report);
        assert!(summary.contains(&format!("orphaned_orders: 1 (ids: {})", order.id)));

        let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
        assert_eq!(json["issues"][0]["kind"], "orphaned_orders");
        assert_eq!(json["issues"][0]["ids"][0], order.id);
        Ok(())
    }
}
