//! Financial dashboard aggregation.
//!
//! This module answers "how much revenue, commission and ledger activity happened in
//! period X" for the admin dashboard. It is a pure read path: rows are loaded with
//! `SeaORM` and folded in memory, and the result is structured data the API layer
//! serializes as-is.

use crate::{
    core::{DateRange, ledger::LedgerFilter},
    entities::{Commission, CommissionStatus, OrderStatus, TransactionType, commission},
    errors::Result,
};
use sea_orm::{DatabaseConnection, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;

/// Revenue from completed orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    /// Sum of `total_amount`
    pub total_revenue: f64,
    /// Number of completed orders
    pub total_orders: u64,
    /// Mean `total_amount`, zero when there are no orders
    pub avg_order_value: f64,
}

/// Commission totals for one status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionStatusSummary {
    /// Status
    pub status: CommissionStatus,
    /// Sum of `commission_amount`
    pub total: f64,
    /// Number of commissions
    pub count: u64,
}

/// Ledger totals for one (year, quarter, type) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterlySummary {
    /// Fiscal year
    pub fiscal_year: i32,
    /// Fiscal quarter
    pub fiscal_quarter: i32,
    /// Transaction type
    pub transaction_type: TransactionType,
    /// Sum of amounts
    pub total: f64,
    /// Number of rows
    pub count: u64,
}

/// Commissions still owed to earners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayouts {
    /// Number of pending, unpaid commissions
    pub count: u64,
    /// Their total amount
    pub total: f64,
}

/// Everything the admin dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialDashboard {
    /// Window the figures cover
    pub range: DateRange,
    /// Completed-order revenue
    pub revenue: RevenueSummary,
    /// Commission totals by status
    pub commissions: Vec<CommissionStatusSummary>,
    /// Ledger totals by fiscal quarter and type, oldest first
    pub quarterly: Vec<QuarterlySummary>,
    /// Outstanding commission liability
    pub pending_payouts: PendingPayouts,
}

/// Builds the admin financial dashboard.
///
/// # Arguments
/// * `db` - Database connection
/// * `range` - Window applied to order and commission `created_at` and to ledger
///   `transaction_date`
///
/// # Returns
/// Revenue, commission and quarterly ledger summaries for the window. Pending payouts
/// are always the full outstanding liability, regardless of the window.
pub async fn financial_dashboard(
    db: &DatabaseConnection,
    range: DateRange,
) -> Result<FinancialDashboard> {
    let orders =
        crate::core::order::list_orders(db, range, Some(OrderStatus::Completed)).await?;
    let revenue = summarize_revenue(orders.iter().map(|o| o.total_amount));

    let commissions = range
        .apply(Commission::find(), commission::Column::CreatedAt)
        .all(db)
        .await?;
    let by_status = summarize_commissions(&commissions);

    let ledger_rows = crate::core::ledger::find_entries(
        db,
        &LedgerFilter {
            range,
            ..Default::default()
        },
    )
    .await?;
    let mut quarterly: BTreeMap<(i32, i32, TransactionType), (f64, u64)> = BTreeMap::new();
    for row in &ledger_rows {
        let group = quarterly
            .entry((row.fiscal_year, row.fiscal_quarter, row.transaction_type))
            .or_default();
        group.0 += row.amount;
        group.1 += 1;
    }

    let outstanding = Commission::find()
        .filter(commission::Column::Status.eq(CommissionStatus::Pending))
        .filter(commission::Column::PaidToUser.eq(false))
        .all(db)
        .await?;
    let pending_payouts = PendingPayouts {
        count: outstanding.len() as u64,
        total: outstanding.iter().map(|c| c.commission_amount).sum(),
    };

    tracing::debug!(
        orders = revenue.total_orders,
        ledger_rows = ledger_rows.len(),
        "built financial dashboard"
    );

    Ok(FinancialDashboard {
        range,
        revenue,
        commissions: by_status,
        quarterly: quarterly
            .into_iter()
            .map(
                |((fiscal_year, fiscal_quarter, transaction_type), (total, count))| {
                    QuarterlySummary {
                        fiscal_year,
                        fiscal_quarter,
                        transaction_type,
                        total,
                        count,
                    }
                },
            )
            .collect(),
        pending_payouts,
    })
}

/// Sum, count and mean of order totals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize_revenue(totals: impl Iterator<Item = f64>) -> RevenueSummary {
    let (total_revenue, total_orders) = totals.fold((0.0, 0_u64), |(sum, n), t| (sum + t, n + 1));
    let avg_order_value = if total_orders == 0 {
        0.0
    } else {
        total_revenue / total_orders as f64
    };
    RevenueSummary {
        total_revenue,
        total_orders,
        avg_order_value,
    }
}

fn summarize_commissions(commissions: &[commission::Model]) -> Vec<CommissionStatusSummary> {
    let mut groups: BTreeMap<CommissionStatus, (f64, u64)> = BTreeMap::new();
    for c in commissions {
        let group = groups.entry(c.status).or_default();
        group.0 += c.commission_amount;
        group.1 += 1;
    }
    groups
        .into_iter()
        .map(|(status, (total, count))| CommissionStatusSummary {
            status,
            total,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_revenue_of_nothing() {
        assert_eq!(
            summarize_revenue(std::iter::empty()),
            RevenueSummary::default()
        );
    }

    #[tokio::test]
    async fn test_revenue_sum_and_mean() -> Result<()> {
        let db = setup_test_db().await?;
        for (i, amount) in [100.0, 50.0, 30.0].into_iter().enumerate() {
            create_completed_order(&db, &format!("cs_{i}"), amount).await?;
        }
        create_pending_order(&db, "cs_open", 999.0).await?;

        let dashboard = financial_dashboard(&db, DateRange::default()).await?;

        assert_eq!(dashboard.revenue.total_orders, 3);
        assert_eq!(dashboard.revenue.total_revenue, 180.0);
        assert_eq!(dashboard.revenue.avg_order_value, 60.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_range_excludes_orders_outside_window() -> Result<()> {
        let db = setup_test_db().await?;
        let now = Utc::now();
        create_order_at(&db, "cs_old", 40.0, now - Duration::days(90)).await?;
        create_order_at(&db, "cs_new", 60.0, now - Duration::days(1)).await?;

        let range = DateRange::new(Some(now - Duration::days(30)), None);
        let dashboard = financial_dashboard(&db, range).await?;

        assert_eq!(dashboard.revenue.total_orders, 1);
        assert_eq!(dashboard.revenue.total_revenue, 60.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_commissions_and_pending_payouts() -> Result<()> {
        let db = setup_test_db().await?;
        let earner = create_test_user(&db, "brand@example.com").await?;
        insert_commission(&db, earner.id, 10.0, CommissionStatus::Pending).await?;
        insert_commission(&db, earner.id, 2.5, CommissionStatus::Pending).await?;
        insert_commission(&db, earner.id, 5.0, CommissionStatus::Paid).await?;

        let dashboard = financial_dashboard(&db, DateRange::default()).await?;

        let pending = dashboard
            .commissions
            .iter()
            .find(|s| s.status == CommissionStatus::Pending)
            .unwrap();
        assert_eq!(pending.total, 12.5);
        assert_eq!(pending.count, 2);
        assert!(
            !dashboard
                .commissions
                .iter()
                .any(|s| s.status == CommissionStatus::Cancelled)
        );
        assert_eq!(
            dashboard.pending_payouts,
            PendingPayouts {
                count: 2,
                total: 12.5
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_quarterly_groups_ledger_rows() -> Result<()> {
        let db = setup_test_db().await?;
        create_fulfilled_order(&db, "cs_a", 100.0).await?;
        create_fulfilled_order(&db, "cs_b", 50.0).await?;

        let dashboard = financial_dashboard(&db, DateRange::default()).await?;

        let sales = dashboard
            .quarterly
            .iter()
            .find(|q| q.transaction_type == TransactionType::Sale)
            .unwrap();
        assert_eq!(sales.total, 150.0);
        assert_eq!(sales.count, 2);
        let accruals = dashboard
            .quarterly
            .iter()
            .find(|q| q.transaction_type == TransactionType::Commission)
            .unwrap();
        assert_eq!(accruals.total, 3.0);
        Ok(())
    }
}
