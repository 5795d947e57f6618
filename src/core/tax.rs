//! Estimated tax liability report.
//!
//! The report groups a fiscal period's ledger rows by tax jurisdiction and transaction
//! type, then applies flat federal and state rates to `sales − commissions`. The
//! figures are a projection for planning, not a computed obligation; no jurisdictional
//! tax tables are modelled.
//!
//! Sale, commission and refund rows inherit the jurisdiction of their order. Rows
//! without one (payouts, untagged orders) are grouped under [`UNASSIGNED_JURISDICTION`].

use crate::{
    config::TaxConfig,
    core::{
        DateRange,
        fiscal::period_bounds,
        ledger::{LedgerFilter, find_entries},
    },
    entities::{LedgerModel, TransactionType},
    errors::Result,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::BTreeMap;

/// Jurisdiction label for rows without one
pub const UNASSIGNED_JURISDICTION: &str = "unassigned";

/// Period a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxPeriod {
    /// Fiscal year
    pub year: i32,
    /// Fiscal quarter, `None` for the whole year
    pub quarter: Option<i32>,
    /// Fiscal month, `None` for the whole quarter or year
    pub month: Option<i32>,
    /// Calendar bounds of the period
    pub range: DateRange,
}

/// Ledger totals for one jurisdiction and transaction type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    /// Tax jurisdiction, or [`UNASSIGNED_JURISDICTION`]
    pub jurisdiction: String,
    /// Transaction type
    pub transaction_type: TransactionType,
    /// Sum of amounts
    pub total: f64,
    /// Number of rows
    pub count: u64,
}

/// Headline figures of the estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSummary {
    /// Sum of `sale` rows
    pub total_sales: f64,
    /// Sum of `commission` rows
    pub total_commissions: f64,
    /// `max(sales − commissions, 0)`
    pub taxable_income: f64,
    /// Federal rate used
    pub federal_rate: f64,
    /// State rate used
    pub state_rate: f64,
    /// `taxable_income × federal_rate`
    pub estimated_federal_tax: f64,
    /// `taxable_income × state_rate`
    pub estimated_state_tax: f64,
    /// Federal plus state
    pub total_estimated_tax: f64,
}

impl TaxSummary {
    /// Applies `rates` to the given sales and commission totals.
    #[must_use]
    pub fn estimate(total_sales: f64, total_commissions: f64, rates: TaxConfig) -> Self {
        let taxable_income = (total_sales - total_commissions).max(0.0);
        let estimated_federal_tax = taxable_income * rates.federal_rate;
        let estimated_state_tax = taxable_income * rates.state_rate;
        Self {
            total_sales,
            total_commissions,
            taxable_income,
            federal_rate: rates.federal_rate,
            state_rate: rates.state_rate,
            estimated_federal_tax,
            estimated_state_tax,
            total_estimated_tax: estimated_federal_tax + estimated_state_tax,
        }
    }
}

/// The tax report returned to admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxReport {
    /// Covered period
    pub period: TaxPeriod,
    /// Per-jurisdiction, per-type totals
    pub breakdown: Vec<TaxBreakdown>,
    /// Estimate
    pub summary: TaxSummary,
    /// Always `true`
    pub is_estimate: bool,
    /// Caveat shown alongside the figures
    pub disclaimer: &'static str,
}

/// Builds the tax estimate for a fiscal year, quarter or month.
///
/// # Errors
/// [`crate::errors::Error::Validation`] when the quarter or month is out of range or
/// the month does not belong to the quarter.
pub async fn tax_report(
    db: &DatabaseConnection,
    year: i32,
    quarter: Option<i32>,
    month: Option<i32>,
    rates: TaxConfig,
) -> Result<TaxReport> {
    let range = period_bounds(year, quarter, month)?;

    let rows = find_entries(
        db,
        &LedgerFilter {
            fiscal_year: Some(year),
            fiscal_quarter: quarter,
            fiscal_month: month,
            ..Default::default()
        },
    )
    .await?;

    let breakdown = breakdown(&rows);
    let total_of = |kind: TransactionType| -> f64 {
        rows.iter()
            .filter(|r| r.transaction_type == kind)
            .map(|r| r.amount)
            .sum()
    };
    let summary = TaxSummary::estimate(
        total_of(TransactionType::Sale),
        total_of(TransactionType::Commission),
        rates,
    );

    tracing::info!(
        year,
        ?quarter,
        ?month,
        rows = rows.len(),
        taxable = summary.taxable_income,
        "generated tax report"
    );

    Ok(TaxReport {
        period: TaxPeriod {
            year,
            quarter,
            month,
            range,
        },
        breakdown,
        summary,
        is_estimate: true,
        disclaimer: "Estimated at flat federal and state rates; consult a tax professional for actual obligations.",
    })
}

fn breakdown(rows: &[LedgerModel]) -> Vec<TaxBreakdown> {
    let mut groups: BTreeMap<(String, TransactionType), (f64, u64)> = BTreeMap::new();
    for row in rows {
        let jurisdiction = row
            .tax_jurisdiction
            .clone()
            .unwrap_or_else(|| UNASSIGNED_JURISDICTION.to_string());
        let group = groups
            .entry((jurisdiction, row.transaction_type))
            .or_default();
        group.0 += row.amount;
        group.1 += 1;
    }
    groups
        .into_iter()
        .map(|((jurisdiction, transaction_type), (total, count))| TaxBreakdown {
            jurisdiction,
            transaction_type,
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
    use crate::core::fiscal::FiscalPeriod;
    use crate::core::ledger::{NewLedgerEntry, post_entry};
    use crate::core::order::{NewOrder, NewOrderItem, create_order, fulfill_order};
    use crate::entities::Account;
    use crate::errors::Error;
    use crate::test_utils::*;
    use chrono::{TimeZone, Utc};

    fn row(
        kind: TransactionType,
        debit: Account,
        credit: Account,
        amount: f64,
        month: u32,
    ) -> NewLedgerEntry {
        NewLedgerEntry::new(
            kind,
            debit,
            credit,
            amount,
            "USD",
            Utc.with_ymd_and_hms(2025, month, 10, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_estimate_rates() {
        let summary = TaxSummary::estimate(1000.0, 200.0, TaxConfig::default());
        assert_eq!(summary.taxable_income, 800.0);
        assert!((summary.estimated_federal_tax - 168.0).abs() < 1e-9);
        assert!((summary.estimated_state_tax - 40.0).abs() < 1e-9);
        assert!((summary.total_estimated_tax - 208.0).abs() < 1e-9);
    }

    #[test]
    fn test_taxable_income_never_negative() {
        let summary = TaxSummary::estimate(10.0, 50.0, TaxConfig::default());
        assert_eq!(summary.taxable_income, 0.0);
        assert_eq!(summary.total_estimated_tax, 0.0);
    }

    #[tokio::test]
    async fn test_report_groups_by_jurisdiction_and_type() -> Result<()> {
        let db = setup_test_db().await?;
        post_entry(
            &db,
            row(TransactionType::Sale, Account::Cash, Account::Revenue, 500.0, 2)
                .in_jurisdiction("US-CA"),
        )
        .await?;
        post_entry(
            &db,
            row(TransactionType::Sale, Account::Cash, Account::Revenue, 300.0, 3),
        )
        .await?;
        post_entry(
            &db,
            row(
                TransactionType::Commission,
                Account::CommissionExpense,
                Account::CommissionPayable,
                100.0,
                3,
            ),
        )
        .await?;
        post_entry(
            &db,
            row(TransactionType::Sale, Account::Cash, Account::Revenue, 900.0, 5),
        )
        .await?;

        let report = tax_report(&db, 2025, Some(1), None, TaxConfig::default()).await?;

        assert!(report.is_estimate);
        assert_eq!(report.summary.total_sales, 800.0);
        assert_eq!(report.summary.total_commissions, 100.0);
        assert_eq!(report.summary.taxable_income, 700.0);
        assert_eq!(report.breakdown.len(), 3);
        let ca = report
            .breakdown
            .iter()
            .find(|b| b.jurisdiction == "US-CA")
            .unwrap();
        assert_eq!(ca.total, 500.0);
        assert!(
            report
                .breakdown
                .iter()
                .any(|b| b.jurisdiction == UNASSIGNED_JURISDICTION
                    && b.transaction_type == TransactionType::Commission)
        );

        let march = tax_report(&db, 2025, None, Some(3), TaxConfig::default()).await?;
        assert_eq!(march.summary.total_sales, 300.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_fulfilled_order_reports_under_its_jurisdiction() -> Result<()> {
        let db = setup_test_db().await?;
        let earner = create_test_user(&db, "earner@example.com").await?;
        let order = create_order(
            &db,
            NewOrder {
                event_id: "evt_ny".to_string(),
                user_id: None,
                items: vec![NewOrderItem {
                    ticket_id: "ga".to_string(),
                    quantity: 4,
                    price_per_unit: 25.0,
                }],
                original_currency: "USD".to_string(),
                currency: "USD".to_string(),
                conversion_rate: 1.0,
                stripe_session_id: "cs_ny".to_string(),
                tax_jurisdiction: Some("US-NY".to_string()),
            },
        )
        .await?;
        let fulfilled = fulfill_order(&db, order.id, earner.id, None).await?;

        let year = FiscalPeriod::from_date(fulfilled.order.updated_at).year;
        let report = tax_report(&db, year, None, None, TaxConfig::default()).await?;

        assert!(
            report
                .breakdown
                .iter()
                .all(|b| b.jurisdiction == "US-NY")
        );
        let sale = report
            .breakdown
            .iter()
            .find(|b| b.transaction_type == TransactionType::Sale)
            .unwrap();
        assert_eq!(sale.total, 100.0);
        assert!(
            report
                .breakdown
                .iter()
                .any(|b| b.transaction_type == TransactionType::Commission)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_report_rejects_invalid_period() -> Result<()> {
        let db = setup_test_db().await?;
        let result = tax_report(&db, 2025, Some(7), None, TaxConfig::default()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }
}
