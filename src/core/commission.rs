//! Commission business logic - Accrual, cancellation, balances and reports.
//!
//! A commission is accrued once per completed order at `order_amount × rate` and that
//! amount never changes afterwards. Settlement happens in `core::payout`; this module
//! owns the other transition (`pending → cancelled`) and the read paths used by the
//! user-facing balance/history endpoints and the admin report.

use crate::{
    core::{
        DateRange, Page, Pagination,
        fiscal::FiscalPeriod,
        ledger::{self, NewLedgerEntry},
    },
    entities::{
        Account, Commission, CommissionStatus, TransactionType, User, commission, order, user,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Rate applied when the caller does not supply one
pub const DEFAULT_COMMISSION_RATE: f64 = 0.02;

/// Checks that a commission rate is a finite fraction in `[0, 1]`.
pub fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        return Err(Error::InvalidAmount { amount: rate });
    }
    Ok(())
}

/// Accrues the commission for a completed order.
///
/// The rate defaults to [`DEFAULT_COMMISSION_RATE`]. The row starts `pending` and unpaid,
/// with its fiscal period taken from the accrual time. Only one commission may exist per
/// order. Callers post the matching ledger row; `core::order::fulfill_order` does both
/// inside one database transaction.
pub async fn accrue_commission<C>(
    db: &C,
    order: &order::Model,
    earner_user_id: i64,
    rate: Option<f64>,
) -> Result<commission::Model>
where
    C: ConnectionTrait,
{
    let commission_rate = rate.unwrap_or(DEFAULT_COMMISSION_RATE);
    validate_rate(commission_rate)?;

    let existing = Commission::find()
        .filter(commission::Column::OrderId.eq(order.id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::Duplicate {
            entity: "Commission",
            key: format!("order {}", order.id),
        });
    }

    let now = Utc::now();
    let period = FiscalPeriod::from_date(now);
    let commission_amount = order.total_amount * commission_rate;

    let model = commission::ActiveModel {
        order_id: Set(order.id),
        event_id: Set(order.event_id.clone()),
        user_id: Set(earner_user_id),
        order_amount: Set(order.total_amount),
        commission_rate: Set(commission_rate),
        commission_amount: Set(commission_amount),
        currency: Set(order.currency.clone()),
        status: Set(CommissionStatus::Pending),
        paid_to_user: Set(false),
        paid_date: Set(None),
        payment_method: Set(None),
        settlement_batch_id: Set(None),
        reconciled_by: Set(None),
        notes: Set(None),
        fiscal_year: Set(period.year),
        fiscal_quarter: Set(period.quarter),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        commission_id = model.id,
        order_id = order.id,
        user_id = earner_user_id,
        amount = model.commission_amount,
        "accrued commission"
    );
    Ok(model)
}

/// Ledger row recording an accrual: expense up, payable up.
#[must_use]
pub fn accrual_entry(commission: &commission::Model) -> NewLedgerEntry {
    NewLedgerEntry::new(
        TransactionType::Commission,
        Account::CommissionExpense,
        Account::CommissionPayable,
        commission.commission_amount,
        commission.currency.clone(),
        commission.created_at,
    )
    .described(format!(
        "Commission {:.2}% on order {}",
        commission.commission_rate * 100.0,
        commission.order_id
    ))
    .for_order(commission.order_id)
    .for_commission(commission.id)
    .for_event(commission.event_id.clone())
    .for_user(Some(commission.user_id))
}

/// Moves a pending commission to `cancelled` and reverses its accrual in the ledger.
///
/// Runs on whatever connection or transaction the caller holds.
pub(crate) async fn cancel_pending<C>(
    db: &C,
    commission: commission::Model,
    actor: Option<i64>,
    reason: Option<String>,
) -> Result<commission::Model>
where
    C: ConnectionTrait,
{
    if commission.status != CommissionStatus::Pending {
        return Err(Error::InvalidTransition {
            entity: "Commission",
            id: commission.id,
            from: commission.status.as_str().to_string(),
            to: CommissionStatus::Cancelled.as_str().to_string(),
        });
    }

    let now = Utc::now();
    let reversal = NewLedgerEntry::new(
        TransactionType::Adjustment,
        Account::CommissionPayable,
        Account::CommissionExpense,
        commission.commission_amount,
        commission.currency.clone(),
        now,
    )
    .described(format!("Reversal of cancelled commission {}", commission.id))
    .for_order(commission.order_id)
    .for_commission(commission.id)
    .for_event(commission.event_id.clone())
    .for_user(Some(commission.user_id))
    .posted_by(actor);

    let mut active: commission::ActiveModel = commission.into();
    active.status = Set(CommissionStatus::Cancelled);
    active.reconciled_by = Set(actor);
    active.notes = Set(reason);
    active.updated_at = Set(now);
    let updated = active.update(db).await?;

    ledger::post_entry(db, reversal).await?;
    Ok(updated)
}

/// Cancels a pending commission on behalf of an admin.
///
/// `paid` and `cancelled` are terminal; cancelling them fails with
/// [`Error::InvalidTransition`]. The status change and the reversing `adjustment`
/// ledger row are committed together.
pub async fn cancel_commission(
    db: &DatabaseConnection,
    commission_id: i64,
    admin_id: i64,
    reason: Option<String>,
) -> Result<commission::Model> {
    let txn = db.begin().await?;

    let commission = Commission::find_by_id(commission_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Commission", commission_id))?;

    let cancelled = cancel_pending(&txn, commission, Some(admin_id), reason).await?;
    txn.commit().await?;

    tracing::info!(commission_id, admin_id, "cancelled commission");
    Ok(cancelled)
}

/// Retrieves a commission by id.
pub async fn get_commission(
    db: &DatabaseConnection,
    commission_id: i64,
) -> Result<Option<commission::Model>> {
    Commission::find_by_id(commission_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the commission accrued for an order, if any.
pub async fn get_commission_for_order<C>(db: &C, order_id: i64) -> Result<Option<commission::Model>>
where
    C: ConnectionTrait,
{
    Commission::find()
        .filter(commission::Column::OrderId.eq(order_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// A user's commission totals by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionBalance {
    /// Accrued, not yet paid
    pub pending: f64,
    /// Already paid out
    pub paid: f64,
    /// Voided
    pub cancelled: f64,
    /// `pending + paid`
    pub total: f64,
}

/// Sums a user's commissions by status.
pub async fn get_balance(db: &DatabaseConnection, user_id: i64) -> Result<CommissionBalance> {
    let commissions = Commission::find()
        .filter(commission::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    let mut balance = commissions
        .iter()
        .fold(CommissionBalance::default(), |mut acc, c| {
            match c.status {
                CommissionStatus::Pending => acc.pending += c.commission_amount,
                CommissionStatus::Paid => acc.paid += c.commission_amount,
                CommissionStatus::Cancelled => acc.cancelled += c.commission_amount,
            }
            acc
        });
    balance.total = balance.pending + balance.paid;
    Ok(balance)
}

/// Retrieves a user's commissions, newest first, optionally restricted to one status.
pub async fn get_history(
    db: &DatabaseConnection,
    user_id: i64,
    page: u64,
    limit: u64,
    status: Option<CommissionStatus>,
) -> Result<Page<commission::Model>> {
    let mut query = Commission::find().filter(commission::Column::UserId.eq(user_id));
    if let Some(status) = status {
        query = query.filter(commission::Column::Status.eq(status));
    }

    let paginator = query
        .order_by_desc(commission::Column::CreatedAt)
        .order_by_desc(commission::Column::Id)
        .paginate(db, limit);

    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok(Page {
        items,
        pagination: Pagination::new(page, limit, total),
    })
}

/// Filters for [`admin_report`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommissionReportFilter {
    /// Window on `created_at`
    pub range: DateRange,
    /// Only commissions in this status
    pub status: Option<CommissionStatus>,
    /// Only this earner
    pub user_id: Option<i64>,
}

/// Commission totals for one earner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCommissionSummary {
    /// Earner
    pub user_id: i64,
    /// Earner e-mail, when the user row exists
    pub email: Option<String>,
    /// Earner display name, when the user row exists
    pub name: Option<String>,
    /// Sum of all matching commission amounts
    pub total_commission: f64,
    /// Sum of the order amounts they were derived from
    pub total_order_amount: f64,
    /// Number of matching commissions
    pub commission_count: u64,
    /// Pending part of `total_commission`
    pub pending_amount: f64,
    /// Paid part of `total_commission`
    pub paid_amount: f64,
    /// Cancelled part of `total_commission`
    pub cancelled_amount: f64,
}

/// Per-user commission totals, largest earners first.
pub async fn admin_report(
    db: &DatabaseConnection,
    filter: CommissionReportFilter,
) -> Result<Vec<UserCommissionSummary>> {
    let mut query = filter
        .range
        .apply(Commission::find(), commission::Column::CreatedAt);
    if let Some(status) = filter.status {
        query = query.filter(commission::Column::Status.eq(status));
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(commission::Column::UserId.eq(user_id));
    }
    let commissions = query.all(db).await?;

    let mut per_user: BTreeMap<i64, UserCommissionSummary> = BTreeMap::new();
    for c in &commissions {
        let summary = per_user
            .entry(c.user_id)
            .or_insert_with(|| UserCommissionSummary {
                user_id: c.user_id,
                email: None,
                name: None,
                total_commission: 0.0,
                total_order_amount: 0.0,
                commission_count: 0,
                pending_amount: 0.0,
                paid_amount: 0.0,
                cancelled_amount: 0.0,
            });
        summary.total_commission += c.commission_amount;
        summary.total_order_amount += c.order_amount;
        summary.commission_count += 1;
        match c.status {
            CommissionStatus::Pending => summary.pending_amount += c.commission_amount,
            CommissionStatus::Paid => summary.paid_amount += c.commission_amount,
            CommissionStatus::Cancelled => summary.cancelled_amount += c.commission_amount,
        }
    }

    if !per_user.is_empty() {
        let users: HashMap<i64, user::Model> = User::find()
            .filter(user::Column::Id.is_in(per_user.keys().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        for summary in per_user.values_mut() {
            if let Some(u) = users.get(&summary.user_id) {
                summary.email = Some(u.email.clone());
                summary.name = Some(u.name.clone());
            }
        }
    }

    let mut report: Vec<UserCommissionSummary> = per_user.into_values().collect();
    report.sort_by(|a, b| b.total_commission.total_cmp(&a.total_commission));
    Ok(report)
}
