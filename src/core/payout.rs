//! Batch commission payout.
//!
//! A batch settles many pending commissions at once. Everything happens inside one
//! database transaction: the eligible commissions are selected, one `payout` ledger row
//! is built per commission, the commissions are flipped to `paid` with a single
//! `UPDATE`, and the ledger rows go in with a single bulk insert. Either the whole batch
//! is recorded or none of it is.

use crate::{
    core::ledger::{self, NewLedgerEntry},
    entities::{Account, Commission, CommissionStatus, PaymentMethod, TransactionType, commission},
    errors::{Error, Result},
};
use chrono::Utc;
use rand::Rng;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const BATCH_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Body of `POST /admin/finance/commissions/process-batch`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayoutRequest {
    /// Commissions to settle
    #[serde(default)]
    pub commission_ids: Vec<i64>,
    /// How the money is sent, bank transfer when omitted
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Free-form note stored on every settled commission
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outcome of a batch payout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayoutResult {
    /// Settlement batch id written to commissions and ledger rows
    pub batch_id: String,
    /// Number of commissions moved to `paid`
    pub processed_count: u64,
    /// Sum of their amounts
    pub total_amount: f64,
    /// Ids that were settled
    pub commission_ids: Vec<i64>,
    /// Requested ids that were missing, not pending, or already paid
    pub skipped_ids: Vec<i64>,
    /// Ledger rows written
    pub ledger_entries: u64,
}

/// Generates `BATCH-<unix_millis>-<9 base36 chars>`.
#[must_use]
pub fn generate_batch_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..BATCH_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!("BATCH-{}-{suffix}", Utc::now().timestamp_millis())
}

/// Settles the requested commissions as one batch.
///
/// Only commissions that are `pending` and not yet paid are touched; every other id
/// is reported back in `skipped_ids`. Replaying the same request therefore processes
/// nothing and writes no ledger rows.
///
/// # Errors
/// [`Error::Validation`] for an empty id list; database errors roll the batch back.
pub async fn process_batch(
    db: &DatabaseConnection,
    request: BatchPayoutRequest,
    admin_id: i64,
) -> Result<BatchPayoutResult> {
    let requested: BTreeSet<i64> = request.commission_ids.iter().copied().collect();
    if requested.is_empty() {
        return Err(Error::validation("commissionIds must contain at least one id"));
    }

    let payment_method = request.payment_method.unwrap_or(PaymentMethod::BankTransfer);
    let batch_id = generate_batch_id();
    let now = Utc::now();

    let txn = db.begin().await?;

    let eligible = Commission::find()
        .filter(commission::Column::Id.is_in(requested.iter().copied()))
        .filter(commission::Column::Status.eq(CommissionStatus::Pending))
        .filter(commission::Column::PaidToUser.eq(false))
        .order_by_asc(commission::Column::Id)
        .all(&txn)
        .await?;

    let settled_ids: Vec<i64> = eligible.iter().map(|c| c.id).collect();
    let skipped_ids: Vec<i64> = requested
        .iter()
        .copied()
        .filter(|id| !settled_ids.contains(id))
        .collect();

    if eligible.is_empty() {
        txn.commit().await?;
        tracing::info!(batch_id = %batch_id, skipped = skipped_ids.len(), "nothing to pay out");
        return Ok(BatchPayoutResult {
            batch_id,
            processed_count: 0,
            total_amount: 0.0,
            commission_ids: settled_ids,
            skipped_ids,
            ledger_entries: 0,
        });
    }

    let total_amount: f64 = eligible.iter().map(|c| c.commission_amount).sum();
    let entries: Vec<NewLedgerEntry> = eligible
        .iter()
        .map(|c| {
            NewLedgerEntry::new(
                TransactionType::Payout,
                Account::CommissionPayable,
                Account::Cash,
                c.commission_amount,
                c.currency.clone(),
                now,
            )
            .described(format!(
                "Commission payout via {} ({batch_id})",
                payment_method.as_str()
            ))
            .for_order(c.order_id)
            .for_commission(c.id)
            .for_event(c.event_id.clone())
            .for_user(Some(c.user_id))
            .in_batch(batch_id.clone())
            .posted_by(Some(admin_id))
        })
        .collect();

    let updated = Commission::update_many()
        .set(commission::ActiveModel {
            status: Set(CommissionStatus::Paid),
            paid_to_user: Set(true),
            paid_date: Set(Some(now)),
            payment_method: Set(Some(payment_method)),
            settlement_batch_id: Set(Some(batch_id.clone())),
            reconciled_by: Set(Some(admin_id)),
            notes: Set(request.notes),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(commission::Column::Id.is_in(settled_ids.iter().copied()))
        .filter(commission::Column::Status.eq(CommissionStatus::Pending))
        .filter(commission::Column::PaidToUser.eq(false))
        .exec(&txn)
        .await?;

    if usize::try_from(updated.rows_affected).ok() != Some(settled_ids.len()) {
        tracing::warn!(
            batch_id = %batch_id,
            selected = settled_ids.len(),
            updated = updated.rows_affected,
            "commissions changed while settling, rolling batch back"
        );
        return Err(Error::Conflict {
            message: format!(
                "Batch {batch_id}: only {} of {} commissions were still pending",
                updated.rows_affected,
                settled_ids.len()
            ),
        });
    }

    let ledger_entries = ledger::post_entries(&txn, entries).await?;
    txn.commit().await?;

    tracing::info!(
        batch_id = %batch_id,
        admin_id,
        processed = updated.rows_affected,
        total = total_amount,
        skipped = skipped_ids.len(),
        "processed commission payout batch"
    );

    Ok(BatchPayoutResult {
        batch_id,
        processed_count: updated.rows_affected,
        total_amount,
        commission_ids: settled_ids,
        skipped_ids,
        ledger_entries,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::ledger::{LedgerFilter, account_balances, find_entries};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn request(ids: Vec<i64>) -> BatchPayoutRequest {
        BatchPayoutRequest {
            commission_ids: ids,
            payment_method: Some(PaymentMethod::Paypal),
            notes: Some("march run".to_string()),
        }
    }

    #[test]
    fn test_batch_id_format() {
        let id = generate_batch_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "BATCH");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), BATCH_SUFFIX_LEN);
        assert!(
            parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
        assert_ne!(generate_batch_id(), id);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let result = process_batch(&db, request(vec![]), 1).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_batch_rolls_back_when_update_misses_rows() {
        let now = Utc::now();
        let selected = commission::Model {
            id: 7,
            order_id: 70,
            event_id: "evt_race".to_string(),
            user_id: 3,
            order_amount: 100.0,
            commission_rate: 0.02,
            commission_amount: 2.0,
            currency: "USD".to_string(),
            status: CommissionStatus::Pending,
            paid_to_user: false,
            paid_date: None,
            payment_method: None,
            settlement_batch_id: None,
            reconciled_by: None,
            notes: None,
            fiscal_year: 2025,
            fiscal_quarter: 1,
            created_at: now,
            updated_at: now,
        };
        // A concurrent batch paid the row between our SELECT and UPDATE.
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![selected]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let result = process_batch(&db, request(vec![7]), 1).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_batch_pays_pending_commissions() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_admin(&db).await?;
        let earner = create_test_user(&db, "brand@example.com").await?;
        let a = insert_commission(&db, earner.id, 12.5, CommissionStatus::Pending).await?;
        let b = insert_commission(&db, earner.id, 7.5, CommissionStatus::Pending).await?;

        let result = process_batch(&db, request(vec![a.id, b.id]), admin.id).await?;

        assert_eq!(result.processed_count, 2);
        assert_eq!(result.total_amount, 20.0);
        assert_eq!(result.ledger_entries, 2);
        assert!(result.skipped_ids.is_empty());

        for id in [a.id, b.id] {
            let paid = Commission::find_by_id(id).one(&db).await?.unwrap();
            assert_eq!(paid.status, CommissionStatus::Paid);
            assert!(paid.paid_to_user);
            assert!(paid.paid_date.is_some());
            assert_eq!(paid.payment_method, Some(PaymentMethod::Paypal));
            assert_eq!(paid.settlement_batch_id.as_deref(), Some(result.batch_id.as_str()));
            assert_eq!(paid.reconciled_by, Some(admin.id));
            assert_eq!(paid.notes.as_deref(), Some("march run"));
        }

        let rows = find_entries(
            &db,
            &LedgerFilter {
                settlement_batch_id: Some(result.batch_id.clone()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| {
            r.transaction_type == TransactionType::Payout
                && r.debit_account == Account::CommissionPayable
                && r.credit_account == Account::Cash
                && r.created_by == Some(admin.id)
        }));
        assert_eq!(rows.iter().map(|r| r.amount).sum::<f64>(), result.total_amount);
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_replay_is_a_no_op() -> Result<()> {
        let db = setup_test_db().await?;
        let earner = create_test_user(&db, "brand@example.com").await?;
        let a = insert_commission(&db, earner.id, 10.0, CommissionStatus::Pending).await?;

        let first = process_batch(&db, request(vec![a.id]), 1).await?;
        let second = process_batch(&db, request(vec![a.id]), 1).await?;

        assert_eq!(first.processed_count, 1);
        assert_eq!(second.processed_count, 0);
        assert_eq!(second.ledger_entries, 0);
        assert_eq!(second.skipped_ids, vec![a.id]);

        let payouts = find_entries(
            &db,
            &LedgerFilter {
                transaction_type: Some(TransactionType::Payout),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(payouts.len(), 1);

        let kept = Commission::find_by_id(a.id).one(&db).await?.unwrap();
        assert_eq!(kept.settlement_batch_id.as_deref(), Some(first.batch_id.as_str()));
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_skips_ineligible_ids() -> Result<()> {
        let db = setup_test_db().await?;
        let earner = create_test_user(&db, "brand@example.com").await?;
        let pending = insert_commission(&db, earner.id, 4.0, CommissionStatus::Pending).await?;
        let cancelled = insert_commission(&db, earner.id, 3.0, CommissionStatus::Cancelled).await?;
        let paid = insert_commission(&db, earner.id, 2.0, CommissionStatus::Paid).await?;

        let result = process_batch(
            &db,
            request(vec![pending.id, cancelled.id, paid.id, 9999, pending.id]),
            1,
        )
        .await?;

        assert_eq!(result.commission_ids, vec![pending.id]);
        assert_eq!(result.processed_count, 1);
        assert_eq!(result.total_amount, 4.0);
        assert_eq!(result.skipped_ids.len(), 3);
        assert!(result.skipped_ids.contains(&9999));

        let untouched = Commission::find_by_id(cancelled.id).one(&db).await?.unwrap();
        assert_eq!(untouched.status, CommissionStatus::Cancelled);
        Ok(())
    }

    #[tokio::test]
    async fn test_default_payment_method_is_bank_transfer() -> Result<()> {
        let db = setup_test_db().await?;
        let earner = create_test_user(&db, "brand@example.com").await?;
        let c = insert_commission(&db, earner.id, 1.0, CommissionStatus::Pending).await?;

        process_batch(
            &db,
            BatchPayoutRequest {
                commission_ids: vec![c.id],
                ..Default::default()
            },
            1,
        )
        .await?;

        let paid = Commission::find_by_id(c.id).one(&db).await?.unwrap();
        assert_eq!(paid.payment_method, Some(PaymentMethod::BankTransfer));
        Ok(())
    }

    #[tokio::test]
    async fn test_ledger_stays_balanced_through_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = create_test_admin(&db).await?;
        let (_, paid) = create_fulfilled_order(&db, "cs_paid", 300.0).await?;
        let (order, _) = create_fulfilled_order(&db, "cs_refunded", 120.0).await?;
        process_batch(&db, request(vec![paid.id]), admin.id).await?;
        crate::core::order::refund_order(&db, order.id, admin.id).await?;

        let balances = account_balances(&db, &LedgerFilter::default()).await?;
        let debits: f64 = balances.iter().map(|b| b.debits).sum();
        let credits: f64 = balances.iter().map(|b| b.credits).sum();
        assert!((debits - credits).abs() < 1e-9);

        let payable = balances
            .iter()
            .find(|b| b.account == Account::CommissionPayable)
            .unwrap();
        assert!(payable.net.abs() < 1e-9);
        Ok(())
    }
}
