//! Ledger business logic - Posting and querying double-entry rows.
//!
//! Rows are built as [`NewLedgerEntry`] values, validated, and only then written. The
//! fiscal year, quarter and month are derived from `transaction_date` at the moment
//! the row is built, so a row can never be stored with a period that disagrees with
//! its date. Several rows for one financial event go through [`post_entries`], which
//! checks all of them before issuing a single bulk insert.

use crate::{
    core::{DateRange, Page, Pagination, fiscal::FiscalPeriod},
    entities::{Account, TransactionLedger, TransactionType, transaction_ledger},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Condition, PaginatorTrait, QueryOrder, Set, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;

/// A ledger row that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    /// Kind of financial event
    pub transaction_type: TransactionType,
    /// Account debited
    pub debit_account: Account,
    /// Account credited
    pub credit_account: Account,
    /// Amount moved, must be finite and non-negative
    pub amount: f64,
    /// Currency code
    pub currency: String,
    /// Human-readable description
    pub description: String,
    /// Related order
    pub order_id: Option<i64>,
    /// Related commission
    pub commission_id: Option<i64>,
    /// Related event
    pub event_id: Option<String>,
    /// Related user
    pub user_id: Option<i64>,
    /// Settlement batch
    pub settlement_batch_id: Option<String>,
    /// Tax jurisdiction
    pub tax_jurisdiction: Option<String>,
    /// Actor posting the row
    pub created_by: Option<i64>,
    /// When the financial event happened
    pub transaction_date: DateTime<Utc>,
}

impl NewLedgerEntry {
    /// Starts a row moving `amount` from `credit` to `debit`.
    pub fn new(
        transaction_type: TransactionType,
        debit_account: Account,
        credit_account: Account,
        amount: f64,
        currency: impl Into<String>,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_type,
            debit_account,
            credit_account,
            amount,
            currency: currency.into(),
            description: String::new(),
            order_id: None,
            commission_id: None,
            event_id: None,
            user_id: None,
            settlement_batch_id: None,
            tax_jurisdiction: None,
            created_by: None,
            transaction_date,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Links the row to an order.
    #[must_use]
    pub const fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Links the row to a commission.
    #[must_use]
    pub const fn for_commission(mut self, commission_id: i64) -> Self {
        self.commission_id = Some(commission_id);
        self
    }

    /// Links the row to an event.
    #[must_use]
    pub fn for_event(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Links the row to a user.
    #[must_use]
    pub const fn for_user(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Tags the row with a settlement batch.
    #[must_use]
    pub fn in_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.settlement_batch_id = Some(batch_id.into());
        self
    }

    /// Tags the row with a tax jurisdiction.
    #[must_use]
    pub fn in_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.tax_jurisdiction = Some(jurisdiction.into());
        self
    }

    /// Records who posted the row.
    #[must_use]
    pub const fn posted_by(mut self, actor: Option<i64>) -> Self {
        self.created_by = actor;
        self
    }

    /// Fiscal period the row will be filed under.
    #[must_use]
    pub fn fiscal_period(&self) -> FiscalPeriod {
        FiscalPeriod::from_date(self.transaction_date)
    }

    /// Checks the amount and account pairing.
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(Error::InvalidAmount {
                amount: self.amount,
            });
        }
        if self.debit_account == self.credit_account {
            return Err(Error::validation(format!(
                "Debit and credit account must differ (both {})",
                self.debit_account.as_str()
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(Error::validation("Ledger currency cannot be empty"));
        }
        Ok(())
    }

    fn into_active_model(self, now: DateTime<Utc>) -> transaction_ledger::ActiveModel {
        let period = self.fiscal_period();
        transaction_ledger::ActiveModel {
            transaction_type: Set(self.transaction_type),
            debit_account: Set(self.debit_account),
            credit_account: Set(self.credit_account),
            amount: Set(self.amount),
            currency: Set(self.currency),
            description: Set(self.description),
            order_id: Set(self.order_id),
            commission_id: Set(self.commission_id),
            event_id: Set(self.event_id),
            user_id: Set(self.user_id),
            settlement_batch_id: Set(self.settlement_batch_id),
            tax_jurisdiction: Set(self.tax_jurisdiction),
            created_by: Set(self.created_by),
            transaction_date: Set(self.transaction_date),
            fiscal_year: Set(period.year),
            fiscal_quarter: Set(period.quarter),
            fiscal_month: Set(period.month),
            created_at: Set(now),
            ..Default::default()
        }
    }
}

/// Validates and writes a single ledger row.
pub async fn post_entry<C>(db: &C, entry: NewLedgerEntry) -> Result<transaction_ledger::Model>
where
    C: ConnectionTrait,
{
    entry.validate()?;
    let model = entry.into_active_model(Utc::now()).insert(db).await?;
    tracing::debug!(
        id = model.id,
        kind = model.transaction_type.as_str(),
        amount = model.amount,
        "posted ledger row"
    );
    Ok(model)
}

/// Validates every row, then writes them all with one bulk insert.
///
/// Nothing is written if any row is invalid. Returns the number of rows inserted.
pub async fn post_entries<C>(db: &C, entries: Vec<NewLedgerEntry>) -> Result<u64>
where
    C: ConnectionTrait,
{
    for entry in &entries {
        entry.validate()?;
    }
    if entries.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let count = entries.len();
    let models = entries
        .into_iter()
        .map(|entry| entry.into_active_model(now));

    TransactionLedger::insert_many(models)
        .exec_without_returning(db)
        .await?;

    tracing::debug!(rows = count, "bulk posted ledger rows");
    Ok(u64::try_from(count).unwrap_or(u64::MAX))
}

/// Filters accepted by [`list_entries`] and [`account_balances`].
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    /// Only rows of this type
    pub transaction_type: Option<TransactionType>,
    /// Rows touching this account on either side
    pub account: Option<Account>,
    /// Fiscal year
    pub fiscal_year: Option<i32>,
    /// Fiscal quarter
    pub fiscal_quarter: Option<i32>,
    /// Fiscal month
    pub fiscal_month: Option<i32>,
    /// Window on `transaction_date`
    pub range: DateRange,
    /// Related order
    pub order_id: Option<i64>,
    /// Related commission
    pub commission_id: Option<i64>,
    /// Related user
    pub user_id: Option<i64>,
    /// Settlement batch
    pub settlement_batch_id: Option<String>,
}

impl LedgerFilter {
    fn query(&self) -> Select<TransactionLedger> {
        let mut condition = Condition::all();
        if let Some(kind) = self.transaction_type {
            condition = condition.add(transaction_ledger::Column::TransactionType.eq(kind));
        }
        if let Some(account) = self.account {
            condition = condition.add(
                Condition::any()
                    .add(transaction_ledger::Column::DebitAccount.eq(account))
                    .add(transaction_ledger::Column::CreditAccount.eq(account)),
            );
        }
        if let Some(year) = self.fiscal_year {
            condition = condition.add(transaction_ledger::Column::FiscalYear.eq(year));
        }
        if let Some(quarter) = self.fiscal_quarter {
            condition = condition.add(transaction_ledger::Column::FiscalQuarter.eq(quarter));
        }
        if let Some(month) = self.fiscal_month {
            condition = condition.add(transaction_ledger::Column::FiscalMonth.eq(month));
        }
        if let Some(order_id) = self.order_id {
            condition = condition.add(transaction_ledger::Column::OrderId.eq(order_id));
        }
        if let Some(commission_id) = self.commission_id {
            condition = condition.add(transaction_ledger::Column::CommissionId.eq(commission_id));
        }
        if let Some(user_id) = self.user_id {
            condition = condition.add(transaction_ledger::Column::UserId.eq(user_id));
        }
        if let Some(batch) = &self.settlement_batch_id {
            condition =
                condition.add(transaction_ledger::Column::SettlementBatchId.eq(batch.as_str()));
        }

        self.range.apply(
            TransactionLedger::find().filter(condition),
            transaction_ledger::Column::TransactionDate,
        )
    }
}

/// Retrieves ledger rows matching `filter`, newest first.
pub async fn list_entries(
    db: &DatabaseConnection,
    filter: &LedgerFilter,
    page: u64,
    limit: u64,
) -> Result<Page<transaction_ledger::Model>> {
    let paginator = filter
        .query()
        .order_by_desc(transaction_ledger::Column::TransactionDate)
        .order_by_desc(transaction_ledger::Column::Id)
        .paginate(db, limit);

    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok(Page {
        items,
        pagination: Pagination::new(page, limit, total),
    })
}

/// Retrieves every ledger row matching `filter` in posting order.
pub async fn find_entries(
    db: &DatabaseConnection,
    filter: &LedgerFilter,
) -> Result<Vec<transaction_ledger::Model>> {
    filter
        .query()
        .order_by_asc(transaction_ledger::Column::TransactionDate)
        .order_by_asc(transaction_ledger::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Debit and credit totals for one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    /// The account
    pub account: Account,
    /// Sum of rows debiting the account
    pub debits: f64,
    /// Sum of rows crediting the account
    pub credits: f64,
    /// `debits - credits`
    pub net: f64,
}

/// Trial balance over the rows matching `filter`.
///
/// Because every row debits and credits the same amount, the debit column and the
/// credit column always sum to the same total.
pub async fn account_balances(
    db: &DatabaseConnection,
    filter: &LedgerFilter,
) -> Result<Vec<AccountBalance>> {
    let rows = find_entries(db, filter).await?;
    Ok(summarize_accounts(&rows))
}

/// Folds rows into per-account debit/credit totals, ordered by account.
#[must_use]
pub fn summarize_accounts(rows: &[transaction_ledger::Model]) -> Vec<AccountBalance> {
    let mut totals: BTreeMap<Account, (f64, f64)> = BTreeMap::new();
    for row in rows {
        totals.entry(row.debit_account).or_default().0 += row.amount;
        totals.entry(row.credit_account).or_default().1 += row.amount;
    }

    totals
        .into_iter()
        .map(|(account, (debits, credits))| AccountBalance {
            account,
            debits,
            credits,
            net: debits - credits,
        })
        .collect()
}
