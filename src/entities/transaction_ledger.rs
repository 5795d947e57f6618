//! Transaction ledger entity - Immutable double-entry accounting rows.
//!
//! Every row moves `amount` (never negative) from `credit_account` to `debit_account`,
//! both drawn from the fixed chart of accounts. Rows are never updated or deleted;
//! corrections are new `adjustment` rows. Fiscal fields are filled in by
//! `core::ledger::NewLedgerEntry` from `transaction_date` when the row is built.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of financial event a row records
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Ticket revenue collected
    #[sea_orm(string_value = "sale")]
    Sale,
    /// Commission accrued on a sale
    #[sea_orm(string_value = "commission")]
    Commission,
    /// Commission paid out
    #[sea_orm(string_value = "payout")]
    Payout,
    /// Sale returned to the buyer
    #[sea_orm(string_value = "refund")]
    Refund,
    /// Correction of an earlier row
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    /// Tax booked or remitted
    #[sea_orm(string_value = "tax")]
    Tax,
    /// Processor or platform fee
    #[sea_orm(string_value = "fee")]
    Fee,
}

impl TransactionType {
    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Commission => "commission",
            Self::Payout => "payout",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
            Self::Tax => "tax",
            Self::Fee => "fee",
        }
    }
}

/// Chart of accounts
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum Account {
    /// Money held by the platform
    #[sea_orm(string_value = "cash")]
    Cash,
    /// Money owed to the platform
    #[sea_orm(string_value = "accounts_receivable")]
    AccountsReceivable,
    /// Ticket revenue
    #[sea_orm(string_value = "revenue")]
    Revenue,
    /// Cost of commissions owed
    #[sea_orm(string_value = "commission_expense")]
    CommissionExpense,
    /// Commissions accrued but not yet paid
    #[sea_orm(string_value = "commission_payable")]
    CommissionPayable,
    /// Contra-revenue for refunded sales
    #[sea_orm(string_value = "refunds")]
    Refunds,
    /// Tax collected but not remitted
    #[sea_orm(string_value = "tax_payable")]
    TaxPayable,
    /// Payment processor fees
    #[sea_orm(string_value = "processing_fees")]
    ProcessingFees,
    /// Manual corrections
    #[sea_orm(string_value = "adjustments")]
    Adjustments,
}

impl Account {
    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::AccountsReceivable => "accounts_receivable",
            Self::Revenue => "revenue",
            Self::CommissionExpense => "commission_expense",
            Self::CommissionPayable => "commission_payable",
            Self::Refunds => "refunds",
            Self::TaxPayable => "tax_payable",
            Self::ProcessingFees => "processing_fees",
            Self::Adjustments => "adjustments",
        }
    }
}

/// Ledger row database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_ledger")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Kind of financial event
    pub transaction_type: TransactionType,
    /// Account debited by `amount`
    pub debit_account: Account,
    /// Account credited by `amount`
    pub credit_account: Account,
    /// Non-negative amount moved
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
    /// Related user (buyer or commission earner)
    pub user_id: Option<i64>,
    /// Settlement batch for payout rows
    pub settlement_batch_id: Option<String>,
    /// Jurisdiction used to group the tax report
    pub tax_jurisdiction: Option<String>,
    /// Admin or system actor that posted the row
    pub created_by: Option<i64>,
    /// When the financial event happened
    pub transaction_date: DateTimeUtc,
    /// Calendar year of `transaction_date`
    pub fiscal_year: i32,
    /// Quarter (1-4) of `transaction_date`
    pub fiscal_quarter: i32,
    /// Month (1-12) of `transaction_date`
    pub fiscal_month: i32,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// Ledger rows reference other records by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
